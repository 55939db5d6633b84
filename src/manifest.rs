use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::container::NDataContainer;
use crate::session::Session;
use crate::types::*;

/// Batch description read from a TOML file.
///
/// ```toml
/// share_positions = true
/// units = "all"
///
/// [[files]]
/// modality = "spike"
/// filenames = ["day1/tetrode.3", "day2/tetrode.3"]
/// object_names = ["3", "3"]
/// systems = ["Axona", "Axona"]
///
/// [[files]]
/// modality = "position"
/// filenames = ["arena.pos"]
/// ```
///
/// `[[files]]` tables are registered in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Share a single position recording between all sessions
    #[serde(default)]
    pub share_positions: bool,
    /// Units to select once the sessions are loaded
    pub units: Option<Units>,
    /// File groups, one `add_files` call each
    #[serde(default)]
    pub files: Vec<FileGroup>,
}

/// One `[[files]]` table of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileGroup {
    /// Modality the files belong to
    pub modality: Modality,
    /// One file per session slot
    pub filenames: Vec<String>,
    /// Object names, one per filename
    pub object_names: Option<Vec<String>>,
    /// System tags, one per filename
    pub systems: Option<Vec<String>>,
}

impl FileGroup {
    /// The group as `add_files` input.
    pub fn descriptors(&self) -> Descriptors {
        let wrap = |list: &Vec<String>| -> Vec<Option<String>> { list.iter().cloned().map(Some).collect() };
        Descriptors::from_parts(
            wrap(&self.filenames),
            self.object_names.as_ref().map(wrap),
            self.systems.as_ref().map(wrap),
        )
    }
}

impl Manifest {
    /// Reads and parses a manifest file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let text = fs::read_to_string(path.as_ref())?;
        let manifest: Manifest = text.parse()?;
        info!(
            path = %path.as_ref().display(),
            groups = manifest.files.len(),
            "read manifest"
        );
        Ok(manifest)
    }

    /// Creates a container with every file group registered.
    ///
    /// Length mismatches inside a group are reported through the container's
    /// diagnostics, as with any other `add_files` call.
    pub fn build<S, F>(&self, factory: F) -> NDataContainer<S>
    where
        S: Session,
        F: Fn() -> S + 'static,
    {
        let mut container = NDataContainer::with_factory(self.share_positions, factory);
        for group in &self.files {
            container.add_files(group.modality, group.descriptors());
        }
        container
    }
}

impl FromStr for Manifest {
    type Err = ContainerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(text)?)
    }
}
