use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::io;

/// Identifier of a sorted unit (cluster) within one session.
pub type UnitId = u32;

/// Category of recorded data a file descriptor belongs to.
///
/// Each modality owns one bucket in the container registry and selects which
/// load protocol a session runs for the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Sorted spike times and unit tags
    Spike,
    /// Position (spatial) tracking data
    Position,
    /// Local field potential
    Lfp,
    /// HDF5/NWB container holding any of the above
    Hdf,
}

impl Modality {
    /// Every modality, in declaration order.
    pub const ALL: [Modality; 4] = [
        Modality::Spike,
        Modality::Position,
        Modality::Lfp,
        Modality::Hdf,
    ];

    /// Human readable name of the modality.
    pub fn name(self) -> &'static str {
        match self {
            Modality::Spike => "Spike",
            Modality::Position => "Position",
            Modality::Lfp => "LFP",
            Modality::Hdf => "HDF",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where one session finds its data for one modality.
///
/// Any field may be absent: a missing filename means the session is not
/// loaded for that modality, while the object name and system tag are only
/// forwarded to the session when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path of the file to load
    pub filename: Option<String>,
    /// Name of the object inside the file (e.g. a tetrode or channel number)
    pub object_name: Option<String>,
    /// Recording system the file was produced by (e.g. "Axona", "NWB")
    pub system: Option<String>,
}

/// Parallel descriptor lists passed to a single `add_files` call.
///
/// Entry `i` of each list describes session slot `i`. When present,
/// `object_names` and `systems` must be as long as `filenames`.
///
/// # Examples
///
/// ```
/// use ndata_container::Descriptors;
///
/// let descriptors = Descriptors::new(["s1.txt", "s2.txt"])
///     .with_systems(["Axona", "Axona"]);
/// assert_eq!(descriptors.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptors {
    /// One optional filename per session slot
    pub filenames: Vec<Option<String>>,
    /// Optional object names, one per filename
    pub object_names: Option<Vec<Option<String>>>,
    /// Optional system tags, one per filename
    pub systems: Option<Vec<Option<String>>>,
}

impl Descriptors {
    /// Descriptors with filenames only.
    pub fn new<I, T>(filenames: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            filenames: filenames.into_iter().map(|f| Some(f.into())).collect(),
            object_names: None,
            systems: None,
        }
    }

    /// Builds descriptors from raw lists, allowing absent entries.
    pub fn from_parts(
        filenames: Vec<Option<String>>,
        object_names: Option<Vec<Option<String>>>,
        systems: Option<Vec<Option<String>>>,
    ) -> Self {
        Self {
            filenames,
            object_names,
            systems,
        }
    }

    pub fn with_object_names<I, T>(mut self, object_names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.object_names = Some(object_names.into_iter().map(|n| Some(n.into())).collect());
        self
    }

    pub fn with_systems<I, T>(mut self, systems: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.systems = Some(systems.into_iter().map(|s| Some(s.into())).collect());
        self
    }

    /// Number of session slots described.
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// Repeats the first slot until `slots` slots are described.
    pub(crate) fn replicate_first(&mut self, slots: usize) {
        fn pad(list: &mut Vec<Option<String>>, slots: usize) {
            if let Some(first) = list.first().cloned() {
                list.resize(slots.max(list.len()), first);
            }
        }

        pad(&mut self.filenames, slots);
        if let Some(names) = self.object_names.as_mut() {
            pad(names, slots);
        }
        if let Some(systems) = self.systems.as_mut() {
            pad(systems, slots);
        }
    }

    /// The descriptor for session slot `index`.
    pub(crate) fn descriptor(&self, index: usize) -> FileDescriptor {
        let entry = |list: &Option<Vec<Option<String>>>| {
            list.as_ref()
                .and_then(|l| l.get(index))
                .cloned()
                .flatten()
        };

        FileDescriptor {
            filename: self.filenames.get(index).cloned().flatten(),
            object_name: entry(&self.object_names),
            system: entry(&self.systems),
        }
    }
}

impl<T: Into<String>> From<Vec<T>> for Descriptors {
    fn from(filenames: Vec<T>) -> Self {
        Descriptors::new(filenames)
    }
}

/// Unit selection for one session.
///
/// `Unrecognised` holds entries of any other shape, which are reported and
/// skipped when the selection is applied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UnitEntry {
    /// A single unit
    Id(UnitId),
    /// Several units of the same session
    Ids(Vec<UnitId>),
    /// Anything else
    Unrecognised(serde_json::Value),
}

impl From<UnitId> for UnitEntry {
    fn from(unit: UnitId) -> Self {
        UnitEntry::Id(unit)
    }
}

impl From<Vec<UnitId>> for UnitEntry {
    fn from(units: Vec<UnitId>) -> Self {
        UnitEntry::Ids(units)
    }
}

/// Which units the container enumerates in its flat index.
///
/// Deserializes from the keyword `"all"` or from a list of per-session
/// entries such as `[1, [2, 3]]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawUnits")]
pub enum Units {
    /// Every unit each loaded session reports
    All,
    /// One entry per session
    Explicit(Vec<UnitEntry>),
}

impl From<Vec<UnitEntry>> for Units {
    fn from(entries: Vec<UnitEntry>) -> Self {
        Units::Explicit(entries)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUnits {
    Keyword(String),
    Entries(Vec<UnitEntry>),
}

impl TryFrom<RawUnits> for Units {
    type Error = String;

    fn try_from(raw: RawUnits) -> Result<Self, Self::Error> {
        match raw {
            RawUnits::Keyword(keyword) if keyword == "all" => Ok(Units::All),
            RawUnits::Keyword(keyword) => Err(format!("unrecognised units keyword '{}'", keyword)),
            RawUnits::Entries(entries) => Ok(Units::Explicit(entries)),
        }
    }
}

/// A resolved position in the flat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLocation {
    /// Index of the session in the container
    pub session: usize,
    /// Offset of the unit within the session's unit list
    pub offset: usize,
    /// The unit found at that offset
    pub unit: UnitId,
}

/// Spike train of one session.
///
/// Holds every detected spike together with the unit it was sorted into.
/// Tag 0 marks unclustered spikes and is never reported as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeData {
    /// Spike times (seconds)
    pub timestamps: Array1<f64>,
    /// Unit tag of each spike
    pub unit_tags: Array1<UnitId>,
}

impl SpikeData {
    /// Creates a spike train, checking that every spike has a unit tag.
    pub fn new(timestamps: Array1<f64>, unit_tags: Array1<UnitId>) -> Result<Self, NDataError> {
        if timestamps.len() != unit_tags.len() {
            return Err(NDataError::Malformed {
                modality: Modality::Spike,
                reason: format!(
                    "{} timestamps but {} unit tags",
                    timestamps.len(),
                    unit_tags.len()
                ),
            });
        }
        Ok(Self {
            timestamps,
            unit_tags,
        })
    }

    /// Returns the number of spikes.
    pub fn num_spikes(&self) -> usize {
        self.timestamps.len()
    }

    /// Sorted, de-duplicated unit tags, excluding unclustered spikes.
    pub fn unit_list(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self.unit_tags.iter().copied().filter(|&t| t != 0).collect();
        units.sort_unstable();
        units.dedup();
        units
    }

    /// Spike times belonging to `unit`.
    pub fn unit_stamps(&self, unit: UnitId) -> Array1<f64> {
        self.timestamps
            .iter()
            .zip(self.unit_tags.iter())
            .filter(|(_, &tag)| tag == unit)
            .map(|(&t, _)| t)
            .collect()
    }
}

/// Position tracking data of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialData {
    /// Sample times (seconds)
    pub time: Array1<f64>,
    /// X coordinate of each sample (cm)
    pub x: Array1<f64>,
    /// Y coordinate of each sample (cm)
    pub y: Array1<f64>,
}

impl SpatialData {
    /// Creates a position track, checking that all columns are the same length.
    pub fn new(time: Array1<f64>, x: Array1<f64>, y: Array1<f64>) -> Result<Self, NDataError> {
        if time.len() != x.len() || time.len() != y.len() {
            return Err(NDataError::Malformed {
                modality: Modality::Position,
                reason: format!(
                    "column lengths differ: time {}, x {}, y {}",
                    time.len(),
                    x.len(),
                    y.len()
                ),
            });
        }
        Ok(Self { time, x, y })
    }

    /// Returns the number of position samples.
    pub fn num_samples(&self) -> usize {
        self.time.len()
    }

    /// Returns the time spanned by the track in seconds.
    ///
    /// Tracks with fewer than two samples have zero duration.
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// Local field potential of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LfpData {
    /// Signal samples (μV)
    pub samples: Array1<f64>,
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
}

impl LfpData {
    /// Returns the number of samples.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Returns the duration of the signal in seconds.
    ///
    /// If the sampling rate is not positive, returns 0.0.
    pub fn duration(&self) -> f64 {
        if self.sampling_rate > 0.0 {
            self.samples.len() as f64 / self.sampling_rate
        } else {
            0.0
        }
    }
}

/// Everything read from one HDF5/NWB file.
///
/// A container file may hold any subset of the modalities; absent ones leave
/// the session untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HdfContents {
    /// Spike train, if the file holds sorted units
    pub spike: Option<SpikeData>,
    /// Position track, if the file holds one
    pub spatial: Option<SpatialData>,
    /// LFP channel, if the file holds one
    pub lfp: Option<LfpData>,
}

/// Hard errors returned by the container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The flat index does not address any (session, unit) pair
    #[error("index {index} out of bounds for container of {len} units")]
    IndexOutOfBounds { index: usize, len: usize },
    /// Units were selected for a session that does not exist
    #[error("session {session} selected but only {sessions} sessions exist")]
    MissingSession { session: usize, sessions: usize },
    /// The session type has no load protocol for the modality
    #[error("sessions cannot load {modality} data (session {session})")]
    UnsupportedModality { modality: Modality, session: usize },
    /// A session failed to load its data
    #[error("failed to load {modality} data for session {session}: {source}")]
    Load {
        modality: Modality,
        session: usize,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The manifest could not be read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The manifest could not be parsed
    #[error("invalid manifest: {0}")]
    Manifest(#[from] toml::de::Error),
}

/// Configuration mistakes, reported without aborting the caller.
///
/// The container records these in its diagnostic sink and leaves its state
/// as it was before the offending call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Descriptor lists of one `add_files` call differ in length
    #[error("add_files for {modality} called with {filenames} filenames but {len} {field}")]
    LengthMismatch {
        modality: Modality,
        field: &'static str,
        filenames: usize,
        len: usize,
    },
    /// A unit entry was neither an id nor a list of ids
    #[error("unrecognised unit entry {value} for session {session}")]
    UnrecognisedUnit { session: usize, value: String },
    /// A session was requested by an index past the end of the container
    #[error("session index {index} out of range for {sessions} sessions")]
    SessionOutOfRange { index: usize, sessions: usize },
    /// Explicit unit entries do not match the number of sessions
    #[error("{entries} unit entries set for {sessions} sessions")]
    UnitCountMismatch { entries: usize, sessions: usize },
}

/// Errors raised by [`NData`](crate::NData) and its readers.
#[derive(Debug, thiserror::Error)]
pub enum NDataError {
    /// A load was requested before a file was set
    #[error("no {0} file set")]
    NoFile(Modality),
    /// The reader cannot handle this modality for the system
    #[error("{modality} data is not supported for system {system}")]
    Unsupported { modality: Modality, system: String },
    /// The reader returned inconsistent data
    #[error("malformed {modality} data: {reason}")]
    Malformed { modality: Modality, reason: String },
    /// An I/O error occurred while reading
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
