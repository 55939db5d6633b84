#![allow(dead_code)]

use ndarray::{Array1, array};
use ndata_container::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

/// Serves canned data keyed by file path and records every read.
#[derive(Default)]
pub struct ScriptedReader {
    pub spikes: HashMap<String, SpikeData>,
    pub hdf_tracks: HashMap<String, SpatialData>,
    pub reads: RefCell<Vec<(Modality, String)>>,
}

impl ScriptedReader {
    /// A reader whose spike file `path` holds the given units, two spikes each.
    pub fn with_units(sessions: &[(&str, &[UnitId])]) -> Self {
        let spikes = sessions
            .iter()
            .map(|(path, units)| {
                let tags: Array1<UnitId> = units.iter().flat_map(|&u| [u, u]).collect();
                let times = Array1::linspace(0.0, 1.0, tags.len());
                (path.to_string(), SpikeData::new(times, tags).unwrap())
            })
            .collect();

        Self {
            spikes,
            hdf_tracks: HashMap::new(),
            reads: RefCell::new(Vec::new()),
        }
    }

    pub fn count(&self, modality: Modality) -> usize {
        self.reads
            .borrow()
            .iter()
            .filter(|(m, _)| *m == modality)
            .count()
    }

    fn record(&self, modality: Modality, source: &SourceRef<'_>) -> Result<String, NDataError> {
        let path = source.file.display().to_string();
        if path.starts_with("missing") {
            return Err(io::Error::new(io::ErrorKind::NotFound, path).into());
        }
        self.reads.borrow_mut().push((modality, path.clone()));
        Ok(path)
    }
}

impl Reader for ScriptedReader {
    fn read_spike(&self, source: &SourceRef<'_>) -> Result<SpikeData, NDataError> {
        let path = self.record(Modality::Spike, source)?;
        Ok(self.spikes.get(&path).cloned().unwrap_or_default())
    }

    fn read_spatial(&self, source: &SourceRef<'_>) -> Result<SpatialData, NDataError> {
        self.record(Modality::Position, source)?;
        SpatialData::new(array![0.0, 0.5, 1.0], array![1.0, 2.0, 3.0], array![0.0, 0.0, 0.0])
    }

    fn read_lfp(&self, source: &SourceRef<'_>) -> Result<LfpData, NDataError> {
        self.record(Modality::Lfp, source)?;
        Ok(LfpData {
            samples: Array1::zeros(250),
            sampling_rate: 250.0,
        })
    }

    fn read_hdf(&self, source: &SourceRef<'_>) -> Result<HdfContents, NDataError> {
        let path = self.record(Modality::Hdf, source)?;
        Ok(HdfContents {
            spike: self.spikes.get(&path).cloned(),
            spatial: self.hdf_tracks.get(&path).cloned(),
            lfp: None,
        })
    }
}

pub fn container(reader: &Rc<ScriptedReader>, share_positions: bool) -> NDataContainer<NData> {
    let reader = Rc::clone(reader);
    NDataContainer::with_factory(share_positions, move || NData::new(reader.clone()))
}
