use ndarray::Array1;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use crate::session::{LoadProtocol, Session, Shared};
use crate::types::*;

/// The file a reader is asked to open, and how to interpret it.
#[derive(Debug, Clone, Copy)]
pub struct SourceRef<'a> {
    /// Path of the file
    pub file: &'a Path,
    /// Object inside the file (tetrode, channel, HDF group path)
    pub name: Option<&'a str>,
    /// Recording system that produced the file
    pub system: Option<&'a str>,
}

impl SourceRef<'_> {
    /// The system tag, or `"unspecified"`.
    pub fn system_or_default(&self) -> &str {
        self.system.unwrap_or("unspecified")
    }
}

/// Format readers used by [`NData`] to turn files into in-memory data.
///
/// Readers are chosen by the caller; `NData` only forwards the file, object
/// name and system tag it was configured with.
pub trait Reader {
    /// Reads the spike train of one tetrode or sorting output.
    fn read_spike(&self, source: &SourceRef<'_>) -> Result<SpikeData, NDataError>;

    /// Reads a position track.
    fn read_spatial(&self, source: &SourceRef<'_>) -> Result<SpatialData, NDataError>;

    /// Reads one LFP channel.
    fn read_lfp(&self, source: &SourceRef<'_>) -> Result<LfpData, NDataError>;

    /// Reads every modality stored in an HDF5/NWB file.
    ///
    /// Readers without HDF support keep the default, which fails.
    fn read_hdf(&self, source: &SourceRef<'_>) -> Result<HdfContents, NDataError> {
        Err(NDataError::Unsupported {
            modality: Modality::Hdf,
            system: source.system_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct Source {
    file: Option<PathBuf>,
    name: Option<String>,
}

/// Spike, position and LFP data of one recording session.
///
/// Position data is held behind a [`Shared`] handle so several sessions can
/// point at one track. [`load_spatial`](Self::load_spatial) writes through the
/// handle, so every session sharing it sees the new track.
pub struct NData {
    reader: Rc<dyn Reader>,
    system: Option<String>,
    spike_source: Source,
    spatial_source: Source,
    lfp_source: Source,
    hdf_source: Source,
    spike: SpikeData,
    spatial: Shared<SpatialData>,
    lfp: LfpData,
    unit_no: Option<UnitId>,
}

impl NData {
    /// Creates an empty session reading its files with `reader`.
    pub fn new(reader: Rc<dyn Reader>) -> Self {
        Self {
            reader,
            system: None,
            spike_source: Source::default(),
            spatial_source: Source::default(),
            lfp_source: Source::default(),
            hdf_source: Source::default(),
            spike: SpikeData::default(),
            spatial: Rc::new(RefCell::new(SpatialData::default())),
            lfp: LfpData::default(),
            unit_no: None,
        }
    }

    pub fn set_system(&mut self, system: impl Into<String>) {
        self.system = Some(system.into());
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn set_spike_file(&mut self, file: impl Into<PathBuf>) {
        self.spike_source.file = Some(file.into());
    }

    pub fn set_spike_name(&mut self, name: impl Into<String>) {
        self.spike_source.name = Some(name.into());
    }

    pub fn set_spatial_file(&mut self, file: impl Into<PathBuf>) {
        self.spatial_source.file = Some(file.into());
    }

    pub fn set_spatial_name(&mut self, name: impl Into<String>) {
        self.spatial_source.name = Some(name.into());
    }

    pub fn set_lfp_file(&mut self, file: impl Into<PathBuf>) {
        self.lfp_source.file = Some(file.into());
    }

    pub fn set_lfp_name(&mut self, name: impl Into<String>) {
        self.lfp_source.name = Some(name.into());
    }

    pub fn set_hdf_file(&mut self, file: impl Into<PathBuf>) {
        self.hdf_source.file = Some(file.into());
    }

    /// Sets the group path inside the HDF file.
    pub fn set_hdf_name(&mut self, name: impl Into<String>) {
        self.hdf_source.name = Some(name.into());
    }

    /// Loads spike data from the configured spike file.
    pub fn load_spike(&mut self) -> Result<(), NDataError> {
        let spike = {
            let source = self.source(Modality::Spike)?;
            debug!(file = %source.file.display(), system = source.system_or_default(), "reading spike data");
            self.reader.read_spike(&source)?
        };
        self.spike = spike;
        Ok(())
    }

    /// Loads position data, replacing the track in place.
    ///
    /// Sessions sharing the track see the new data, so only the session that
    /// owns a shared track may call this.
    pub fn load_spatial(&mut self) -> Result<(), NDataError> {
        let spatial = {
            let source = self.source(Modality::Position)?;
            debug!(file = %source.file.display(), system = source.system_or_default(), "reading position data");
            self.reader.read_spatial(&source)?
        };
        *self.spatial.borrow_mut() = spatial;
        Ok(())
    }

    pub fn load_lfp(&mut self) -> Result<(), NDataError> {
        let lfp = {
            let source = self.source(Modality::Lfp)?;
            debug!(file = %source.file.display(), system = source.system_or_default(), "reading LFP data");
            self.reader.read_lfp(&source)?
        };
        self.lfp = lfp;
        Ok(())
    }

    /// Loads whichever modalities the configured HDF file contains.
    ///
    /// Position data read this way replaces the session's handle rather than
    /// writing through it, so a shared track is left untouched.
    pub fn load_hdf(&mut self) -> Result<(), NDataError> {
        let contents = {
            let source = self.source(Modality::Hdf)?;
            debug!(file = %source.file.display(), group = ?source.name, "reading HDF data");
            self.reader.read_hdf(&source)?
        };

        if let Some(spike) = contents.spike {
            self.spike = spike;
        }
        // A track from the HDF file belongs to this session alone
        if let Some(spatial) = contents.spatial {
            self.spatial = Rc::new(RefCell::new(spatial));
        }
        if let Some(lfp) = contents.lfp {
            self.lfp = lfp;
        }
        Ok(())
    }

    pub fn spike(&self) -> &SpikeData {
        &self.spike
    }

    /// Borrows the position data.
    ///
    /// # Panics
    ///
    /// Panics if the track is being reloaded through another session sharing it.
    pub fn spatial(&self) -> Ref<'_, SpatialData> {
        self.spatial.borrow()
    }

    pub fn lfp(&self) -> &LfpData {
        &self.lfp
    }

    /// Sorted units present in the spike data.
    pub fn unit_list(&self) -> Vec<UnitId> {
        self.spike.unit_list()
    }

    pub fn set_unit_no(&mut self, unit: UnitId) {
        self.unit_no = Some(unit);
    }

    pub fn active_unit(&self) -> Option<UnitId> {
        self.unit_no
    }

    /// Spike times of the active unit; empty when no unit is active.
    pub fn unit_stamps(&self) -> Array1<f64> {
        match self.unit_no {
            Some(unit) => self.spike.unit_stamps(unit),
            None => Array1::zeros(0),
        }
    }

    fn source(&self, modality: Modality) -> Result<SourceRef<'_>, NDataError> {
        let source = match modality {
            Modality::Spike => &self.spike_source,
            Modality::Position => &self.spatial_source,
            Modality::Lfp => &self.lfp_source,
            Modality::Hdf => &self.hdf_source,
        };
        let file = source.file.as_deref().ok_or(NDataError::NoFile(modality))?;

        Ok(SourceRef {
            file,
            name: source.name.as_deref(),
            system: self.system.as_deref(),
        })
    }
}

impl Session for NData {
    type Error = NDataError;
    type Spatial = SpatialData;

    fn protocol(modality: Modality) -> Option<LoadProtocol<Self>> {
        let protocol: LoadProtocol<Self> = match modality {
            Modality::Spike => LoadProtocol {
                set_file: |d, f| d.set_spike_file(f),
                set_name: |d, n| d.set_spike_name(n),
                load: NData::load_spike,
            },
            Modality::Position => LoadProtocol {
                set_file: |d, f| d.set_spatial_file(f),
                set_name: |d, n| d.set_spatial_name(n),
                load: NData::load_spatial,
            },
            Modality::Lfp => LoadProtocol {
                set_file: |d, f| d.set_lfp_file(f),
                set_name: |d, n| d.set_lfp_name(n),
                load: NData::load_lfp,
            },
            Modality::Hdf => LoadProtocol {
                set_file: |d, f| d.set_hdf_file(f),
                set_name: |d, n| d.set_hdf_name(n),
                load: NData::load_hdf,
            },
        };
        Some(protocol)
    }

    fn set_system(&mut self, system: &str) {
        NData::set_system(self, system);
    }

    fn unit_list(&self) -> Vec<UnitId> {
        NData::unit_list(self)
    }

    fn set_unit_no(&mut self, unit: UnitId) {
        NData::set_unit_no(self, unit);
    }

    fn spatial_handle(&self) -> Shared<SpatialData> {
        Rc::clone(&self.spatial)
    }

    fn share_spatial(&mut self, spatial: Shared<SpatialData>) {
        self.spatial = spatial;
    }
}

impl fmt::Debug for NData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NData")
            .field("system", &self.system)
            .field("spike_file", &self.spike_source.file)
            .field("spatial_file", &self.spatial_source.file)
            .field("lfp_file", &self.lfp_source.file)
            .field("hdf_file", &self.hdf_source.file)
            .field("num_spikes", &self.spike.num_spikes())
            .field("unit_no", &self.unit_no)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::cell::RefCell;

    #[derive(Default)]
    struct EchoReader {
        seen: RefCell<Vec<String>>,
    }

    impl EchoReader {
        fn record(&self, kind: &str, source: &SourceRef<'_>) {
            self.seen.borrow_mut().push(format!(
                "{} {} {} {}",
                kind,
                source.file.display(),
                source.name.unwrap_or("-"),
                source.system_or_default()
            ));
        }
    }

    impl Reader for EchoReader {
        fn read_spike(&self, source: &SourceRef<'_>) -> Result<SpikeData, NDataError> {
            self.record("spike", source);
            SpikeData::new(array![0.5, 1.0, 1.5, 2.0], array![2, 1, 2, 0])
        }

        fn read_spatial(&self, source: &SourceRef<'_>) -> Result<SpatialData, NDataError> {
            self.record("spatial", source);
            SpatialData::new(array![0.0, 10.0], array![1.0, 2.0], array![3.0, 4.0])
        }

        fn read_lfp(&self, source: &SourceRef<'_>) -> Result<LfpData, NDataError> {
            self.record("lfp", source);
            Ok(LfpData {
                samples: Array1::zeros(100),
                sampling_rate: 50.0,
            })
        }
    }

    #[test]
    fn load_forwards_file_name_and_system() {
        let reader = Rc::new(EchoReader::default());
        let mut ndata = NData::new(reader.clone());
        ndata.set_system("Axona");
        ndata.set_spike_file("day1/tetrode.3");
        ndata.set_spike_name("3");
        ndata.load_spike().unwrap();

        assert_eq!(*reader.seen.borrow(), vec!["spike day1/tetrode.3 3 Axona"]);
        assert_eq!(ndata.unit_list(), vec![1, 2]);
    }

    #[test]
    fn load_without_file_fails() {
        let mut ndata = NData::new(Rc::new(EchoReader::default()));
        assert!(matches!(
            ndata.load_lfp(),
            Err(NDataError::NoFile(Modality::Lfp))
        ));
    }

    #[test]
    fn hdf_is_unsupported_by_default() {
        let mut ndata = NData::new(Rc::new(EchoReader::default()));
        ndata.set_system("NWB");
        ndata.set_hdf_file("session.hdf5");
        let err = ndata.load_hdf().unwrap_err();
        assert!(matches!(
            err,
            NDataError::Unsupported {
                modality: Modality::Hdf,
                ref system,
            } if system == "NWB"
        ));
    }

    #[test]
    fn active_unit_selects_stamps() {
        let mut ndata = NData::new(Rc::new(EchoReader::default()));
        assert_eq!(ndata.unit_stamps().len(), 0);

        ndata.set_spike_file("spikes");
        ndata.load_spike().unwrap();
        ndata.set_unit_no(2);
        assert_eq!(ndata.active_unit(), Some(2));
        assert_eq!(ndata.unit_stamps(), array![0.5, 1.5]);
    }

    #[test]
    fn spatial_reload_is_seen_by_sharers() {
        let reader = Rc::new(EchoReader::default());
        let mut owner = NData::new(reader.clone());
        let mut sharer = NData::new(reader);
        sharer.share_spatial(owner.spatial_handle());

        owner.set_spatial_file("arena.pos");
        owner.load_spatial().unwrap();
        assert_eq!(sharer.spatial().num_samples(), 2);
        assert_eq!(sharer.spatial().duration(), 10.0);
    }

    #[test]
    fn protocol_covers_every_modality() {
        for modality in Modality::ALL {
            assert!(NData::protocol(modality).is_some());
        }

        let mut ndata = NData::new(Rc::new(EchoReader::default()));
        let protocol = NData::protocol(Modality::Lfp).unwrap();
        (protocol.set_file)(&mut ndata, "eeg.eeg");
        (protocol.load)(&mut ndata).unwrap();
        assert_eq!(ndata.lfp().duration(), 2.0);
    }
}
