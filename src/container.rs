use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::iter;
use tracing::{debug, error, info, warn};

use crate::session::Session;
use crate::types::*;

/// Batches many recording sessions and the units selected in each.
///
/// Files are registered per modality with [`add_files`](Self::add_files),
/// where entry `i` of every call describes session `i`. [`load_all`](Self::load_all)
/// creates and loads the sessions, [`set_units`](Self::set_units) selects the
/// units, and [`get`](Self::get) then walks every (session, unit) pair with
/// a single flat index.
///
/// # Examples
///
/// ```no_run
/// use ndata_container::{Modality, NDataContainer, Units};
/// # use ndata_container::NData;
/// # fn reader() -> std::rc::Rc<dyn ndata_container::Reader> { unimplemented!() }
///
/// let reader = reader();
/// let mut container = NDataContainer::with_factory(true, move || NData::new(reader.clone()));
/// container.add_files(Modality::Spike, vec!["day1/spikes", "day2/spikes"]);
/// container.add_files(Modality::Position, vec!["arena/positions"]);
/// container.load_all()?;
/// container.set_units(Units::All);
///
/// for index in 0..container.len() {
///     let session = container.get(index)?;
///     println!("unit {:?}: {} spikes", session.active_unit(), session.unit_stamps().len());
/// }
/// # Ok::<(), ndata_container::ContainerError>(())
/// ```
pub struct NDataContainer<S: Session> {
    share_positions: bool,
    registry: IndexMap<Modality, Vec<FileDescriptor>>,
    sessions: Vec<S>,
    units: Vec<Option<Vec<UnitId>>>,
    // Running total of units up to and including each session
    unit_ends: Vec<usize>,
    factory: Box<dyn Fn() -> S>,
    diagnostics: RefCell<Vec<ConfigError>>,
}

impl<S: Session + Default + 'static> NDataContainer<S> {
    /// Creates an empty container building sessions with `S::default()`.
    pub fn new(share_positions: bool) -> Self {
        Self::with_factory(share_positions, S::default)
    }
}

impl<S: Session> NDataContainer<S> {
    /// Creates an empty container building sessions with `factory`.
    pub fn with_factory<F>(share_positions: bool, factory: F) -> Self
    where
        F: Fn() -> S + 'static,
    {
        Self {
            share_positions,
            registry: IndexMap::new(),
            sessions: Vec::new(),
            units: Vec::new(),
            unit_ends: Vec::new(),
            factory: Box::new(factory),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    /// Whether one position recording is shared by every session.
    pub fn share_positions(&self) -> bool {
        self.share_positions
    }

    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> &[S] {
        &self.sessions
    }

    /// Returns the session at `index`, reporting a diagnostic when there is none.
    pub fn session(&self, index: usize) -> Option<&S> {
        let session = self.sessions.get(index);
        if session.is_none() {
            self.report(ConfigError::SessionOutOfRange {
                index,
                sessions: self.sessions.len(),
            });
        }
        session
    }

    pub fn session_mut(&mut self, index: usize) -> Option<&mut S> {
        if index >= self.sessions.len() {
            self.report(ConfigError::SessionOutOfRange {
                index,
                sessions: self.sessions.len(),
            });
        }
        self.sessions.get_mut(index)
    }

    /// Appends an already built session.
    pub fn push_session(&mut self, session: S) {
        self.sessions.push(session);
    }

    /// Registered descriptors, grouped by modality in first-registration order.
    pub fn registry(&self) -> &IndexMap<Modality, Vec<FileDescriptor>> {
        &self.registry
    }

    pub fn descriptors(&self, modality: Modality) -> &[FileDescriptor] {
        self.registry
            .get(&modality)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registers files for `modality`, one per session slot.
    ///
    /// Mismatched list lengths are reported and leave the registry unchanged.
    /// In shared-position mode a single position file is repeated for every
    /// session registered with spike files.
    pub fn add_files(&mut self, modality: Modality, descriptors: impl Into<Descriptors>) {
        let mut descriptors = descriptors.into();
        let filenames = descriptors.len();

        let lists = [
            ("object names", descriptors.object_names.as_ref()),
            ("systems", descriptors.systems.as_ref()),
        ];
        for (field, list) in lists {
            if let Some(list) = list {
                if list.len() != filenames {
                    self.report(ConfigError::LengthMismatch {
                        modality,
                        field,
                        filenames,
                        len: list.len(),
                    });
                    return;
                }
            }
        }

        if modality == Modality::Position && self.share_positions && filenames == 1 {
            descriptors.replicate_first(self.descriptors(Modality::Spike).len());
        }

        debug!(%modality, count = descriptors.len(), "registering files");
        let bucket = self.registry.entry(modality).or_default();
        bucket.extend((0..descriptors.len()).map(|i| descriptors.descriptor(i)));
    }

    /// Creates any missing sessions and loads every registered descriptor.
    ///
    /// A failing load is returned immediately, leaving the sessions loaded so
    /// far in place.
    pub fn load_all(&mut self) -> Result<(), ContainerError> {
        let required = self.registry.values().map(Vec::len).max().unwrap_or(0);
        if required > self.sessions.len() {
            let missing = required - self.sessions.len();
            debug!(missing, "creating sessions");
            let factory = &self.factory;
            self.sessions
                .extend(iter::repeat_with(|| factory()).take(missing));
        }

        info!(
            sessions = self.sessions.len(),
            modalities = self.registry.len(),
            "loading all sessions"
        );

        for (&modality, descriptors) in &self.registry {
            for (index, descriptor) in descriptors.iter().enumerate() {
                load_descriptor(
                    &mut self.sessions,
                    self.share_positions,
                    index,
                    modality,
                    descriptor,
                )?;
            }
        }

        Ok(())
    }

    /// Selects the units enumerated by the flat index.
    ///
    /// With [`Units::All`] every session reports its own units, so sessions
    /// must be loaded first. Unrecognised explicit entries are reported and
    /// leave that session without units.
    pub fn set_units(&mut self, units: impl Into<Units>) {
        let units: Vec<Option<Vec<UnitId>>> = match units.into() {
            Units::All => self
                .sessions
                .iter()
                .map(|session| Some(session.unit_list()))
                .collect(),
            Units::Explicit(entries) => {
                if entries.len() != self.sessions.len() {
                    self.report(ConfigError::UnitCountMismatch {
                        entries: entries.len(),
                        sessions: self.sessions.len(),
                    });
                }
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(session, entry)| match entry {
                        UnitEntry::Id(unit) => Some(vec![unit]),
                        UnitEntry::Ids(units) => Some(units),
                        UnitEntry::Unrecognised(value) => {
                            self.report(ConfigError::UnrecognisedUnit {
                                session,
                                value: value.to_string(),
                            });
                            None
                        }
                    })
                    .collect()
            }
        };

        self.units = units;
        self.unit_ends = self
            .unit_counts()
            .into_iter()
            .scan(0, |total, count| {
                *total += count;
                Some(*total)
            })
            .collect();
    }

    /// Selected units of every session; `None` where no valid selection was given.
    pub fn units(&self) -> &[Option<Vec<UnitId>>] {
        &self.units
    }

    /// Selected units of one session.
    pub fn session_units(&self, index: usize) -> Option<&[UnitId]> {
        match self.units.get(index) {
            Some(units) => units.as_deref(),
            None => {
                self.report(ConfigError::SessionOutOfRange {
                    index,
                    sessions: self.units.len(),
                });
                None
            }
        }
    }

    /// Number of selected units in each session.
    pub fn unit_counts(&self) -> Vec<usize> {
        self.units
            .iter()
            .map(|units| units.as_ref().map_or(0, Vec::len))
            .collect()
    }

    /// Every unit each session can offer, regardless of the selection.
    pub fn list_all_units(&self) -> Vec<Vec<UnitId>> {
        self.sessions
            .iter()
            .enumerate()
            .map(|(index, session)| {
                let units = session.unit_list();
                info!(session = index, ?units, "available units");
                units
            })
            .collect()
    }

    /// Total number of (session, unit) pairs.
    pub fn len(&self) -> usize {
        self.unit_ends.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps a flat index to `(session, offset)`.
    ///
    /// Sessions cover half-open ranges of the flat index in order, so
    /// sessions without units are skipped.
    pub fn resolve(&self, index: usize) -> Result<(usize, usize), ContainerError> {
        let len = self.len();
        if index >= len {
            return Err(ContainerError::IndexOutOfBounds { index, len });
        }

        let session = self.unit_ends.partition_point(|&end| end <= index);
        let start = match session {
            0 => 0,
            s => self.unit_ends[s - 1],
        };
        Ok((session, index - start))
    }

    /// Resolves a flat index without touching the session.
    pub fn locate(&self, index: usize) -> Result<UnitLocation, ContainerError> {
        let (session, offset) = self.resolve(index)?;
        let unit = self
            .units
            .get(session)
            .and_then(Option::as_ref)
            .and_then(|units| units.get(offset))
            .copied()
            .ok_or(ContainerError::IndexOutOfBounds {
                index,
                len: self.len(),
            })?;

        Ok(UnitLocation {
            session,
            offset,
            unit,
        })
    }

    /// Returns the session for a flat index with its active unit set.
    ///
    /// The session is not copied: two indices in the same session return the
    /// same object, and each call moves its active unit.
    pub fn get(&mut self, index: usize) -> Result<&mut S, ContainerError> {
        let location = self.locate(index)?;
        let sessions = self.sessions.len();
        let session = self
            .sessions
            .get_mut(location.session)
            .ok_or(ContainerError::MissingSession {
                session: location.session,
                sessions,
            })?;

        session.set_unit_no(location.unit);
        Ok(session)
    }

    /// Configuration errors reported so far.
    pub fn diagnostics(&self) -> Vec<ConfigError> {
        self.diagnostics.borrow().clone()
    }

    /// Returns and clears the reported configuration errors.
    pub fn take_diagnostics(&mut self) -> Vec<ConfigError> {
        std::mem::take(self.diagnostics.get_mut())
    }

    fn report(&self, problem: ConfigError) {
        match problem {
            ConfigError::UnitCountMismatch { .. } => warn!(%problem, "configuration mismatch"),
            _ => error!(%problem, "configuration error"),
        }
        self.diagnostics.borrow_mut().push(problem);
    }
}

/// Replays one descriptor through the session at `index`.
fn load_descriptor<S: Session>(
    sessions: &mut [S],
    share_positions: bool,
    index: usize,
    modality: Modality,
    descriptor: &FileDescriptor,
) -> Result<(), ContainerError> {
    let protocol = S::protocol(modality).ok_or(ContainerError::UnsupportedModality {
        modality,
        session: index,
    })?;

    debug!(session = index, %modality, ?descriptor, "loading descriptor");

    let session = &mut sessions[index];
    if let Some(name) = &descriptor.object_name {
        (protocol.set_name)(session, name);
    }
    if let Some(system) = &descriptor.system {
        session.set_system(system);
    }

    if modality == Modality::Position && share_positions && index > 0 {
        let spatial = sessions[0].spatial_handle();
        sessions[index].share_spatial(spatial);
        return Ok(());
    }

    if let Some(filename) = &descriptor.filename {
        (protocol.set_file)(session, filename);
        (protocol.load)(session).map_err(|e| ContainerError::Load {
            modality,
            session: index,
            source: Box::new(e),
        })?;
        info!(session = index, %modality, %filename, "loaded");
    }

    Ok(())
}

impl<S: Session> fmt::Display for NDataContainer<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "NData container with {} sessions", self.sessions.len())?;
        writeln!(f, "Files are")?;
        for (modality, descriptors) in &self.registry {
            let names: Vec<&str> = descriptors
                .iter()
                .map(|d| d.filename.as_deref().unwrap_or("-"))
                .collect();
            writeln!(f, "  {}: {:?}", modality, names)?;
        }
        write!(f, "Units are {:?}", self.units)
    }
}

impl<S: Session> fmt::Debug for NDataContainer<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NDataContainer")
            .field("share_positions", &self.share_positions)
            .field("registry", &self.registry)
            .field("sessions", &self.sessions.len())
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}
