use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use crate::types::{Modality, UnitId};

/// Data shared by reference between sessions.
///
/// Only the session that created the value writes to it; every other holder
/// treats it as read-only.
pub type Shared<T> = Rc<RefCell<T>>;

/// The setter/loader triple a session runs for one modality.
///
/// The container replays a descriptor by calling `set_name` and `set_file`
/// with the descriptor's fields and then `load`.
pub struct LoadProtocol<S: Session> {
    pub set_file: fn(&mut S, &str),
    pub set_name: fn(&mut S, &str),
    pub load: fn(&mut S) -> Result<(), S::Error>,
}

impl<S: Session> Clone for LoadProtocol<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Session> Copy for LoadProtocol<S> {}

/// A single recording session managed by [`NDataContainer`](crate::NDataContainer).
///
/// The container never inspects a session's data; it only drives the load
/// protocol, asks for the available units and moves the active unit cursor.
pub trait Session: Sized {
    /// Error returned by a failed load
    type Error: Error + Send + Sync + 'static;
    /// Position data shared between sessions in shared-position mode
    type Spatial;

    /// Returns the load protocol for `modality`, or `None` when this session
    /// type cannot load it.
    fn protocol(modality: Modality) -> Option<LoadProtocol<Self>>;

    /// Sets the recording system the session's files were produced by.
    fn set_system(&mut self, system: &str);

    /// Returns every unit available after loading.
    fn unit_list(&self) -> Vec<UnitId>;

    /// Sets the active unit.
    fn set_unit_no(&mut self, unit: UnitId);

    /// Returns a handle to the session's position data.
    fn spatial_handle(&self) -> Shared<Self::Spatial>;

    /// Replaces the session's position data with a handle owned elsewhere.
    fn share_spatial(&mut self, spatial: Shared<Self::Spatial>);
}
