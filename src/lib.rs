mod container;
pub mod manifest;
mod ndata;
pub mod session;
pub mod types;

use std::path::Path;

// Re-export types
pub use container::NDataContainer;
pub use manifest::{FileGroup, Manifest};
pub use ndata::{NData, Reader, SourceRef};
pub use session::{LoadProtocol, Session, Shared};
pub use types::*;

/// Builds and loads a container from a TOML manifest.
///
/// Every file group is registered, all sessions are loaded and, when the
/// manifest names units, they are selected.
///
/// # Examples
///
/// ```no_run
/// use ndata_container::{load, NData, Reader};
/// use std::rc::Rc;
/// # fn reader() -> Rc<dyn Reader> { unimplemented!() }
///
/// let reader = reader();
/// let result = load("batch.toml", move || NData::new(reader.clone()));
/// match result {
///     Ok(container) => println!("{} units across {} sessions", container.len(), container.num_sessions()),
///     Err(e) => println!("Error loading batch: {}", e),
/// }
/// ```
pub fn load<S, F, P>(manifest_path: P, factory: F) -> Result<NDataContainer<S>, ContainerError>
where
    S: Session,
    F: Fn() -> S + 'static,
    P: AsRef<Path>,
{
    let manifest = Manifest::from_path(manifest_path)?;
    let mut container = manifest.build(factory);
    container.load_all()?;
    if let Some(units) = manifest.units {
        container.set_units(units);
    }
    Ok(container)
}
