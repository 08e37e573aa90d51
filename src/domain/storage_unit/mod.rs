//! Storage units and the locations that hold them

pub mod model;
pub mod repository;

pub use model::{Location, StorageStatus, StorageUnit};
pub use repository::{LocationRepository, StorageUnitRepository};
