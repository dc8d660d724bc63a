pub mod command;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod repository;
pub mod store;
pub mod wal;
pub mod wire;

pub use engine::{AvailabilityEngine, EngineError};
pub use model::{Booking, DateRange, OverlapRule};
pub use repository::{BookingRepository, PropertyLookup, RepoError};
pub use store::Store;
