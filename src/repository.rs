use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub enum RepoError {
    NotFound(Ulid),
    /// Conditional insert refused: the candidate overlaps this booking.
    Conflict(BookingId),
    LimitExceeded(&'static str),
    /// Storage unavailable or failed. Retryable.
    Storage(String),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoError::NotFound(id) => write!(f, "not found: {id}"),
            RepoError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            RepoError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            RepoError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for RepoError {}

/// Where committed bookings live. The engine never mutates a booking in
/// place: it reads, inserts, and deletes.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// All committed bookings for a property. Unknown properties have none.
    async fn list_by_property(&self, property_id: PropertyId) -> Result<Vec<Booking>, RepoError>;

    async fn list_by_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, RepoError>;

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>, RepoError>;

    /// Persist a new booking and assign its id.
    ///
    /// Implementations that can check overlap atomically return
    /// `RepoError::Conflict` instead of storing an overlapping row.
    async fn insert(&self, candidate: BookingCandidate) -> Result<Booking, RepoError>;

    /// Remove a booking. `false` if it did not exist.
    async fn delete(&self, booking_id: BookingId) -> Result<bool, RepoError>;
}

/// Read-only view of property capacity.
#[async_trait]
pub trait PropertyLookup: Send + Sync {
    async fn max_guests(&self, property_id: PropertyId) -> Result<u32, RepoError>;
}
