use ulid::Ulid;

use crate::model::{BookingId, DateRange};
use crate::repository::RepoError;

/// Every outcome other than success. All variants are recoverable; only
/// `Busy` and `Storage` are worth retrying unchanged.
#[derive(Debug)]
pub enum EngineError {
    InvalidRange(DateRange),
    GuestCountExceeded {
        requested: u32,
        max: u32,
    },
    /// The stay overlaps a committed booking. `conflicting` is known when the
    /// overlap was found by id.
    DateRangeUnavailable {
        conflicting: Option<BookingId>,
    },
    NotFound(Ulid),
    Unauthorized(BookingId),
    /// The property's reservation lock was not acquired in time.
    Busy(Ulid),
    LimitExceeded(&'static str),
    Storage(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Busy(_) | EngineError::Storage(_))
    }

    /// Stable snake_case tag for clients and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidRange(_) => "invalid_range",
            EngineError::GuestCountExceeded { .. } => "guest_count_exceeded",
            EngineError::DateRangeUnavailable { .. } => "date_range_unavailable",
            EngineError::NotFound(_) => "not_found",
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::Busy(_) => "busy",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange(r) => {
                write!(
                    f,
                    "invalid date range: check-out {} must be after check-in {}",
                    r.end, r.start
                )
            }
            EngineError::GuestCountExceeded { requested, max } => {
                write!(f, "guest count {requested} not allowed: property takes 1 to {max}")
            }
            EngineError::DateRangeUnavailable { conflicting: Some(id) } => {
                write!(f, "dates unavailable: overlaps booking {id}")
            }
            EngineError::DateRangeUnavailable { conflicting: None } => {
                write!(f, "dates unavailable")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Unauthorized(id) => write!(f, "booking {id} belongs to another guest"),
            EngineError::Busy(id) => write!(f, "property {id} is busy, retry"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<RepoError> for EngineError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(id) => EngineError::NotFound(id),
            RepoError::Conflict(id) => EngineError::DateRangeUnavailable {
                conflicting: Some(id),
            },
            RepoError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            RepoError::Storage(e) => EngineError::Storage(e),
        }
    }
}
