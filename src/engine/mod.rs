mod error;
mod mutations;
mod overlap;
mod queries;

pub use error::EngineError;
pub use overlap::find_conflict;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::EngineConfig;
use crate::model::*;
use crate::observability::{LOCK_TIMEOUTS_TOTAL, LOCK_WAIT_SECONDS};
use crate::repository::{BookingRepository, PropertyLookup};
use crate::store::Store;

/// Decides whether stays fit a property's calendar and claims them.
///
/// Reservation and cancellation hold a per-property lock across their
/// check and write, so two callers can never both win an overlapping
/// range. Reads go straight to the repository and never take the lock.
pub struct AvailabilityEngine {
    bookings: Arc<dyn BookingRepository>,
    properties: Arc<dyn PropertyLookup>,
    config: EngineConfig,
    locks: DashMap<PropertyId, Arc<Mutex<()>>>,
}

impl AvailabilityEngine {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        properties: Arc<dyn PropertyLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bookings,
            properties,
            config,
            locks: DashMap::new(),
        }
    }

    /// Engine over a [`Store`], which serves both collaborator roles. The
    /// store's overlap rule wins so the engine and the conditional insert
    /// never disagree.
    pub fn with_store(store: Arc<Store>, config: EngineConfig) -> Self {
        if store.rule() != config.overlap_rule {
            tracing::warn!(
                "engine overlap rule {:?} replaced by store rule {:?}",
                config.overlap_rule,
                store.rule()
            );
        }
        let config = EngineConfig {
            overlap_rule: store.rule(),
            ..config
        };
        Self::new(store.clone(), store, config)
    }

    pub fn rule(&self) -> OverlapRule {
        self.config.overlap_rule
    }

    /// Take the property's reservation lock, waiting at most `lock_timeout`.
    async fn lock_property(
        &self,
        property_id: PropertyId,
    ) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = self.locks.entry(property_id).or_default().value().clone();
        let started = Instant::now();
        match tokio::time::timeout(self.config.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => {
                metrics::histogram!(LOCK_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
                Ok(guard)
            }
            Err(_) => {
                metrics::counter!(LOCK_TIMEOUTS_TOTAL).increment(1);
                tracing::warn!(
                    "lock wait on property {property_id} exceeded {:?}",
                    self.config.lock_timeout
                );
                Err(EngineError::Busy(property_id))
            }
        }
    }
}
