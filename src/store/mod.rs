//! Reference booking repository.
//!
//! Bookings are kept per property behind a `tokio::sync::RwLock`. Inserts
//! re-check overlap under the property's write lock, so the store never
//! commits two conflicting stays even when called without the engine.
//! With a log path, every change is appended to the write-ahead log before
//! it is applied in memory.

mod repository;
mod wal_writer;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::repository::RepoError;
use crate::wal::Wal;

use wal_writer::{run_wal_writer, WalCommand};

pub type SharedPropertyState = Arc<RwLock<PropertyBookings>>;

pub struct Store {
    properties: DashMap<PropertyId, SharedPropertyState>,
    /// Reverse lookup: booking id → property id.
    booking_to_property: DashMap<BookingId, PropertyId>,
    /// Guest → their booking ids.
    by_guest: DashMap<GuestId, Vec<BookingId>>,
    rule: OverlapRule,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    /// Held shared by every mutation from log append to in-memory apply, and
    /// exclusively by compaction, so no append can land between the snapshot
    /// and the log swap.
    write_gate: RwLock<()>,
    pub notify: Arc<NotifyHub>,
}

impl Store {
    /// Volatile store. State is lost when dropped.
    pub fn in_memory(rule: OverlapRule) -> Self {
        Self::empty(rule, None, Arc::new(NotifyHub::new()))
    }

    /// Durable store backed by the log at `wal_path`, replayed on open.
    /// Spawns the log writer task, so this must run inside a tokio runtime.
    pub fn open(
        wal_path: PathBuf,
        rule: OverlapRule,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(run_wal_writer(wal, wal_rx));

        let store = Self::empty(rule, Some(wal_tx), notify);
        for event in &events {
            store.replay_event(event);
        }
        tracing::info!(
            "store opened from {}: {} events, {} properties",
            wal_path.display(),
            events.len(),
            store.properties.len()
        );
        Ok(store)
    }

    fn empty(
        rule: OverlapRule,
        wal_tx: Option<mpsc::Sender<WalCommand>>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            properties: DashMap::new(),
            booking_to_property: DashMap::new(),
            by_guest: DashMap::new(),
            rule,
            wal_tx,
            write_gate: RwLock::new(()),
            notify,
        }
    }

    // A repeated registration only changes capacity. Replay owns every Arc,
    // so try_write never contends; blocking locks are off-limits because
    // open() may run inside an async context.
    fn replay_event(&self, event: &Event) {
        if let Event::PropertyRegistered { id, max_guests } = event
            && !self.properties.contains_key(id)
        {
            self.properties
                .insert(*id, Arc::new(RwLock::new(PropertyBookings::new(*id, *max_guests))));
            return;
        }
        let Some(ps) = self.get_property(&event.property_id()) else {
            tracing::warn!("replay: event for unknown property {}", event.property_id());
            return;
        };
        if let Ok(mut guard) = ps.try_write() {
            self.apply_event(&mut guard, event);
        }
    }

    pub fn rule(&self) -> OverlapRule {
        self.rule
    }

    pub fn get_property(&self, id: &PropertyId) -> Option<SharedPropertyState> {
        self.properties.get(id).map(|e| e.value().clone())
    }

    pub fn property_for_booking(&self, booking_id: &BookingId) -> Option<PropertyId> {
        self.booking_to_property.get(booking_id).map(|e| *e.value())
    }

    /// Whether `ps` is still the table registered under `id`. A table can be
    /// unpublished by a registration whose log append failed.
    fn is_live(&self, id: &PropertyId, ps: &SharedPropertyState) -> bool {
        self.properties
            .get(id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), ps))
    }

    /// Register a property, or change its capacity if it already exists.
    ///
    /// A new table is published already write-locked, so concurrent
    /// registrations of the same id log in the order they take effect.
    pub async fn register_property(
        &self,
        id: PropertyId,
        max_guests: u32,
    ) -> Result<PropertyInfo, RepoError> {
        validate_capacity(max_guests)?;
        let _gate = self.write_gate.read().await;
        loop {
            if let Some(ps) = self.get_property(&id) {
                let mut guard = ps.write().await;
                if !self.is_live(&id, &ps) {
                    continue;
                }
                let event = Event::PropertyUpdated { id, max_guests };
                self.persist_and_apply(&mut guard, &event).await?;
                return Ok(guard.info());
            }
            if self.properties.len() >= MAX_PROPERTIES {
                return Err(RepoError::LimitExceeded("too many properties"));
            }

            let fresh = Arc::new(RwLock::new(PropertyBookings::new(id, max_guests)));
            let guard = fresh
                .clone()
                .try_write_owned()
                .map_err(|_| RepoError::Storage("new property table already locked".into()))?;
            match self.properties.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(fresh);
                }
            }

            let event = Event::PropertyRegistered { id, max_guests };
            if let Err(e) = self.wal_append(&event).await {
                self.properties.remove(&id);
                return Err(e);
            }
            self.notify.send(id, &event);
            tracing::info!("registered property {id} (max_guests={max_guests})");
            return Ok(guard.info());
        }
    }

    pub async fn update_max_guests(
        &self,
        id: PropertyId,
        max_guests: u32,
    ) -> Result<PropertyInfo, RepoError> {
        validate_capacity(max_guests)?;
        let _gate = self.write_gate.read().await;
        let ps = self.get_property(&id).ok_or(RepoError::NotFound(id))?;
        let mut guard = ps.write().await;
        if !self.is_live(&id, &ps) {
            return Err(RepoError::NotFound(id));
        }
        let event = Event::PropertyUpdated { id, max_guests };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.info())
    }

    /// Apply a state change to a property already locked by the caller and
    /// keep the reverse indexes in step.
    fn apply_event(&self, ps: &mut PropertyBookings, event: &Event) {
        match event {
            Event::PropertyRegistered { max_guests, .. }
            | Event::PropertyUpdated { max_guests, .. } => ps.max_guests = *max_guests,
            Event::BookingCreated {
                id,
                property_id,
                guest_id,
                range,
                guest_count,
            } => {
                ps.insert_booking(Booking {
                    id: *id,
                    property_id: *property_id,
                    guest_id: *guest_id,
                    range: *range,
                    guest_count: *guest_count,
                });
                self.booking_to_property.insert(*id, *property_id);
                self.by_guest.entry(*guest_id).or_default().push(*id);
            }
            Event::BookingCancelled { id, .. } => {
                if let Some(removed) = ps.remove_booking(*id)
                    && let Some(mut ids) = self.by_guest.get_mut(&removed.guest_id)
                {
                    ids.retain(|b| b != id);
                }
                self.booking_to_property.remove(id);
            }
        }
    }

    async fn wal_append(&self, event: &Event) -> Result<(), RepoError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| RepoError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| RepoError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| RepoError::Storage(e.to_string()))
    }

    /// Log, apply, notify. Nothing is applied if the log append fails.
    /// Callers hold the write gate.
    async fn persist_and_apply(
        &self,
        ps: &mut PropertyBookings,
        event: &Event,
    ) -> Result<(), RepoError> {
        self.wal_append(event).await?;
        self.apply_event(ps, event);
        self.notify.send(ps.id, event);
        Ok(())
    }

    pub(crate) async fn insert_checked(
        &self,
        candidate: BookingCandidate,
    ) -> Result<Booking, RepoError> {
        let property_id = candidate.property_id;
        let _gate = self.write_gate.read().await;
        let ps = self
            .get_property(&property_id)
            .ok_or(RepoError::NotFound(property_id))?;
        let mut guard = ps.write().await;
        if !self.is_live(&property_id, &ps) {
            return Err(RepoError::NotFound(property_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_PROPERTY {
            return Err(RepoError::LimitExceeded("too many bookings on property"));
        }
        if let Some(existing) = guard
            .overlapping(&candidate.range, self.rule)
            .next()
            .map(|b| b.id)
        {
            return Err(RepoError::Conflict(existing));
        }

        let booking = candidate.commit(Ulid::new());
        self.persist_and_apply(&mut guard, &Event::booking_created(&booking))
            .await?;
        Ok(booking)
    }

    pub(crate) async fn remove(&self, booking_id: BookingId) -> Result<bool, RepoError> {
        let _gate = self.write_gate.read().await;
        let Some(property_id) = self.property_for_booking(&booking_id) else {
            return Ok(false);
        };
        let Some(ps) = self.get_property(&property_id) else {
            return Ok(false);
        };
        let mut guard = ps.write().await;
        // A concurrent delete may have won between the index lookup and the lock.
        if guard.get(booking_id).is_none() {
            return Ok(false);
        }
        let event = Event::BookingCancelled {
            id: booking_id,
            property_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(true)
    }

    /// Rewrite the log as the minimal event sequence reproducing current state.
    ///
    /// Mutations are paused from the snapshot until the new log is in place.
    pub async fn compact(&self) -> Result<(), RepoError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let _gate = self.write_gate.write().await;
        let handles: Vec<SharedPropertyState> =
            self.properties.iter().map(|e| e.value().clone()).collect();

        let mut events = Vec::new();
        for ps in handles {
            let guard = ps.read().await;
            events.push(Event::PropertyRegistered {
                id: guard.id,
                max_guests: guard.max_guests,
            });
            events.extend(guard.bookings.iter().map(Event::booking_created));
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| RepoError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| RepoError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| RepoError::Storage(e.to_string()))?;
        tracing::info!("compacted log to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_capacity(max_guests: u32) -> Result<(), RepoError> {
    if max_guests == 0 || max_guests > MAX_GUESTS_PER_PROPERTY {
        return Err(RepoError::LimitExceeded("max_guests out of range"));
    }
    Ok(())
}
