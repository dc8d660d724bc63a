use async_trait::async_trait;

use crate::model::*;
use crate::repository::{BookingRepository, PropertyLookup, RepoError};

use super::Store;

#[async_trait]
impl BookingRepository for Store {
    async fn list_by_property(&self, property_id: PropertyId) -> Result<Vec<Booking>, RepoError> {
        let Some(ps) = self.get_property(&property_id) else {
            return Ok(Vec::new());
        };
        let guard = ps.read().await;
        Ok(guard.bookings.clone())
    }

    async fn list_by_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, RepoError> {
        let ids: Vec<BookingId> = self
            .by_guest
            .get(&guest_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(booking) = self.get(id).await? {
                out.push(booking);
            }
        }
        Ok(out)
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>, RepoError> {
        let Some(ps) = self
            .property_for_booking(&booking_id)
            .and_then(|pid| self.get_property(&pid))
        else {
            return Ok(None);
        };
        let guard = ps.read().await;
        Ok(guard.get(booking_id).cloned())
    }

    async fn insert(&self, candidate: BookingCandidate) -> Result<Booking, RepoError> {
        self.insert_checked(candidate).await
    }

    async fn delete(&self, booking_id: BookingId) -> Result<bool, RepoError> {
        self.remove(booking_id).await
    }
}

#[async_trait]
impl PropertyLookup for Store {
    async fn max_guests(&self, property_id: PropertyId) -> Result<u32, RepoError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(RepoError::NotFound(property_id))?;
        let guard = ps.read().await;
        Ok(guard.max_guests)
    }
}
