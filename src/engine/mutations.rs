use tracing::{debug, info};

use crate::model::*;
use crate::observability::{CANCELLATIONS_TOTAL, RESERVATIONS_TOTAL};

use super::overlap::{check_guest_count, find_conflict, validate_range};
use super::{AvailabilityEngine, EngineError};

fn outcome<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

impl AvailabilityEngine {
    /// Claim `range` on a property for a guest.
    ///
    /// Preconditions are checked in order, first failure wins: a valid range,
    /// a guest count within the property's capacity, then availability. The
    /// availability check and the insert run under the property's lock.
    pub async fn reserve(
        &self,
        property_id: PropertyId,
        guest_id: GuestId,
        range: DateRange,
        guest_count: u32,
    ) -> Result<Booking, EngineError> {
        let result = self
            .reserve_locked(property_id, guest_id, range, guest_count)
            .await;
        metrics::counter!(RESERVATIONS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result
    }

    async fn reserve_locked(
        &self,
        property_id: PropertyId,
        guest_id: GuestId,
        range: DateRange,
        guest_count: u32,
    ) -> Result<Booking, EngineError> {
        validate_range(&range)?;
        let max_guests = self.properties.max_guests(property_id).await?;
        check_guest_count(guest_count, max_guests)?;

        let _guard = self.lock_property(property_id).await?;

        let existing = self.bookings.list_by_property(property_id).await?;
        if let Some(conflict) = find_conflict(&existing, &range, self.rule()) {
            debug!(
                "reserve {property_id} {}..{} rejected: overlaps {}",
                range.start, range.end, conflict.id
            );
            return Err(EngineError::DateRangeUnavailable {
                conflicting: Some(conflict.id),
            });
        }

        let candidate = BookingCandidate {
            property_id,
            guest_id,
            range,
            guest_count,
        };
        // Repositories with a conditional insert report their own conflicts.
        let booking = self.bookings.insert(candidate).await?;
        info!(
            "booking {} committed: property {property_id}, {}..{}, {guest_count} guests",
            booking.id, range.start, range.end
        );
        Ok(booking)
    }

    /// Remove a booking on behalf of its guest, returning what was removed.
    ///
    /// The ownership check and the delete run under the property's lock, so a
    /// concurrent reservation sees the booking either fully present or gone.
    pub async fn cancel_checked(
        &self,
        booking_id: BookingId,
        guest_id: GuestId,
    ) -> Result<Booking, EngineError> {
        let result = self.cancel_locked(booking_id, guest_id).await;
        metrics::counter!(CANCELLATIONS_TOTAL, "outcome" => outcome(&result)).increment(1);
        result
    }

    async fn cancel_locked(
        &self,
        booking_id: BookingId,
        guest_id: GuestId,
    ) -> Result<Booking, EngineError> {
        let property_id = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?
            .property_id;

        let _guard = self.lock_property(property_id).await?;

        // Re-read: another cancel may have removed it while we waited.
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.guest_id != guest_id {
            debug!("cancel {booking_id} refused: guest {guest_id} is not the owner");
            return Err(EngineError::Unauthorized(booking_id));
        }
        if !self.bookings.delete(booking_id).await? {
            return Err(EngineError::NotFound(booking_id));
        }
        info!("booking {booking_id} cancelled by guest {guest_id}");
        Ok(booking)
    }

    /// `true` if the booking was removed; `false` if it does not exist or
    /// belongs to someone else. Transient failures remain errors.
    pub async fn cancel(
        &self,
        booking_id: BookingId,
        guest_id: GuestId,
    ) -> Result<bool, EngineError> {
        match self.cancel_checked(booking_id, guest_id).await {
            Ok(_) => Ok(true),
            Err(EngineError::NotFound(_) | EngineError::Unauthorized(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
