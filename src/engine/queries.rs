use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::*;

use super::overlap::{find_conflict, validate_range, validate_window};
use super::{AvailabilityEngine, EngineError};

impl AvailabilityEngine {
    /// Whether `range` is free on the property. Vacuously true for a
    /// property with no bookings.
    pub async fn is_available(
        &self,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<bool, EngineError> {
        validate_range(&range)?;
        let existing = self.bookings.list_by_property(property_id).await?;
        Ok(find_conflict(&existing, &range, self.rule()).is_none())
    }

    /// Ranges of every committed booking on the property, in no particular
    /// order. Reads the same repository path as `is_available`.
    pub async fn booked_ranges(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<DateRange>, EngineError> {
        let existing = self.bookings.list_by_property(property_id).await?;
        Ok(existing.into_iter().map(|b| b.range).collect())
    }

    /// Dates inside `window` (inclusive) a calendar should show as taken,
    /// sorted and deduplicated. Under `CheckoutTurnover` the checkout day of
    /// a stay stays selectable.
    pub async fn blocked_dates(
        &self,
        property_id: PropertyId,
        window: DateRange,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        validate_window(&window)?;

        let rule = self.rule();
        let mut blocked = BTreeSet::new();
        for range in self.booked_ranges(property_id).await? {
            if range.end < window.start || range.start > window.end {
                continue;
            }
            blocked.extend(
                rule.occupied_dates(&range)
                    .skip_while(|d| *d < window.start)
                    .take_while(|d| *d <= window.end),
            );
        }
        Ok(blocked.into_iter().collect())
    }

    /// Host view: the property's bookings ordered by check-in.
    pub async fn bookings_for_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<Booking>, EngineError> {
        let mut bookings = self.bookings.list_by_property(property_id).await?;
        bookings.sort_by_key(|b| (b.range.start, b.id));
        Ok(bookings)
    }

    /// Guest view: all of a guest's trips ordered by check-in.
    pub async fn bookings_for_guest(&self, guest_id: GuestId) -> Result<Vec<Booking>, EngineError> {
        let mut bookings = self.bookings.list_by_guest(guest_id).await?;
        bookings.sort_by_key(|b| (b.range.start, b.id));
        Ok(bookings)
    }
}
