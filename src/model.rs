use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type PropertyId = Ulid;
pub type GuestId = Ulid;
pub type BookingId = Ulid;

/// Check-in / check-out pair of calendar dates.
///
/// A valid range spans at least one night (`start < end`). The constructor
/// does not enforce this; the engine rejects invalid ranges before any
/// overlap check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Closed-interval membership: `start <= date <= end`.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// How two stays are compared for conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapRule {
    /// Closed intervals. A checkout date equal to another stay's check-in
    /// date is a conflict.
    #[default]
    Inclusive,
    /// Half-open `[start, end)`. The checkout day is free for the next
    /// check-in.
    CheckoutTurnover,
}

impl OverlapRule {
    pub fn overlaps(self, a: &DateRange, b: &DateRange) -> bool {
        match self {
            OverlapRule::Inclusive => {
                b.contains_date(a.start) || b.contains_date(a.end) || a.contains_date(b.start)
            }
            OverlapRule::CheckoutTurnover => a.start < b.end && b.start < a.end,
        }
    }

    /// Whether a booked range makes `date` unavailable on a calendar.
    pub fn occupies(self, range: &DateRange, date: NaiveDate) -> bool {
        match self {
            OverlapRule::Inclusive => range.contains_date(date),
            OverlapRule::CheckoutTurnover => range.start <= date && date < range.end,
        }
    }

    /// Every calendar date `range` occupies under this rule, in order.
    pub fn occupied_dates(self, range: &DateRange) -> impl Iterator<Item = NaiveDate> {
        let last = match self {
            OverlapRule::Inclusive => Some(range.end),
            OverlapRule::CheckoutTurnover => range.end.checked_sub_days(Days::new(1)),
        };
        let mut next = Some(range.start);
        std::iter::from_fn(move || {
            let day = next?;
            if last.is_none_or(|l| day > l) {
                return None;
            }
            next = day.succ_opt();
            Some(day)
        })
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inclusive" => Some(OverlapRule::Inclusive),
            "turnover" | "checkout_turnover" | "half_open" => Some(OverlapRule::CheckoutTurnover),
            _ => None,
        }
    }
}

/// A committed reservation. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub property_id: PropertyId,
    pub guest_id: GuestId,
    pub range: DateRange,
    pub guest_count: u32,
}

/// A booking that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCandidate {
    pub property_id: PropertyId,
    pub guest_id: GuestId,
    pub range: DateRange,
    pub guest_count: u32,
}

impl BookingCandidate {
    pub fn commit(self, id: BookingId) -> Booking {
        Booking {
            id,
            property_id: self.property_id,
            guest_id: self.guest_id,
            range: self.range,
            guest_count: self.guest_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub id: PropertyId,
    pub max_guests: u32,
}

/// Per-property booking table.
#[derive(Debug, Clone)]
pub struct PropertyBookings {
    pub id: PropertyId,
    pub max_guests: u32,
    /// Committed bookings, sorted by `range.start`.
    pub bookings: Vec<Booking>,
}

impl PropertyBookings {
    pub fn new(id: PropertyId, max_guests: u32) -> Self {
        Self {
            id,
            max_guests,
            bookings: Vec::new(),
        }
    }

    pub fn info(&self) -> PropertyInfo {
        PropertyInfo {
            id: self.id,
            max_guests: self.max_guests,
        }
    }

    /// Insert keeping sort order by check-in date.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings that conflict with `query` under `rule`.
    /// Binary search skips everything checking in after `query.end`.
    pub fn overlapping<'a>(
        &'a self,
        query: &'a DateRange,
        rule: OverlapRule,
    ) -> impl Iterator<Item = &'a Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start <= query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| rule.overlaps(&b.range, query))
    }
}

/// Durable log record. Flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PropertyRegistered {
        id: PropertyId,
        max_guests: u32,
    },
    PropertyUpdated {
        id: PropertyId,
        max_guests: u32,
    },
    BookingCreated {
        id: BookingId,
        property_id: PropertyId,
        guest_id: GuestId,
        range: DateRange,
        guest_count: u32,
    },
    BookingCancelled {
        id: BookingId,
        property_id: PropertyId,
    },
}

impl Event {
    pub fn property_id(&self) -> PropertyId {
        match self {
            Event::PropertyRegistered { id, .. } | Event::PropertyUpdated { id, .. } => *id,
            Event::BookingCreated { property_id, .. }
            | Event::BookingCancelled { property_id, .. } => *property_id,
        }
    }

    pub fn booking_created(booking: &Booking) -> Self {
        Event::BookingCreated {
            id: booking.id,
            property_id: booking.property_id,
            guest_id: booking.guest_id,
            range: booking.range,
            guest_count: booking.guest_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn r(start: &str, end: &str) -> DateRange {
        DateRange::new(d(start), d(end))
    }

    fn booking(start: &str, end: &str) -> Booking {
        Booking {
            id: Ulid::new(),
            property_id: Ulid::new(),
            guest_id: Ulid::new(),
            range: r(start, end),
            guest_count: 1,
        }
    }

    #[test]
    fn range_basics() {
        let range = r("2024-01-01", "2024-01-05");
        assert!(range.is_valid());
        assert_eq!(range.nights(), 4);
        assert!(range.contains_date(d("2024-01-01")));
        assert!(range.contains_date(d("2024-01-05"))); // closed
        assert!(!range.contains_date(d("2024-01-06")));
    }

    #[test]
    fn zero_and_negative_nights_are_invalid() {
        assert!(!r("2024-01-05", "2024-01-05").is_valid());
        assert!(!r("2024-01-06", "2024-01-05").is_valid());
        assert!(r("2024-01-05", "2024-01-06").is_valid());
    }

    #[test]
    fn inclusive_boundary_touch_conflicts() {
        let a = r("2024-01-01", "2024-01-05");
        let b = r("2024-01-05", "2024-01-10");
        assert!(OverlapRule::Inclusive.overlaps(&a, &b));
        assert!(OverlapRule::Inclusive.overlaps(&b, &a));
    }

    #[test]
    fn turnover_boundary_touch_is_free() {
        let a = r("2024-01-01", "2024-01-05");
        let b = r("2024-01-05", "2024-01-10");
        assert!(!OverlapRule::CheckoutTurnover.overlaps(&a, &b));
        assert!(!OverlapRule::CheckoutTurnover.overlaps(&b, &a));
    }

    #[test]
    fn containment_overlaps_under_both_rules() {
        let outer = r("2024-01-01", "2024-01-10");
        let inner = r("2024-01-03", "2024-01-05");
        for rule in [OverlapRule::Inclusive, OverlapRule::CheckoutTurnover] {
            assert!(rule.overlaps(&outer, &inner));
            assert!(rule.overlaps(&inner, &outer));
        }
    }

    #[test]
    fn disjoint_ranges_never_overlap() {
        let a = r("2024-01-01", "2024-01-05");
        let b = r("2024-01-06", "2024-01-10");
        assert!(!OverlapRule::Inclusive.overlaps(&a, &b));
        assert!(!OverlapRule::CheckoutTurnover.overlaps(&a, &b));
    }

    #[test]
    fn occupied_dates_follow_rule() {
        let range = r("2024-01-01", "2024-01-03");
        let inclusive: Vec<_> = OverlapRule::Inclusive.occupied_dates(&range).collect();
        assert_eq!(inclusive, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")]);
        let turnover: Vec<_> = OverlapRule::CheckoutTurnover.occupied_dates(&range).collect();
        assert_eq!(turnover, vec![d("2024-01-01"), d("2024-01-02")]);
        assert!(!OverlapRule::CheckoutTurnover.occupies(&range, d("2024-01-03")));
    }

    #[test]
    fn parse_overlap_rule() {
        assert_eq!(OverlapRule::parse("INCLUSIVE"), Some(OverlapRule::Inclusive));
        assert_eq!(OverlapRule::parse("turnover"), Some(OverlapRule::CheckoutTurnover));
        assert_eq!(OverlapRule::parse("whatever"), None);
    }

    #[test]
    fn bookings_stay_sorted() {
        let mut pb = PropertyBookings::new(Ulid::new(), 4);
        pb.insert_booking(booking("2024-03-01", "2024-03-04"));
        pb.insert_booking(booking("2024-01-01", "2024-01-04"));
        pb.insert_booking(booking("2024-02-01", "2024-02-04"));
        let starts: Vec<_> = pb.bookings.iter().map(|b| b.range.start).collect();
        assert_eq!(starts, vec![d("2024-01-01"), d("2024-02-01"), d("2024-03-01")]);
    }

    #[test]
    fn remove_booking_by_id() {
        let mut pb = PropertyBookings::new(Ulid::new(), 4);
        let b = booking("2024-01-01", "2024-01-04");
        let id = b.id;
        pb.insert_booking(b);
        pb.insert_booking(booking("2024-02-01", "2024-02-04"));
        assert!(pb.remove_booking(Ulid::new()).is_none());
        assert_eq!(pb.remove_booking(id).map(|b| b.id), Some(id));
        assert_eq!(pb.bookings.len(), 1);
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut pb = PropertyBookings::new(Ulid::new(), 4);
        pb.insert_booking(booking("2024-01-01", "2024-01-04"));
        pb.insert_booking(booking("2024-01-09", "2024-01-12"));
        pb.insert_booking(booking("2024-02-01", "2024-02-04"));

        let query = r("2024-01-10", "2024-01-15");
        let hits: Vec<_> = pb.overlapping(&query, OverlapRule::Inclusive).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range, r("2024-01-09", "2024-01-12"));
    }

    #[test]
    fn overlapping_check_in_on_query_end() {
        let mut pb = PropertyBookings::new(Ulid::new(), 4);
        pb.insert_booking(booking("2024-01-15", "2024-01-18"));
        let query = r("2024-01-10", "2024-01-15");
        assert_eq!(pb.overlapping(&query, OverlapRule::Inclusive).count(), 1);
        assert_eq!(pb.overlapping(&query, OverlapRule::CheckoutTurnover).count(), 0);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let b = booking("2024-01-01", "2024-01-04");
        let event = Event::booking_created(&b);
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
        assert_eq!(decoded.property_id(), b.property_id);
    }
}
