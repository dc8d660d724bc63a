use crate::limits::*;
use crate::model::*;

use super::EngineError;

fn validate_span(range: &DateRange) -> Result<(), EngineError> {
    if !range.is_valid() {
        return Err(EngineError::InvalidRange(*range));
    }
    if range.start < min_valid_date() || range.end > max_valid_date() {
        return Err(EngineError::LimitExceeded("date outside supported calendar"));
    }
    Ok(())
}

/// Reject ranges that span no nights, fall outside the supported calendar,
/// or run longer than the maximum stay. Runs before any storage access.
pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    validate_span(range)?;
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Calendar windows may be wider than a stay, up to their own cap.
pub(crate) fn validate_window(window: &DateRange) -> Result<(), EngineError> {
    validate_span(window)?;
    if window.nights() > MAX_CALENDAR_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("calendar window too wide"));
    }
    Ok(())
}

pub(crate) fn check_guest_count(requested: u32, max_guests: u32) -> Result<(), EngineError> {
    if requested == 0 || requested > max_guests {
        return Err(EngineError::GuestCountExceeded {
            requested,
            max: max_guests,
        });
    }
    Ok(())
}

/// First committed booking that conflicts with `range`, in any order.
pub fn find_conflict<'a>(
    bookings: &'a [Booking],
    range: &DateRange,
    rule: OverlapRule,
) -> Option<&'a Booking> {
    bookings.iter().find(|b| rule.overlaps(&b.range, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use ulid::Ulid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn arb_range() -> impl Strategy<Value = DateRange> {
        (0i64..400, 1i64..30).prop_map(|(offset, nights)| {
            let start = date(2024, 1, 1) + chrono::Duration::days(offset);
            DateRange::new(start, start + chrono::Duration::days(nights))
        })
    }

    fn arb_rule() -> impl Strategy<Value = OverlapRule> {
        prop_oneof![
            Just(OverlapRule::Inclusive),
            Just(OverlapRule::CheckoutTurnover),
        ]
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_range(), b in arb_range(), rule in arb_rule()) {
            prop_assert_eq!(rule.overlaps(&a, &b), rule.overlaps(&b, &a));
        }

        #[test]
        fn range_overlaps_itself(a in arb_range(), rule in arb_rule()) {
            prop_assert!(rule.overlaps(&a, &a));
        }

        #[test]
        fn inclusive_matches_closed_interval_intersection(a in arb_range(), b in arb_range()) {
            let intersects = a.start <= b.end && b.start <= a.end;
            prop_assert_eq!(OverlapRule::Inclusive.overlaps(&a, &b), intersects);
        }

        #[test]
        fn turnover_never_stricter_than_inclusive(a in arb_range(), b in arb_range()) {
            if OverlapRule::CheckoutTurnover.overlaps(&a, &b) {
                prop_assert!(OverlapRule::Inclusive.overlaps(&a, &b));
            }
        }

        #[test]
        fn overlap_iff_shared_occupied_date(
            a in arb_range(),
            b in arb_range(),
            rule in arb_rule()
        ) {
            let shared = rule.occupied_dates(&a).any(|d| rule.occupies(&b, d));
            prop_assert_eq!(rule.overlaps(&a, &b), shared);
        }
    }

    #[test]
    fn validate_rejects_empty_and_inverted() {
        let same = DateRange::new(date(2024, 1, 5), date(2024, 1, 5));
        let inverted = DateRange::new(date(2024, 1, 6), date(2024, 1, 5));
        assert!(matches!(validate_range(&same), Err(EngineError::InvalidRange(_))));
        assert!(matches!(validate_range(&inverted), Err(EngineError::InvalidRange(_))));
    }

    #[test]
    fn validate_limits() {
        let long = DateRange::new(date(2024, 1, 1), date(2026, 1, 1));
        assert!(matches!(validate_range(&long), Err(EngineError::LimitExceeded(_))));
        let ancient = DateRange::new(date(1990, 1, 1), date(1990, 1, 3));
        assert!(matches!(validate_range(&ancient), Err(EngineError::LimitExceeded(_))));
        let ok = DateRange::new(date(2024, 1, 1), date(2024, 1, 2));
        assert!(validate_range(&ok).is_ok());
    }

    #[test]
    fn guest_count_bounds() {
        assert!(check_guest_count(1, 4).is_ok());
        assert!(check_guest_count(4, 4).is_ok());
        assert!(matches!(
            check_guest_count(5, 4),
            Err(EngineError::GuestCountExceeded { requested: 5, max: 4 })
        ));
        assert!(matches!(
            check_guest_count(0, 4),
            Err(EngineError::GuestCountExceeded { requested: 0, .. })
        ));
    }

    #[test]
    fn find_conflict_returns_overlapping_booking() {
        let pid = Ulid::new();
        let mk = |s: u32, e: u32| Booking {
            id: Ulid::new(),
            property_id: pid,
            guest_id: Ulid::new(),
            range: DateRange::new(date(2024, 1, s), date(2024, 1, e)),
            guest_count: 1,
        };
        let bookings = vec![mk(1, 5), mk(10, 15)];
        let query = DateRange::new(date(2024, 1, 12), date(2024, 1, 20));
        let hit = find_conflict(&bookings, &query, OverlapRule::Inclusive).unwrap();
        assert_eq!(hit.id, bookings[1].id);

        let free = DateRange::new(date(2024, 1, 6), date(2024, 1, 9));
        assert!(find_conflict(&bookings, &free, OverlapRule::Inclusive).is_none());
    }
}
