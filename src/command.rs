use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

/// One request line, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RegisterProperty {
        property_id: PropertyId,
        max_guests: u32,
    },
    Reserve {
        property_id: PropertyId,
        guest_id: GuestId,
        range: DateRange,
        guest_count: u32,
    },
    Cancel {
        booking_id: BookingId,
        guest_id: GuestId,
    },
    Available {
        property_id: PropertyId,
        range: DateRange,
    },
    Booked {
        property_id: PropertyId,
    },
    /// Host view: full bookings on a property.
    Bookings {
        property_id: PropertyId,
    },
    Blocked {
        property_id: PropertyId,
        window: DateRange,
    },
    Trips {
        guest_id: GuestId,
    },
    Listen {
        property_id: PropertyId,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    UnknownVerb(String),
    WrongArity {
        verb: &'static str,
        expected: usize,
        got: usize,
    },
    BadId(String),
    BadDate(String),
    BadNumber(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::UnknownVerb(v) => write!(f, "unknown command: {v}"),
            CommandError::WrongArity { verb, expected, got } => {
                write!(f, "{verb} takes {expected} arguments, got {got}")
            }
            CommandError::BadId(s) => write!(f, "invalid id: {s}"),
            CommandError::BadDate(s) => write!(f, "invalid date (want YYYY-MM-DD): {s}"),
            CommandError::BadNumber(s) => write!(f, "invalid number: {s}"),
        }
    }
}

impl std::error::Error for CommandError {}

fn id(s: &str) -> Result<Ulid, CommandError> {
    Ulid::from_string(s).map_err(|_| CommandError::BadId(s.to_string()))
}

fn date(s: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| CommandError::BadDate(s.to_string()))
}

fn count(s: &str) -> Result<u32, CommandError> {
    s.parse().map_err(|_| CommandError::BadNumber(s.to_string()))
}

/// Dates are taken as given; range validity is the engine's call.
fn range(start: &str, end: &str) -> Result<DateRange, CommandError> {
    Ok(DateRange::new(date(start)?, date(end)?))
}

fn arity(verb: &'static str, args: &[&str], expected: usize) -> Result<(), CommandError> {
    if args.len() != expected {
        return Err(CommandError::WrongArity {
            verb,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Parse `VERB arg...`. Verbs are case-insensitive; a trailing `;` is ignored.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim().trim_end_matches(';');
    let mut parts = line.split_whitespace();
    let verb = parts.next().ok_or(CommandError::Empty)?.to_ascii_uppercase();
    let args: Vec<&str> = parts.collect();

    match verb.as_str() {
        "PROPERTY" => {
            arity("PROPERTY", &args, 2)?;
            Ok(Command::RegisterProperty {
                property_id: id(args[0])?,
                max_guests: count(args[1])?,
            })
        }
        "RESERVE" => {
            arity("RESERVE", &args, 5)?;
            Ok(Command::Reserve {
                property_id: id(args[0])?,
                guest_id: id(args[1])?,
                range: range(args[2], args[3])?,
                guest_count: count(args[4])?,
            })
        }
        "CANCEL" => {
            arity("CANCEL", &args, 2)?;
            Ok(Command::Cancel {
                booking_id: id(args[0])?,
                guest_id: id(args[1])?,
            })
        }
        "AVAILABLE" => {
            arity("AVAILABLE", &args, 3)?;
            Ok(Command::Available {
                property_id: id(args[0])?,
                range: range(args[1], args[2])?,
            })
        }
        "BOOKED" => {
            arity("BOOKED", &args, 1)?;
            Ok(Command::Booked {
                property_id: id(args[0])?,
            })
        }
        "BOOKINGS" => {
            arity("BOOKINGS", &args, 1)?;
            Ok(Command::Bookings {
                property_id: id(args[0])?,
            })
        }
        "BLOCKED" => {
            arity("BLOCKED", &args, 3)?;
            Ok(Command::Blocked {
                property_id: id(args[0])?,
                window: range(args[1], args[2])?,
            })
        }
        "TRIPS" => {
            arity("TRIPS", &args, 1)?;
            Ok(Command::Trips {
                guest_id: id(args[0])?,
            })
        }
        "LISTEN" => {
            arity("LISTEN", &args, 1)?;
            Ok(Command::Listen {
                property_id: id(args[0])?,
            })
        }
        _ => Err(CommandError::UnknownVerb(verb)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "01HZY5QKXG8Z6N0V3T9ZJ1M2AB";
    const G: &str = "01HZY5QKXG8Z6N0V3T9ZJ1M2CD";

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parse_reserve() {
        let cmd = parse_command(&format!("reserve {P} {G} 2024-01-01 2024-01-05 2")).unwrap();
        assert_eq!(
            cmd,
            Command::Reserve {
                property_id: id(P).unwrap(),
                guest_id: id(G).unwrap(),
                range: DateRange::new(d("2024-01-01"), d("2024-01-05")),
                guest_count: 2,
            }
        );
    }

    #[test]
    fn invalid_range_is_left_to_engine() {
        let cmd = parse_command(&format!("AVAILABLE {P} 2024-01-05 2024-01-05")).unwrap();
        let Command::Available { range, .. } = cmd else {
            panic!("wrong command");
        };
        assert!(!range.is_valid());
    }

    #[test]
    fn parse_simple_verbs() {
        assert!(matches!(parse_command(&format!("BOOKED {P};")), Ok(Command::Booked { .. })));
        assert!(matches!(parse_command(&format!("TRIPS {G}")), Ok(Command::Trips { .. })));
        assert!(matches!(
            parse_command(&format!("bookings {P}")),
            Ok(Command::Bookings { .. })
        ));
        assert!(matches!(parse_command(&format!("LISTEN {P}")), Ok(Command::Listen { .. })));
        assert!(matches!(
            parse_command(&format!("PROPERTY {P} 4")),
            Ok(Command::RegisterProperty { max_guests: 4, .. })
        ));
        assert!(matches!(
            parse_command(&format!("  cancel {P} {G}  ")),
            Ok(Command::Cancel { .. })
        ));
        assert!(matches!(
            parse_command(&format!("BLOCKED {P} 2024-02-01 2024-02-29")),
            Ok(Command::Blocked { .. })
        ));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_command("   "), Err(CommandError::Empty));
        assert_eq!(
            parse_command("DROP TABLE bookings"),
            Err(CommandError::UnknownVerb("DROP".into()))
        );
        assert_eq!(
            parse_command(&format!("BOOKED {P} extra")),
            Err(CommandError::WrongArity { verb: "BOOKED", expected: 1, got: 2 })
        );
        assert_eq!(parse_command("BOOKED nope"), Err(CommandError::BadId("nope".into())));
        assert_eq!(
            parse_command(&format!("AVAILABLE {P} 2024-13-01 2024-01-05")),
            Err(CommandError::BadDate("2024-13-01".into()))
        );
        assert_eq!(
            parse_command(&format!("PROPERTY {P} -1")),
            Err(CommandError::BadNumber("-1".into()))
        );
    }
}
