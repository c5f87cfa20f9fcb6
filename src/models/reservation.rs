//! Reservation (booking) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::de;

/// Date format used by the booking endpoints
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A booking made by a guest
///
/// Dates are kept as the server sent them; use [`Reservation::arrival_date`]
/// and [`Reservation::departure_date`] for calendar arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Arrival date as sent by the server
    #[serde(deserialize_with = "de::text")]
    pub arrival: String,
    /// Departure date as sent by the server
    #[serde(deserialize_with = "de::text")]
    pub departure: String,
    /// Guest email
    #[serde(deserialize_with = "de::text")]
    pub email: String,
    /// Booking identifier
    #[serde(deserialize_with = "de::int")]
    pub id: i64,
    /// Guest first name
    #[serde(deserialize_with = "de::text")]
    pub name: String,
    /// Booked room number
    #[serde(deserialize_with = "de::text")]
    pub number: String,
    /// Guest last name
    #[serde(deserialize_with = "de::text")]
    pub surname: String,
}

impl Reservation {
    /// Guest name as "First Last"
    pub fn full_name(&self) -> String {
        match (self.name.trim(), self.surname.trim()) {
            ("", last) => last.to_string(),
            (first, "") => first.to_string(),
            (first, last) => format!("{first} {last}"),
        }
    }

    /// Parsed arrival date, if the server sent a valid one
    pub fn arrival_date(&self) -> Option<NaiveDate> {
        parse_date(&self.arrival)
    }

    /// Parsed departure date, if the server sent a valid one
    pub fn departure_date(&self) -> Option<NaiveDate> {
        parse_date(&self.departure)
    }

    /// Number of nights booked
    ///
    /// `None` when either date is unparseable or departure is not after arrival.
    pub fn nights(&self) -> Option<u32> {
        let nights = (self.departure_date()? - self.arrival_date()?).num_days();
        u32::try_from(nights).ok().filter(|n| *n > 0)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

impl std::fmt::Display for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} room {} | {} <{}> | {} -> {}",
            self.id,
            self.number,
            self.full_name(),
            self.email,
            self.arrival,
            self.departure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(arrival: &str, departure: &str) -> Reservation {
        Reservation {
            arrival: arrival.to_string(),
            departure: departure.to_string(),
            email: "ann@example.com".to_string(),
            id: 1,
            name: "Ann".to_string(),
            number: "101".to_string(),
            surname: "Lee".to_string(),
        }
    }

    #[test]
    fn test_nights() {
        assert_eq!(reservation("2024-03-01", "2024-03-04").nights(), Some(3));
    }

    #[test]
    fn test_nights_invalid() {
        assert_eq!(reservation("2024-03-04", "2024-03-01").nights(), None);
        assert_eq!(reservation("2024-03-04", "2024-03-04").nights(), None);
        assert_eq!(reservation("soon", "2024-03-04").nights(), None);
    }

    #[test]
    fn test_display_is_ascii() {
        let line = reservation("2024-03-01", "2024-03-04").to_string();
        assert_eq!(line, "#1 room 101 | Ann Lee <ann@example.com> | 2024-03-01 -> 2024-03-04");
        assert!(line.is_ascii());
    }

    #[test]
    fn test_full_name() {
        let mut r = reservation("", "");
        assert_eq!(r.full_name(), "Ann Lee");
        r.surname = String::new();
        assert_eq!(r.full_name(), "Ann");
    }
}
