//! Room listing model

use serde::{Deserialize, Serialize};

use super::de;

/// A bookable room as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Display name (e.g., "Deluxe Suite")
    #[serde(deserialize_with = "de::text")]
    pub name: String,
    /// Room number
    #[serde(deserialize_with = "de::int")]
    pub number: i64,
    /// Star rating
    #[serde(deserialize_with = "de::int")]
    pub rating: i64,
    /// Maximum number of visitors
    #[serde(deserialize_with = "de::int")]
    pub visitors: i64,
    /// Price per night, in whole currency units
    #[serde(deserialize_with = "de::int")]
    pub price: i64,
    /// Thumbnail URL
    #[serde(deserialize_with = "de::text")]
    pub url: String,
}

impl Room {
    /// Create a new room
    pub fn new(
        name: impl Into<String>,
        number: i64,
        rating: i64,
        visitors: i64,
        price: i64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            number,
            rating,
            visitors,
            price,
            url: url.into(),
        }
    }

    /// Price formatted for list rows (e.g., "$120 / night")
    pub fn price_display(&self) -> String {
        format!("${} / night", self.price)
    }

    /// Rating as a row of stars, clamped to 0..=5
    pub fn stars(&self) -> String {
        let filled = self.rating.clamp(0, 5) as usize;
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }

    /// Whether the room fits a party of the given size
    pub const fn fits(&self, guests: i64) -> bool {
        guests > 0 && guests <= self.visitors
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {}/5 | up to {} | {}",
            self.number,
            self.name,
            self.rating.clamp(0, 5),
            self.visitors,
            self.price_display()
        )
    }
}
