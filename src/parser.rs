//! JSON response parser for the reservation endpoints
//!
//! Every endpoint wraps its payload in a single-key envelope:
//!
//! ```text
//! {"rooms":    [ {name, number, rating, visitors, price, url}, ... ]}
//! {"bookings": [ {arrival, departure, email, id, name, number, surname}, ... ]}
//! {"photos":   [ "https://...", ... ]}
//! ```
//!
//! The strict functions fail on the first problem. The `*_lossy` functions
//! log the failure and keep whatever was parsed before the first bad record.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Reservation, Room, de};

/// Envelope key for the room list
pub const ROOMS_KEY: &str = "rooms";
/// Envelope key for the booking list
pub const BOOKINGS_KEY: &str = "bookings";
/// Envelope key for the photo URL list
pub const PHOTOS_KEY: &str = "photos";

/// Photo list element; numbers are rendered to text like other text fields
#[derive(Deserialize)]
struct PhotoUrl(#[serde(deserialize_with = "de::text")] String);

/// Errors produced while mapping a response body
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The body is not an object holding an array under the expected key
    #[error("expected an array under \"{key}\"")]
    MissingArray {
        /// Envelope key that was looked up
        key: &'static str,
    },
    /// An element of the array could not be mapped
    #[error("bad record at {key}[{index}]: {source}")]
    Record {
        /// Envelope key of the array
        key: &'static str,
        /// Position of the offending element
        index: usize,
        /// Underlying decoding error
        source: serde_json::Error,
    },
}

/// Parse a `{"rooms": [...]}` response
pub fn parse_rooms(json: &str) -> Result<Vec<Room>, ParseError> {
    parse_list(json, ROOMS_KEY)
}

/// Parse a `{"bookings": [...]}` response
pub fn parse_reservations(json: &str) -> Result<Vec<Reservation>, ParseError> {
    parse_list(json, BOOKINGS_KEY)
}

/// Parse a `{"photos": [...]}` response
pub fn parse_photo_urls(json: &str) -> Result<Vec<String>, ParseError> {
    let urls: Vec<PhotoUrl> = parse_list(json, PHOTOS_KEY)?;
    Ok(urls.into_iter().map(|url| url.0).collect())
}

/// Parse rooms, keeping the records before the first failure
pub fn rooms_lossy(json: &str) -> Vec<Room> {
    lossy(json, ROOMS_KEY)
}

/// Parse reservations, keeping the records before the first failure
pub fn reservations_lossy(json: &str) -> Vec<Reservation> {
    lossy(json, BOOKINGS_KEY)
}

/// Parse photo URLs, keeping the entries before the first failure
pub fn photo_urls_lossy(json: &str) -> Vec<String> {
    lossy::<PhotoUrl>(json, PHOTOS_KEY)
        .into_iter()
        .map(|url| url.0)
        .collect()
}

fn parse_list<T: DeserializeOwned>(json: &str, key: &'static str) -> Result<Vec<T>, ParseError> {
    match parse_prefix(json, key) {
        (_, Some(e)) => Err(e),
        (items, None) => Ok(items),
    }
}

/// Maps elements in order, stopping at the first failure.
fn parse_prefix<T: DeserializeOwned>(
    json: &str,
    key: &'static str,
) -> (Vec<T>, Option<ParseError>) {
    let mut envelope: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => return (Vec::new(), Some(ParseError::Json(e))),
    };

    let Some(Value::Array(elements)) = envelope.get_mut(key).map(Value::take) else {
        return (Vec::new(), Some(ParseError::MissingArray { key }));
    };

    let mut items = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value(element) {
            Ok(item) => items.push(item),
            Err(source) => {
                return (items, Some(ParseError::Record { key, index, source }));
            }
        }
    }

    (items, None)
}

fn lossy<T: DeserializeOwned>(json: &str, key: &'static str) -> Vec<T> {
    let (items, err) = parse_prefix(json, key);
    if let Some(e) = err {
        tracing::warn!(kept = items.len(), "Failed to parse {key} response: {e}");
    }
    items
}
