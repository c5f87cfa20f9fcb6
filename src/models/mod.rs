//! Data models for rooms and reservations

pub(crate) mod de;
mod reservation;
mod room;

pub use reservation::{DATE_FORMAT, Reservation};
pub use room::Room;
