//! # ril-proto
//!
//! Vocabulary of the radio control protocol as seen by the modem core.
//!
//! The request/response transport is not implemented here. This crate only
//! knows how payloads are laid out and how request and result codes are
//! numbered.
//!
//! ## Crate structure
//!
//! - [`parcel`] — Little-endian parcel writer/reader (ints, UTF-16 strings, int arrays)
//! - [`request`] — Request type and result code enumerations
//! - [`power`] — Radio power request payload
//! - [`card`] — Card status response parsing

pub mod card;
pub mod parcel;
pub mod power;
pub mod request;

pub use card::{AppStatus, CardState, CardStatus, PinState};
pub use parcel::{Parcel, ParcelError, ParcelReader};
pub use power::{radio_power_payload, RadioPowerRequest};
pub use request::{RequestType, RilErrno};
