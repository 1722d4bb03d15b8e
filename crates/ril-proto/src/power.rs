//! Radio power request payload.
//!
//! The request carries an int array of exactly one element: `1` to power the
//! radio on, `0` to power it off.

use bytes::Bytes;

use crate::parcel::{Parcel, ParcelError, ParcelReader};

/// Build the payload of a `RADIO_POWER` request.
pub fn radio_power_payload(on: bool) -> Bytes {
    let mut p = Parcel::new();
    p.write_i32_array(&[i32::from(on)]);
    p.freeze()
}

/// Decoded form of a `RADIO_POWER` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioPowerRequest {
    /// Array length field as written on the wire.
    pub array_len: i32,
    /// The single flag value.
    pub value: i32,
}

impl RadioPowerRequest {
    pub fn decode(payload: Bytes) -> Result<Self, ParcelError> {
        let mut r = ParcelReader::new(payload);
        let array_len = r.read_i32()?;
        if array_len != 1 {
            return Err(ParcelError::InvalidLength(array_len));
        }
        let value = r.read_i32()?;
        Ok(RadioPowerRequest { array_len, value })
    }

    pub fn is_on(&self) -> bool {
        self.value == 1
    }
}
