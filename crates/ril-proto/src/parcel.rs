//! # Parcel Format
//!
//! Payloads exchanged with the radio are flat little-endian parcels:
//!
//! ```text
//! int32   : 4 bytes, little-endian, two's complement
//! string  : int32 length in UTF-16 units (-1 = null)
//!           length × u16 code units, u16 NUL terminator,
//!           zero padding up to the next 4-byte boundary
//! int[]   : int32 count, then count × int32
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors raised while reading a parcel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParcelError {
    #[error("parcel truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("invalid length field: {0}")]
    InvalidLength(i32),
    #[error("string is not valid UTF-16")]
    InvalidUtf16,
    #[error("too many application records: {count} (max {max})")]
    TooManyApps { count: i32, max: usize },
}

/// Round a byte count up to the parcel's 4-byte alignment.
#[inline]
fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

// ─── Writer ─────────────────────────────────────────────────────────────────

/// Growable parcel being written.
#[derive(Debug, Default, Clone)]
pub struct Parcel {
    buf: BytesMut,
}

impl Parcel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    /// Write a nullable UTF-16 string.
    pub fn write_string(&mut self, value: Option<&str>) -> &mut Self {
        let Some(s) = value else {
            return self.write_i32(-1);
        };
        let units: Vec<u16> = s.encode_utf16().collect();
        self.buf.put_i32_le(units.len() as i32);
        for unit in &units {
            self.buf.put_u16_le(*unit);
        }
        self.buf.put_u16_le(0);
        let written = (units.len() + 1) * 2;
        self.buf.put_bytes(0, pad4(written) - written);
        self
    }

    /// Write a counted array of int32 values.
    pub fn write_i32_array(&mut self, values: &[i32]) -> &mut Self {
        self.write_i32(values.len() as i32);
        for v in values {
            self.write_i32(*v);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Cursor over a received parcel.
#[derive(Debug, Clone)]
pub struct ParcelReader {
    buf: Bytes,
}

impl ParcelReader {
    pub fn new(buf: Bytes) -> Self {
        ParcelReader { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ParcelError> {
        if self.buf.remaining() < needed {
            return Err(ParcelError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_i32(&mut self) -> Result<i32, ParcelError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    /// Read a nullable UTF-16 string. `Ok(None)` is the null string.
    pub fn read_string(&mut self) -> Result<Option<String>, ParcelError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(ParcelError::InvalidLength(len));
        }
        let units = len as usize;
        let raw = units
            .checked_add(1)
            .and_then(|n| n.checked_mul(2))
            .ok_or(ParcelError::InvalidLength(len))?;
        let padded = pad4(raw);
        self.ensure(padded)?;

        let mut chars = Vec::with_capacity(units);
        for _ in 0..units {
            chars.push(self.buf.get_u16_le());
        }
        // Terminator plus alignment padding.
        self.buf.advance(padded - units * 2);

        String::from_utf16(&chars)
            .map(Some)
            .map_err(|_| ParcelError::InvalidUtf16)
    }

    /// Read a counted array of int32 values.
    pub fn read_i32_array(&mut self) -> Result<Vec<i32>, ParcelError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(ParcelError::InvalidLength(count));
        }
        let count = count as usize;
        self.ensure(count.saturating_mul(4))?;
        (0..count).map(|_| self.read_i32()).collect()
    }
}
