/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX CheckSum (tag 10).
//!
//! The sum of every byte before the `10=` field, modulo 256, written as three
//! zero-padded digits.

use std::fmt;

/// A FIX checksum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u8);

impl Checksum {
    /// Computes the checksum of `data`.
    #[inline]
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)))
    }

    /// Returns the three ASCII digits for the wire.
    #[inline]
    #[must_use]
    pub const fn to_digits(self) -> [u8; 3] {
        [
            b'0' + self.0 / 100,
            b'0' + (self.0 / 10) % 10,
            b'0' + self.0 % 10,
        ]
    }

    /// Parses exactly three ASCII digits.
    ///
    /// Returns `None` for any other length, non-digits, or values above 255.
    #[must_use]
    pub fn from_digits(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let value = bytes
            .iter()
            .fold(0u16, |acc, &b| acc * 10 + u16::from(b - b'0'));
        u8::try_from(value).ok().map(Self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(Checksum::of(b"").0, 0);
        assert_eq!(Checksum::of(&[255u8; 1000]).0, ((255u32 * 1000) % 256) as u8);
    }

    #[test]
    fn test_checksum_digits() {
        assert_eq!(Checksum(7).to_digits(), *b"007");
        assert_eq!(Checksum(255).to_string(), "255");
        assert_eq!(Checksum::from_digits(b"042"), Some(Checksum(42)));
    }

    #[test]
    fn test_checksum_rejects_malformed() {
        assert_eq!(Checksum::from_digits(b"42"), None);
        assert_eq!(Checksum::from_digits(b"256"), None);
        assert_eq!(Checksum::from_digits(b"4x2"), None);
    }
}
