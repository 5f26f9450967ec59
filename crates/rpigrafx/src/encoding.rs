// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Adapted from https://docs.rs/crate/four-cc/latest for MMAL encodings.
#![forbid(unsafe_code)]

use core::{fmt, result::Result, str::FromStr};

/// Pixel encoding of a port, stored as the four characters of its FourCC.
///
/// MMAL builds its codes with `MMAL_FOURCC(a,b,c,d)`, which packs the first
/// character into the least significant byte on every platform.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Encoding(pub [u8; 4]);

impl Encoding {
    /// Vendor-private format shared by tunnelled ports.
    pub const OPAQUE: Encoding = Encoding(*b"OPQV");
    pub const I420: Encoding = Encoding(*b"I420");
    pub const RGB24: Encoding = Encoding(*b"RGB3");
    pub const BGR24: Encoding = Encoding(*b"BGR3");
    pub const RGBA: Encoding = Encoding(*b"RGBA");

    const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Size in bytes of one frame of `width`x`height` in this encoding, or
    /// `None` for encodings without a fixed layout.
    pub fn frame_size(self, width: u32, height: u32) -> Option<u32> {
        let pixels = width.checked_mul(height)?;
        match self {
            Encoding::RGB24 | Encoding::BGR24 => pixels.checked_mul(3),
            Encoding::RGBA => pixels.checked_mul(4),
            Encoding::I420 => pixels.checked_mul(3).map(|n| n / 2),
            _ => None,
        }
    }
}

impl Default for Encoding {
    fn default() -> Encoding {
        Encoding::OPAQUE
    }
}

impl From<&[u8; 4]> for Encoding {
    fn from(buf: &[u8; 4]) -> Encoding {
        Encoding([buf[0], buf[1], buf[2], buf[3]])
    }
}

impl From<u32> for Encoding {
    fn from(val: u32) -> Encoding {
        Encoding(val.to_le_bytes())
    }
}

impl From<Encoding> for u32 {
    fn from(val: Encoding) -> Self {
        val.to_u32()
    }
}

/// Error returned when a string names no known encoding and is not a
/// four-character code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEncodingError(String);

impl fmt::Display for ParseEncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown encoding {:?} (expected a name or a 4-character code)", self.0)
    }
}

impl std::error::Error for ParseEncodingError {}

impl FromStr for Encoding {
    type Err = ParseEncodingError;

    /// Accepts `rgb24`, `bgr24`, `rgba`, `i420`, `opaque` or any literal
    /// four-character code such as `RGB3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb24" => return Ok(Encoding::RGB24),
            "bgr24" => return Ok(Encoding::BGR24),
            "rgba" => return Ok(Encoding::RGBA),
            "i420" | "yuv420" => return Ok(Encoding::I420),
            "opaque" => return Ok(Encoding::OPAQUE),
            _ => {}
        }

        match s.as_bytes() {
            [a, b, c, d] => Ok(Encoding([*a, *b, *c, *d])),
            _ => Err(ParseEncodingError(s.to_owned())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            // Non-UTF-8 codes print byte-escaped.
            Err(_) => write!(f, "{}", self.0.escape_ascii()),
        }
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("Encoding")
            .field(&format_args!("{}", self.0.escape_ascii()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpigrafx_sys as ffi;

    #[test]
    fn test_matches_mmal_fourcc() {
        assert_eq!(u32::from(Encoding::OPAQUE), ffi::MMAL_ENCODING_OPAQUE);
        assert_eq!(u32::from(Encoding::RGB24), ffi::MMAL_ENCODING_RGB24);
        assert_eq!(u32::from(Encoding::I420), ffi::MMAL_ENCODING_I420);
        assert_eq!(Encoding::from(ffi::MMAL_ENCODING_BGR24), Encoding::BGR24);
    }

    #[test]
    fn test_parse() {
        assert_eq!("rgb24".parse::<Encoding>(), Ok(Encoding::RGB24));
        assert_eq!("RGB3".parse::<Encoding>(), Ok(Encoding::RGB24));
        assert_eq!("I420".parse::<Encoding>(), Ok(Encoding::I420));
        assert!("RGB".parse::<Encoding>().is_err());
        assert_eq!(Encoding::RGBA.to_string(), "RGBA");
        assert_eq!(Encoding([0xff, b'A', b'B', b'C']).to_string(), "\\xffABC");
        assert_eq!(format!("{:?}", Encoding::I420), "Encoding(I420)");
    }

    #[test]
    fn test_frame_size() {
        assert_eq!(Encoding::RGB24.frame_size(640, 480), Some(921_600));
        assert_eq!(Encoding::I420.frame_size(640, 480), Some(460_800));
        assert_eq!(Encoding::OPAQUE.frame_size(640, 480), None);
    }
}
