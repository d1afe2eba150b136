//! Four byte OpenType tags.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte font table tag from byte string
///
/// Example:
///
/// ```ignore
/// assert_eq!(tag!(b"GSUB"), 0x47535542);
/// ```
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    u32::from_be_bytes(chars)
}

/// Parse a tag from its textual form.
///
/// Tags shorter than four characters are padded with spaces. Tags that are not printable ASCII
/// can be given in the `0x%08x` form produced by `DisplayTag`.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if let Some(hex) = s.strip_prefix("0x") {
        if hex.len() == 8 {
            return u32::from_str_radix(hex, 16).map_err(|_| ParseError::BadValue);
        }
    }

    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut bytes = [b' '; 4];
    for (byte, c) in bytes.iter_mut().zip(s.chars()) {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }
        *byte = c as u8;
    }

    Ok(u32::from_be_bytes(bytes))
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
            bytes.iter().try_for_each(|&b| write!(f, "{}", char::from(b)))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

pub const CFF: u32 = tag!(b"CFF ");
pub const CMAP: u32 = tag!(b"cmap");
pub const DFLT: u32 = tag!(b"DFLT");
pub const GSUB: u32 = tag!(b"GSUB");
pub const HEAD: u32 = tag!(b"head");
pub const HHEA: u32 = tag!(b"hhea");
pub const HMTX: u32 = tag!(b"hmtx");
pub const MAXP: u32 = tag!(b"maxp");
pub const NAME: u32 = tag!(b"name");
pub const OS_2: u32 = tag!(b"OS/2");
pub const OTTO: u32 = tag!(b"OTTO");
pub const POST: u32 = tag!(b"post");
pub const TTCF: u32 = tag!(b"ttcf");
pub const VHEA: u32 = tag!(b"vhea");
pub const VMTX: u32 = tag!(b"vmtx");
pub const WOFF: u32 = tag!(b"wOFF");

#[cfg(test)]
mod tests {
    use super::*;

    mod from_string {
        use super::*;

        #[test]
        fn test_four_chars() {
            let tag = from_string("ccmp").expect("invalid tag");

            assert_eq!(tag, 0x63636d70);
        }

        #[test]
        fn test_three_chars() {
            let tag = from_string("CFF").expect("invalid tag");

            assert_eq!(tag, CFF);
        }

        #[test]
        fn test_hex() {
            assert_eq!(from_string("0x12345678"), Ok(0x12345678));
        }

        #[test]
        fn test_too_long() {
            assert_eq!(from_string("ljmo1"), Err(ParseError::BadValue));
        }
    }

    mod display_tag {
        use crate::tag::{from_string, DisplayTag, NAME};

        #[test]
        fn test_ascii() {
            assert_eq!(DisplayTag(NAME).to_string(), "name".to_string());
        }

        #[test]
        fn test_non_ascii() {
            assert_eq!(DisplayTag(0x12345678).to_string(), "0x12345678".to_string());
        }

        #[test]
        fn test_display_parses_back() {
            for tag in [NAME, 0x0001_0203, u32::from_be_bytes(*b"vjmo")] {
                assert_eq!(from_string(&DisplayTag(tag).to_string()), Ok(tag));
            }
        }
    }
}
