//! Hex color literals.

use crate::error::{YavError, YavResult};

/// A straight (non-premultiplied) RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };

    /// Parse a color literal: optional `#` or `0x` prefix, then 6 hex digits
    /// (RGB, opaque) or 8 hex digits (alpha then RGB). Anything else is a
    /// fatal parse error naming the offending character.
    pub fn parse(code: &str) -> YavResult<Color> {
        let digits = code
            .strip_prefix('#')
            .or_else(|| code.strip_prefix("0x"))
            .unwrap_or(code);

        // work on raw bytes so a stray multi-byte character cannot split a
        // pair mid-character
        let digits = digits.as_bytes();

        let mut c = Color::BLACK;
        let rgb = match digits.len() {
            8 => {
                c.a = parse_byte(&digits[0..2])?;
                &digits[2..]
            }
            6 => digits,
            n => {
                return Err(YavError::input(format!(
                    "color code has {n} digits, expected 6 or 8"
                )));
            }
        };

        c.r = parse_byte(&rgb[0..2])?;
        c.g = parse_byte(&rgb[2..4])?;
        c.b = parse_byte(&rgb[4..6])?;

        Ok(c)
    }
}

fn parse_nibble(digit: u8) -> YavResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b' '..=b'~' => Err(YavError::input(format!(
            "invalid hex digit '{}', expected [0-9a-fA-F]",
            digit as char
        ))),
        _ => Err(YavError::input(format!(
            "invalid hex digit (byte {digit}), expected [0-9a-fA-F]"
        ))),
    }
}

fn parse_byte(pair: &[u8]) -> YavResult<u8> {
    Ok((parse_nibble(pair[0])? << 4) | parse_nibble(pair[1])?)
}
