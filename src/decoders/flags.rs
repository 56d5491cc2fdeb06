//! Packed 16-bit status word.
//!
//! The word arrives as four hex characters. Either byte half may be the
//! clamp marker `FF`, meaning the matching calibration coefficient was not
//! available; that half is read as `00` before the bits are expanded.

use crate::models::StatusFlags;
use std::fmt;

/// Bits surfaced as named booleans: zero-1..5 in the low byte, span-1..5 in the high byte
pub const NAMED_BIT_MASK: u16 = 0x1F1F;

/// Opaque status word as transmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWord {
    raw: String,
    word: u16,
    span_clamped: bool,
    zero_clamped: bool,
}

impl StatusWord {
    /// Parse the transmitted token
    pub fn parse(token: &str) -> Result<Self, String> {
        let token = token.trim();
        if token.len() != 4 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("'{}' is not a 4-character hex word", token));
        }

        let (high, low) = token.split_at(2);
        let span_clamped = high.eq_ignore_ascii_case("FF");
        let zero_clamped = low.eq_ignore_ascii_case("FF");
        let high = if span_clamped { "00" } else { high };
        let low = if zero_clamped { "00" } else { low };

        let word = u16::from_str_radix(&format!("{}{}", high, low), 16)
            .map_err(|_| format!("'{}' is not a 4-character hex word", token))?;

        Ok(Self {
            raw: token.to_string(),
            word,
            span_clamped,
            zero_clamped,
        })
    }

    /// Build from an already numeric word with no clamp markers
    pub fn from_word(word: u16) -> Self {
        Self {
            raw: format!("{:04X}", word),
            word,
            span_clamped: false,
            zero_clamped: false,
        }
    }

    /// Numeric word after clamp halves were cleared
    pub fn word(&self) -> u16 {
        self.word
    }

    /// Expand into the bit vector, clamp markers and named bits
    pub fn decode(&self) -> StatusFlags {
        let bit = |position: u32| (self.word >> position) & 1 == 1;

        StatusFlags {
            raw: self.raw.clone(),
            decoded_hex: format!("{:04X}", self.word),
            word: self.word,
            bits: format!("{:016b}", self.word),
            span_clamped: self.span_clamped,
            zero_clamped: self.zero_clamped,
            span: std::array::from_fn(|k| bit(k as u32 + 8)),
            zero: std::array::from_fn(|k| bit(k as u32)),
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
