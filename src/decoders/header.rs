//! Frame header decoder.
//!
//! `<mode> <checksum> <size> <YYYY/MM/DD> <hh:mm:ss> <station> <system> [firmware]`

use super::Decoded;
use crate::constants::{DEFAULT_FIRMWARE, HEADER_TOKENS, UNIT_DATETIME_FORMAT};
use crate::models::Header;
use crate::provenance::FieldIssue;
use chrono::NaiveDateTime;

/// Tokens required before the optional firmware version
const REQUIRED_TOKENS: usize = HEADER_TOKENS - 1;

pub fn decode_header(line: &str) -> Decoded<Header> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut issues = Vec::new();

    if tokens.len() < REQUIRED_TOKENS {
        issues.push(FieldIssue::unparseable(
            "header",
            format!(
                "expected at least {} tokens, found {}",
                REQUIRED_TOKENS,
                tokens.len()
            ),
        ));
    }

    let token = |i: usize| tokens.get(i).map(|t| t.to_string());

    let size = tokens.get(2).and_then(|t| match t.parse::<i64>() {
        Ok(size) => Some(size),
        Err(_) => {
            issues.push(FieldIssue::unparseable(
                "size",
                format!("'{}' is not an integer", t),
            ));
            None
        }
    });

    let unit_date = token(3);
    let unit_time = token(4);
    let unit_clock = match (&unit_date, &unit_time) {
        (Some(date), Some(time)) => {
            let text = format!("{} {}", date, time);
            match NaiveDateTime::parse_from_str(&text, UNIT_DATETIME_FORMAT) {
                Ok(clock) => Some(clock),
                Err(e) => {
                    issues.push(FieldIssue::unparseable(
                        "unit_clock",
                        format!("'{}': {}", text, e),
                    ));
                    None
                }
            }
        }
        _ => None,
    };

    let firmware = tokens.get(HEADER_TOKENS - 1).map(|t| t.to_string());

    let header = Header {
        mode: tokens.first().map(|t| t.to_string()).unwrap_or_default(),
        checksum: token(1),
        size,
        unit_date,
        unit_time,
        station: token(5),
        system: token(6),
        firmware_present: firmware.is_some(),
        firmware: firmware.unwrap_or_else(|| DEFAULT_FIRMWARE.to_string()),
        unit_clock,
    };

    Decoded::new(header, issues)
}
