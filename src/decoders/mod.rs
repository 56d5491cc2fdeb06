//! Stateless field decoders.
//!
//! Every decoder is total: it always returns a record, nulling the fields it
//! could not convert and reporting each failure as a [`FieldIssue`]. The
//! assembler turns those issues into side-log entries.

pub mod auxiliary;
pub mod cycle;
pub mod engineering;
pub mod flags;
pub mod gps;
pub mod header;

pub use auxiliary::{decode_aux_header, decode_ctd, decode_flash_cycle, decode_met, decode_ph};
pub use cycle::decode_summary_cycle;
pub use engineering::decode_engineering;
pub use flags::StatusWord;
pub use gps::{
    CoordinateParts, decode_coordinate, decode_gps, encode_coordinate, split_coordinate,
};
pub use header::decode_header;

use crate::provenance::FieldIssue;

/// A decoded record and the problems met while decoding it
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub record: T,
    pub issues: Vec<FieldIssue>,
}

impl<T> Decoded<T> {
    pub fn new(record: T, issues: Vec<FieldIssue>) -> Self {
        Self { record, issues }
    }

    /// Whether any issue marks the record as degraded
    pub fn degraded(&self) -> bool {
        self.issues.iter().any(|issue| issue.kind.degrades())
    }

    /// Split into record and issues
    pub fn into_parts(self) -> (T, Vec<FieldIssue>) {
        (self.record, self.issues)
    }
}

/// Parse a finite float, reporting the field on failure
pub(crate) fn parse_f64(token: &str, field: &str, issues: &mut Vec<FieldIssue>) -> Option<f64> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        Ok(_) => {
            issues.push(FieldIssue::unparseable(field, format!("'{}' is not finite", token)));
            None
        }
        Err(_) => {
            issues.push(FieldIssue::unparseable(field, format!("'{}' is not a number", token)));
            None
        }
    }
}

/// Scale an integer auxiliary token by the fixed divisor
pub(crate) fn parse_scaled(
    token: &str,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    match token.parse::<i64>() {
        Ok(value) => Some(value as f64 / crate::constants::AUX_SCALE),
        Err(_) => {
            issues.push(FieldIssue::unparseable(
                field,
                format!("'{}' is not an integer", token),
            ));
            None
        }
    }
}

/// Whether a token reads as a number
pub(crate) fn is_numeric(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}
