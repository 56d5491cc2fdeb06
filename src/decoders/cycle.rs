//! Summary CO2 cycle line decoder.

use super::{Decoded, is_numeric, parse_f64};
use crate::constants::CYCLE_TOKENS;
use crate::models::{CycleId, CycleRecord};
use crate::provenance::FieldIssue;

/// Decode one summary cycle line for the cycle expected at its position
///
/// The line may start with a cycle label; a label naming a different cycle
/// is reported but the positional identifier is kept.
pub fn decode_summary_cycle(line: &str, expected: CycleId) -> Decoded<CycleRecord> {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    let mut issues = Vec::new();

    if let Some(first) = tokens.first().copied() {
        if !is_numeric(first) {
            match CycleId::from_label(first) {
                Some(label) if label != expected => issues.push(FieldIssue::unparseable(
                    "cycle",
                    format!("label '{}' found where {} was expected", first, expected),
                )),
                Some(_) => {}
                None => issues.push(FieldIssue::unparseable(
                    "cycle",
                    format!("unknown cycle label '{}'", first),
                )),
            }
            tokens.remove(0);
        }
    }

    if tokens.len() != CYCLE_TOKENS {
        issues.push(FieldIssue::unparseable(
            "cycle",
            format!("expected {} values, found {}", CYCLE_TOKENS, tokens.len()),
        ));
    }

    let values: [Option<f64>; CYCLE_TOKENS] = std::array::from_fn(|i| {
        tokens
            .get(i)
            .and_then(|token| parse_f64(token, CycleRecord::FIELDS[i], &mut issues))
    });

    Decoded::new(CycleRecord::from_values(expected, 0, values), issues)
}

/// Whether a line can be a summary cycle line
pub fn looks_like_cycle_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|first| is_numeric(first) || CycleId::from_label(first).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: &str = "1.5 35.1 0.1 101.3 0.2 398.7 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4";

    #[test]
    fn test_clean_cycle_line() {
        let decoded = decode_summary_cycle(VALUES, CycleId::EquilPumpOn);
        assert!(decoded.issues.is_empty());
        let record = decoded.record;
        assert_eq!(record.cycle, CycleId::EquilPumpOn);
        assert_eq!(record.minute, Some(1.5));
        assert_eq!(record.xco2, Some(398.7));
        assert_eq!(record.raw2_std, Some(4.0));
        assert_eq!(record.sample, 0);
    }

    #[test]
    fn test_labelled_line() {
        let decoded = decode_summary_cycle(&format!("apof {}", VALUES), CycleId::AirPumpOff);
        assert!(decoded.issues.is_empty());
        assert_eq!(decoded.record.licor_temp, Some(35.1));

        let decoded = decode_summary_cycle(&format!("zpon {}", VALUES), CycleId::AirPumpOff);
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.record.cycle, CycleId::AirPumpOff);
    }

    #[test]
    fn test_bad_tokens_null_their_fields() {
        let line = VALUES.replacen("398.7", "xx", 1);
        let decoded = decode_summary_cycle(&line, CycleId::ZeroPumpOn);
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].field, "xco2");
        assert_eq!(decoded.record.xco2, None);
        assert_eq!(decoded.record.xco2_std, Some(0.5));
    }

    #[test]
    fn test_short_line_nulls_missing_tail() {
        let decoded = decode_summary_cycle("1.5 35.1 0.1", CycleId::ZeroPumpOn);
        assert!(decoded.degraded());
        assert_eq!(decoded.record.licor_temp_std, Some(0.1));
        assert_eq!(decoded.record.licor_press, None);
        assert_eq!(decoded.record.raw2_std, None);
    }

    #[test]
    fn test_cycle_line_detection() {
        assert!(looks_like_cycle_line(VALUES));
        assert!(looks_like_cycle_line("Span_on 1 2"));
        assert!(!looks_like_cycle_line("garbage line"));
        assert!(!looks_like_cycle_line(""));
    }
}
