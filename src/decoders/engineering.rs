//! Engineering and status line decoder.
//!
//! The layout is chosen by token count:
//!
//! | tokens | layout |
//! |---|---|
//! | 18 | `v_logic v_trans zero_coeff span_coeff flag <13 met values>` |
//! | 19 | `v_logic v_trans zero_coeff span_coeff span2_coeff flag <13 met values>` |
//! | 5..  | partial: the 18-token prefix up to `flag`, no meteorology |
//! | 1..4 | partial: the last token is the flag |

use super::{Decoded, StatusWord, parse_f64};
use crate::constants::{ENGR_MET_FIELDS, ENGR_TOKENS, ENGR_TOKENS_WITH_SPAN2};
use crate::models::{Engineering, EngineeringLayout, Meteorology};
use crate::provenance::FieldIssue;

/// Tokens in the partial prefix `v_logic v_trans zero_coeff span_coeff flag`
const PREFIX_TOKENS: usize = 5;

pub fn decode_engineering(line: &str) -> Decoded<Engineering> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut issues = Vec::new();
    let mut engineering = Engineering::empty();
    engineering.token_count = tokens.len();

    if tokens.is_empty() {
        issues.push(FieldIssue::unparseable("engineering", "empty line"));
        return Decoded::new(engineering, issues);
    }

    engineering.layout = match tokens.len() {
        ENGR_TOKENS => EngineeringLayout::Standard,
        ENGR_TOKENS_WITH_SPAN2 => EngineeringLayout::WithSecondarySpan,
        _ => EngineeringLayout::Partial,
    };

    let flag_index = match engineering.layout {
        EngineeringLayout::WithSecondarySpan => PREFIX_TOKENS,
        _ if tokens.len() >= PREFIX_TOKENS => PREFIX_TOKENS - 1,
        _ => tokens.len() - 1,
    };

    if flag_index == PREFIX_TOKENS - 1 || flag_index == PREFIX_TOKENS {
        engineering.v_logic = parse_f64(tokens[0], "v_logic", &mut issues);
        engineering.v_trans = parse_f64(tokens[1], "v_trans", &mut issues);
        engineering.zero_coeff = parse_f64(tokens[2], "zero_coeff", &mut issues);
        engineering.span_coeff = parse_f64(tokens[3], "span_coeff", &mut issues);
    }
    if engineering.layout == EngineeringLayout::WithSecondarySpan {
        engineering.span2_coeff = parse_f64(tokens[4], "span2_coeff", &mut issues);
    }

    match StatusWord::parse(tokens[flag_index]) {
        Ok(word) => engineering.flags = Some(word.decode()),
        Err(reason) => issues.push(FieldIssue::unparseable("flag", reason)),
    }

    if engineering.layout == EngineeringLayout::Partial {
        issues.push(FieldIssue::unparseable(
            "engineering",
            format!(
                "{} tokens match neither the {} nor the {} token layout",
                tokens.len(),
                ENGR_TOKENS,
                ENGR_TOKENS_WITH_SPAN2
            ),
        ));
    } else {
        engineering.meteorology = decode_meteorology(&tokens[flag_index + 1..], &mut issues);
    }

    Decoded::new(engineering, issues)
}

/// All thirteen values convert or the tuple is unset
fn decode_meteorology(tokens: &[&str], issues: &mut Vec<FieldIssue>) -> Option<Meteorology> {
    debug_assert_eq!(tokens.len(), ENGR_MET_FIELDS);
    let mut values = [0.0; ENGR_MET_FIELDS];
    let mut failed = Vec::new();

    for ((slot, token), field) in values.iter_mut().zip(tokens).zip(Meteorology::FIELDS) {
        if let Some(value) = parse_f64(token, field, &mut failed) {
            *slot = value;
        }
    }

    if failed.is_empty() {
        Some(Meteorology::from_values(values))
    } else {
        let fields: Vec<&str> = failed.iter().map(|i| i.field.as_str()).collect();
        issues.push(FieldIssue::unparseable(
            "meteorology",
            format!("unconvertible {}; tuple left unset", fields.join(", ")),
        ));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MET: &str = "28.51 0.02 5.12 0.01 35.1 0.03 -12.5 3.1 8.2 2.9 181 175 7.4";

    #[test]
    fn test_standard_layout() {
        let line = format!("13.2 12.9 0.987 1.013 0000 {}", MET);
        let decoded = decode_engineering(&line);
        assert!(decoded.issues.is_empty(), "{:?}", decoded.issues);
        let engineering = decoded.record;
        assert_eq!(engineering.layout, EngineeringLayout::Standard);
        assert_eq!(engineering.token_count, 18);
        assert_eq!(engineering.v_logic, Some(13.2));
        assert_eq!(engineering.span_coeff, Some(1.013));
        assert_eq!(engineering.span2_coeff, None);
        let flags = engineering.flags.unwrap();
        assert_eq!(flags.word, 0);
        assert!(!flags.span_clamped && !flags.zero_clamped);
        let met = engineering.meteorology.unwrap();
        assert_eq!(met.sst, 28.51);
        assert_eq!(met.u, -12.5);
        assert_eq!(met.wind_speed, 7.4);
    }

    #[test]
    fn test_secondary_span_shifts_positions() {
        let line = format!("13.2 12.9 0.987 1.013 1.020 FF34 {}", MET);
        let engineering = decode_engineering(&line).record;
        assert_eq!(engineering.layout, EngineeringLayout::WithSecondarySpan);
        assert_eq!(engineering.span2_coeff, Some(1.020));
        let flags = engineering.flags.unwrap();
        assert!(flags.span_clamped);
        assert_eq!(flags.decoded_hex, "0034");
        assert!(flags.zero[2]);
        assert_eq!(engineering.meteorology.unwrap().sst, 28.51);
    }

    #[test]
    fn test_bad_met_value_unsets_whole_tuple() {
        let met = MET.replacen("35.1", "n/a", 1);
        let line = format!("13.2 12.9 0.987 1.013 0000 {}", met);
        let decoded = decode_engineering(&line);
        assert!(decoded.degraded());
        assert_eq!(decoded.issues.len(), 1);
        assert!(decoded.issues[0].reason.contains("sss"));
        let engineering = decoded.record;
        assert_eq!(engineering.meteorology, None);
        assert_eq!(engineering.v_trans, Some(12.9));
        assert!(engineering.flags.is_some());
    }

    #[test]
    fn test_flag_only_line() {
        let decoded = decode_engineering("0104");
        assert!(decoded.degraded());
        let engineering = decoded.record;
        assert_eq!(engineering.layout, EngineeringLayout::Partial);
        assert_eq!(engineering.v_logic, None);
        assert_eq!(engineering.v_trans, None);
        assert_eq!(engineering.zero_coeff, None);
        assert_eq!(engineering.span_coeff, None);
        assert_eq!(engineering.meteorology, None);
        let flags = engineering.flags.unwrap();
        assert_eq!(flags.word, 0x0104);
        assert!(flags.span[0]);
        assert!(flags.zero[2]);
    }

    #[test]
    fn test_partial_prefix_layout() {
        let engineering = decode_engineering("13.2 12.9 0.987 1.013 0001 28.5 0.1").record;
        assert_eq!(engineering.layout, EngineeringLayout::Partial);
        assert_eq!(engineering.token_count, 7);
        assert_eq!(engineering.zero_coeff, Some(0.987));
        assert_eq!(engineering.flags.unwrap().word, 1);
        assert_eq!(engineering.meteorology, None);
    }

    #[test]
    fn test_bad_flag_keeps_other_fields() {
        let line = format!("13.2 12.9 0.987 1.013 ZZZZ {}", MET);
        let decoded = decode_engineering(&line);
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].field, "flag");
        assert!(decoded.record.flags.is_none());
        assert!(decoded.record.meteorology.is_some());
    }
}
