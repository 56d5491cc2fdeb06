//! Auxiliary block decoders: CTD, pH, Met and flash cycle sub-blocks.
//!
//! Blocks open with a `<kind> <count>` line. CTD and Met payloads are
//! integer fields scaled by 1/100; pH payloads stay opaque hex.

use super::{Decoded, is_numeric, parse_scaled};
use crate::constants::{CTD_TERMINATOR, PH_SPLIT_DELIMITER, ctd_lengths, flash_blocks};
use crate::models::{
    AuxHeader, CtdRecord, CtdSchema, CycleId, CycleRecord, MetRecord, MetValue, PhRecord,
    PhVariant,
};
use crate::provenance::{FieldIssue, IssueKind};

/// Read a `<kind> <count>` line
pub fn decode_aux_header(line: &str) -> Option<AuxHeader> {
    let mut tokens = line.split_whitespace();
    let kind = tokens.next()?;
    if is_numeric(kind) {
        return None;
    }
    Some(AuxHeader {
        kind: kind.to_string(),
        count: tokens.next().and_then(|c| c.parse().ok()),
    })
}

/// Separate an optional header line from the payload lines
fn split_header<'a>(lines: &'a [&'a str]) -> (Option<AuxHeader>, &'a [&'a str]) {
    match lines.split_first() {
        Some((first, rest)) => match decode_aux_header(first) {
            Some(header) => (Some(header), rest),
            None => (None, lines),
        },
        None => (None, lines),
    }
}

fn is_ctd_terminator(line: &str) -> bool {
    line.get(..CTD_TERMINATOR.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(CTD_TERMINATOR))
}

/// Decode an SBE16 block into the schema matching its field count
pub fn decode_ctd(lines: &[&str]) -> Decoded<CtdRecord> {
    let (header, payload) = split_header(lines);
    let payload: Vec<&str> = payload
        .iter()
        .copied()
        .filter(|line| !is_ctd_terminator(line))
        .collect();
    let mut issues = Vec::new();

    let tokens: Vec<&str> = payload.iter().flat_map(|l| l.split_whitespace()).collect();
    let schema = CtdSchema::from_field_count(tokens.len());
    let columns = schema.columns();

    let values: Vec<Option<f64>> = tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let field = columns.get(i).copied().unwrap_or("ctd_extra");
            parse_scaled(token, field, &mut issues)
        })
        .collect();

    if schema == CtdSchema::Unknown {
        issues.push(FieldIssue::new(
            IssueKind::UnknownAuxBlock,
            "ctd",
            format!(
                "{} fields match no known schema; only the first {} are mapped",
                tokens.len(),
                ctd_lengths::BASE.min(tokens.len())
            ),
        ));
    }

    let record = CtdRecord {
        header,
        schema,
        field_count: tokens.len(),
        values,
        raw: payload.join("\n"),
    };
    Decoded::new(record, issues)
}

/// Keep a pH block opaque, indexing the delimiter that splits its sub-measurements
pub fn decode_ph(lines: &[&str], variant: PhVariant) -> Decoded<PhRecord> {
    let (header, payload) = split_header(lines);
    let mut issues = Vec::new();

    if payload.is_empty() {
        issues.push(FieldIssue::new(
            IssueKind::UnknownAuxBlock,
            "ph",
            "block carries no payload lines",
        ));
    } else if let Some(count) = header.as_ref().and_then(|h| h.count) {
        if count != payload.len() {
            issues.push(FieldIssue::new(
                IssueKind::FrameTruncated,
                "ph",
                format!("header declares {} lines, found {}", count, payload.len()),
            ));
        }
    }

    let joined = payload.concat();
    let delimiter_offsets = joined
        .match_indices(PH_SPLIT_DELIMITER)
        .map(|(offset, _)| offset)
        .collect();
    let segments: Vec<String> = joined.split(PH_SPLIT_DELIMITER).map(str::to_string).collect();
    let measured = segments.iter().filter(|s| !s.is_empty()).count();
    if measured > 1 {
        issues.push(FieldIssue::new(
            IssueKind::AmbiguousField,
            "ph",
            format!("payload splits into {} sub-measurements; all kept", measured),
        ));
    }

    let record = PhRecord {
        variant,
        header,
        lines: payload.iter().map(|l| l.to_string()).collect(),
        payload: joined,
        delimiter_offsets,
        segments,
    };
    Decoded::new(record, issues)
}

/// Decode a Met block into long-form scaled values
pub fn decode_met(lines: &[&str]) -> Decoded<MetRecord> {
    let (header, payload) = split_header(lines);
    let mut issues = Vec::new();

    let mut values = Vec::new();
    for (line_index, line) in payload.iter().enumerate() {
        for (field_index, token) in line.split_whitespace().enumerate() {
            let field = format!("met[{}][{}]", line_index, field_index);
            values.push(MetValue {
                line: line_index as u32,
                field: field_index as u32,
                value: parse_scaled(token, &field, &mut issues),
            });
        }
    }

    if values.is_empty() {
        issues.push(FieldIssue::new(
            IssueKind::UnknownAuxBlock,
            "met",
            "block carries no values",
        ));
    }

    let record = MetRecord {
        header,
        raw: payload.join("\n"),
        values,
    };
    Decoded::new(record, issues)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashBlock {
    Licor,
    Oxygen,
    Humidity,
    HumidityTemp,
}

impl FlashBlock {
    fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_ascii_lowercase();
        match tag.as_str() {
            flash_blocks::LICOR => Some(FlashBlock::Licor),
            flash_blocks::OXYGEN => Some(FlashBlock::Oxygen),
            flash_blocks::HUMIDITY => Some(FlashBlock::Humidity),
            flash_blocks::HUMIDITY_TEMP => Some(FlashBlock::HumidityTemp),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FlashBlock::Licor => flash_blocks::LICOR,
            FlashBlock::Oxygen => flash_blocks::OXYGEN,
            FlashBlock::Humidity => flash_blocks::HUMIDITY,
            FlashBlock::HumidityTemp => flash_blocks::HUMIDITY_TEMP,
        }
    }
}

/// Decode the body of one flash cycle section into per-sample rows
///
/// Sub-blocks `Licor n`, `O2 n`, `RH n` and `RHT n` each hold `n` sample
/// lines. Licor samples carry `licor_temp licor_press xco2 raw1 raw2`; the
/// others carry a single value. Row `i` joins sample `i` of every sub-block.
pub fn decode_flash_cycle(
    lines: &[&str],
    cycle: CycleId,
    minute: Option<f64>,
) -> Decoded<Vec<CycleRecord>> {
    let mut issues = Vec::new();
    let mut licor: Vec<[Option<f64>; flash_blocks::LICOR_FIELDS]> = Vec::new();
    let mut oxygen: Vec<Option<f64>> = Vec::new();
    let mut humidity: Vec<Option<f64>> = Vec::new();
    let mut humidity_temp: Vec<Option<f64>> = Vec::new();
    let mut declared: Vec<(FlashBlock, Option<usize>, usize)> = Vec::new();
    let mut current: Option<FlashBlock> = None;

    for line in lines {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };

        if let Some(block) = FlashBlock::from_tag(first) {
            let count = tokens.next().and_then(|c| c.parse().ok());
            declared.push((block, count, 0));
            current = Some(block);
            continue;
        }

        let Some(block) = current else {
            issues.push(FieldIssue::unparseable(
                "flash",
                format!("line '{}' precedes any sub-block", line),
            ));
            continue;
        };
        if let Some(entry) = declared.last_mut() {
            entry.2 += 1;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match block {
            FlashBlock::Licor => {
                if tokens.len() != flash_blocks::LICOR_FIELDS {
                    issues.push(FieldIssue::unparseable(
                        "licor",
                        format!(
                            "expected {} values, found {}",
                            flash_blocks::LICOR_FIELDS,
                            tokens.len()
                        ),
                    ));
                }
                const NAMES: [&str; flash_blocks::LICOR_FIELDS] =
                    ["licor_temp", "licor_press", "xco2", "raw1", "raw2"];
                let sample = std::array::from_fn(|i| {
                    tokens
                        .get(i)
                        .and_then(|t| super::parse_f64(t, NAMES[i], &mut issues))
                });
                licor.push(sample);
            }
            FlashBlock::Oxygen => oxygen.push(single_value(&tokens, "o2", &mut issues)),
            FlashBlock::Humidity => humidity.push(single_value(&tokens, "rh", &mut issues)),
            FlashBlock::HumidityTemp => {
                humidity_temp.push(single_value(&tokens, "rh_temp", &mut issues))
            }
        }
    }

    for (block, count, seen) in &declared {
        if let Some(count) = count {
            if count != seen {
                issues.push(FieldIssue::new(
                    IssueKind::FrameTruncated,
                    block.name(),
                    format!("sub-block declares {} samples, found {}", count, seen),
                ));
            }
        }
    }

    let rows = licor
        .len()
        .max(oxygen.len())
        .max(humidity.len())
        .max(humidity_temp.len());
    let lengths = [licor.len(), oxygen.len(), humidity.len(), humidity_temp.len()];
    if lengths.iter().any(|len| *len != rows) {
        issues.push(FieldIssue::new(
            IssueKind::FrameTruncated,
            "flash",
            format!(
                "sub-block lengths differ (licor {}, o2 {}, rh {}, rht {})",
                lengths[0], lengths[1], lengths[2], lengths[3]
            ),
        ));
    }

    let records = (0..rows)
        .map(|i| {
            let sample = licor.get(i).copied().unwrap_or([None; flash_blocks::LICOR_FIELDS]);
            let mut values = [None; 17];
            values[0] = minute;
            values[1] = sample[0];
            values[3] = sample[1];
            values[5] = sample[2];
            values[7] = oxygen.get(i).copied().flatten();
            values[9] = humidity.get(i).copied().flatten();
            values[11] = humidity_temp.get(i).copied().flatten();
            values[13] = sample[3];
            values[15] = sample[4];
            CycleRecord::from_values(cycle, i as u32, values)
        })
        .collect();

    Decoded::new(records, issues)
}

fn single_value(tokens: &[&str], field: &str, issues: &mut Vec<FieldIssue>) -> Option<f64> {
    if tokens.len() != 1 {
        issues.push(FieldIssue::unparseable(
            field,
            format!("expected 1 value, found {}", tokens.len()),
        ));
    }
    tokens
        .first()
        .and_then(|t| super::parse_f64(t, field, issues))
}
