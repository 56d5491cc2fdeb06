//! GPS fix line decoder.
//!
//! ```text
//! 05/01/2017 12:00:05 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07 [valve]
//! ```
//!
//! Dates arrive month first and are reordered to `YYYY/MM/DD`. Check times
//! come either as single `YYYY/MM/DD_hh:mm:ss` tokens or as date and time
//! token pairs; whatever follows them is the valve current time.

use super::{Decoded, parse_f64};
use crate::constants::{NO_FIX_DATES, NO_FIX_TIMES, UNIT_DATETIME_FORMAT};
use crate::models::GpsFix;
use crate::provenance::{FieldIssue, IssueKind};
use chrono::{Datelike, NaiveDateTime};

/// Position of the first check-time token
const CHECK_TOKENS_START: usize = 8;

pub fn decode_gps(line: &str) -> Decoded<GpsFix> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut issues = Vec::new();
    let mut gps = GpsFix::empty();

    if tokens.len() < CHECK_TOKENS_START + 2 {
        issues.push(FieldIssue::unparseable(
            "gps",
            format!(
                "expected at least {} tokens, found {}",
                CHECK_TOKENS_START + 2,
                tokens.len()
            ),
        ));
    }

    gps.raw_date = tokens.first().map(|t| t.to_string());
    gps.raw_time = tokens.get(1).map(|t| t.to_string());

    if let Some(raw_date) = tokens.first() {
        match reorder_date(raw_date) {
            Some(date) => gps.date = Some(date),
            None => issues.push(FieldIssue::unparseable(
                "date",
                format!("'{}' is not MM/DD/YYYY", raw_date),
            )),
        }
    }

    gps.no_fix = tokens.first().is_some_and(|d| NO_FIX_DATES.contains(d))
        && tokens.get(1).is_none_or(|t| NO_FIX_TIMES.contains(t));
    let zero_year = gps.date.as_deref().is_some_and(|d| d.starts_with("0000"));

    if gps.no_fix {
        issues.push(FieldIssue::new(
            IssueKind::SentinelNoFix,
            "date",
            "GPS reported no fix",
        ));
    } else if !zero_year {
        if let Some(raw_date) = tokens.first().filter(|d| is_year_first(d)) {
            issues.push(FieldIssue::new(
                IssueKind::AmbiguousField,
                "date",
                format!("'{}' is year-first; read as YYYY/MM/DD", raw_date),
            ));
        }
        if let (Some(date), Some(time)) = (&gps.date, tokens.get(1)) {
            gps.fix_time = parse_datetime(&format!("{} {}", date, time), "fix_time", &mut issues);
        }
    }

    if let Some(raw) = tokens.get(2) {
        match split_coordinate(raw) {
            Some(parts) => {
                gps.lat_raw = Some(parts.raw);
                gps.lat_degrees = Some(parts.degrees);
                gps.lat_minutes = Some(parts.minutes);
                gps.latitude = Some(parts.decimal());
            }
            None => issues.push(FieldIssue::unparseable(
                "latitude",
                format!("'{}' is not DDMM.mmmm", raw),
            )),
        }
    }
    gps.lat_hemisphere = tokens.get(3).map(|t| t.to_string());
    gps.latitude = apply_hemisphere(
        gps.latitude,
        tokens.get(3),
        "lat_hemisphere",
        'N',
        'S',
        &mut issues,
    );

    if let Some(raw) = tokens.get(4) {
        match split_coordinate(raw) {
            Some(parts) => {
                gps.lon_raw = Some(parts.raw);
                gps.lon_degrees = Some(parts.degrees);
                gps.lon_minutes = Some(parts.minutes);
                gps.longitude = Some(parts.decimal());
            }
            None => issues.push(FieldIssue::unparseable(
                "longitude",
                format!("'{}' is not DDDMM.mmmm", raw),
            )),
        }
    }
    gps.lon_hemisphere = tokens.get(5).map(|t| t.to_string());
    gps.longitude = apply_hemisphere(
        gps.longitude,
        tokens.get(5),
        "lon_hemisphere",
        'E',
        'W',
        &mut issues,
    );

    gps.fix_seconds = tokens
        .get(6)
        .and_then(|t| parse_f64(t, "fix_seconds", &mut issues));
    gps.quality = tokens.get(7).and_then(|t| match t.parse::<i64>() {
        Ok(q) => Some(q),
        Err(_) => {
            issues.push(FieldIssue::unparseable(
                "quality",
                format!("'{}' is not an integer", t),
            ));
            None
        }
    });

    let rest = tokens.get(CHECK_TOKENS_START..).unwrap_or_default();
    let (pre, post, valve) = split_check_times(rest);
    if let Some(pre) = pre {
        gps.pre_check = parse_datetime(&pre.replace('_', " "), "pre_check", &mut issues);
        gps.pre_check_raw = Some(pre);
    }
    if let Some(post) = post {
        gps.post_check = parse_datetime(&post.replace('_', " "), "post_check", &mut issues);
        gps.post_check_raw = Some(post);
    }
    gps.valve_time = valve;

    gps.timestamp = if gps.no_fix || zero_year {
        gps.post_check
    } else {
        gps.fix_time
    };

    Decoded::new(gps, issues)
}

/// Reorder `MM/DD/YYYY` to `YYYY/MM/DD`; dates already year-first pass through
fn reorder_date(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 || !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    match (parts[0].len(), parts[1].len(), parts[2].len()) {
        (2, 2, 4) => Some(format!("{}/{}/{}", parts[2], parts[0], parts[1])),
        (4, 2, 2) => Some(raw.to_string()),
        // Two-digit-year all-zero form of the no-fix sentinel
        (2, 2, 2) if raw == "00/00/00" => Some("0000/00/00".to_string()),
        _ => None,
    }
}

/// `YYYY/MM/DD` rather than the expected `MM/DD/YYYY`
fn is_year_first(raw: &str) -> bool {
    raw.split('/').next().is_some_and(|year| year.len() == 4) && reorder_date(raw).is_some()
}

fn parse_datetime(text: &str, field: &str, issues: &mut Vec<FieldIssue>) -> Option<NaiveDateTime> {
    match NaiveDateTime::parse_from_str(text, UNIT_DATETIME_FORMAT) {
        Ok(time) if time.year() > 0 => Some(time),
        Ok(_) => {
            issues.push(FieldIssue::unparseable(field, format!("'{}' has the zero year", text)));
            None
        }
        Err(e) => {
            issues.push(FieldIssue::unparseable(field, format!("'{}': {}", text, e)));
            None
        }
    }
}

/// Pre-check, post-check and valve time from the tokens after quality
fn split_check_times(rest: &[&str]) -> (Option<String>, Option<String>, Option<String>) {
    let paired = rest.first().is_some_and(|t| !t.contains('_'))
        && rest.get(1).is_some_and(|t| t.contains(':'));
    let width = if paired { 2 } else { 1 };

    let take = |i: usize| -> Option<String> {
        let chunk = rest.get(i * width..(i + 1) * width)?;
        Some(chunk.join(" "))
    };

    let valve = rest.get(2 * width..).and_then(|tail| {
        if tail.is_empty() {
            None
        } else {
            Some(tail.join(" "))
        }
    });

    (take(0), take(1), valve)
}

fn apply_hemisphere(
    value: Option<f64>,
    hemisphere: Option<&&str>,
    field: &str,
    positive: char,
    negative: char,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    let value = value?;
    let Some(hemisphere) = hemisphere else {
        return Some(value);
    };
    match hemisphere.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some(c) if c == negative => Some(-value),
        Some(c) if c == positive => Some(value),
        _ => {
            issues.push(FieldIssue::unparseable(
                field,
                format!("'{}' is not {} or {}", hemisphere, positive, negative),
            ));
            Some(value)
        }
    }
}

/// An unsigned `DDMM.mmmm` scalar and its degree and minute parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateParts {
    pub raw: f64,
    pub degrees: i64,
    pub minutes: f64,
}

impl CoordinateParts {
    /// Unsigned decimal degrees
    pub fn decimal(&self) -> f64 {
        self.degrees as f64 + self.minutes / 60.0
    }
}

/// Split an unsigned `DDMM.mmmm` scalar into degrees and minutes
///
/// Degrees are every integer digit except the last two; the last two integer
/// digits plus the fractional tail are minutes. Zero splits to zero.
pub fn split_coordinate(raw: &str) -> Option<CoordinateParts> {
    let (integer, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if integer.is_empty()
        || !integer.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let split = integer.len().saturating_sub(2);
    let degrees: i64 = if split == 0 {
        0
    } else {
        integer[..split].parse().ok()?
    };
    let minutes: f64 = format!("{}.{}", &integer[split..], fraction)
        .trim_end_matches('.')
        .parse()
        .ok()?;

    Some(CoordinateParts {
        raw: raw.parse().ok()?,
        degrees,
        minutes,
    })
}

/// Decode an unsigned `DDMM.mmmm` scalar to decimal degrees
pub fn decode_coordinate(raw: &str) -> Option<f64> {
    split_coordinate(raw).map(|parts| parts.decimal())
}

/// Encode decimal degrees back to the `DDMM.mmmm` scalar
pub fn encode_coordinate(degrees: f64) -> f64 {
    let magnitude = degrees.abs();
    let whole = magnitude.trunc();
    whole * 100.0 + (magnitude - whole) * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CLEAN: &str =
        "05/01/2017 12:00:05 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07 0";

    fn at(h: u32, m: u32, s: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2017, 5, 1).unwrap().and_hms_opt(h, m, s)
    }

    #[test]
    fn test_clean_fix() {
        let decoded = decode_gps(CLEAN);
        assert!(decoded.issues.is_empty(), "{:?}", decoded.issues);
        let gps = decoded.record;
        assert_eq!(gps.date.as_deref(), Some("2017/05/01"));
        assert!(!gps.no_fix);
        assert_eq!(gps.fix_time, at(12, 0, 5));
        assert_eq!(gps.timestamp, at(12, 0, 5));
        assert!((gps.latitude.unwrap() - 47.168723333).abs() < 1e-6);
        assert!((gps.longitude.unwrap() + 122.427981667).abs() < 1e-6);
        assert_eq!(gps.fix_seconds, Some(42.0));
        assert_eq!(gps.quality, Some(1));
        assert_eq!(gps.pre_check, at(12, 0, 3));
        assert_eq!(gps.post_check, at(12, 0, 7));
        assert_eq!(gps.post_check_raw.as_deref(), Some("2017/05/01_12:00:07"));
        assert_eq!(gps.valve_time.as_deref(), Some("0"));
    }

    #[test]
    fn test_paired_check_times() {
        let line = "05/01/2017 12:00:05 4710.1234 S 12225.6789 E 42 1 2017/05/01 12:00:03 2017/05/01 12:00:07 15";
        let gps = decode_gps(line).record;
        assert_eq!(gps.pre_check_raw.as_deref(), Some("2017/05/01 12:00:03"));
        assert_eq!(gps.post_check, at(12, 0, 7));
        assert_eq!(gps.valve_time.as_deref(), Some("15"));
        assert!(gps.latitude.unwrap() < 0.0);
        assert!(gps.longitude.unwrap() > 0.0);
    }

    #[test]
    fn test_no_fix_substitutes_post_check() {
        let line = "0000/00/00 00:00:00 0000.0000 N 00000.0000 E 0 0 2017/05/01_12:00:03 2017/05/01_12:00:07";
        let decoded = decode_gps(line);
        assert!(!decoded.degraded());
        assert_eq!(decoded.issues[0].kind, IssueKind::SentinelNoFix);
        let gps = decoded.record;
        assert!(gps.no_fix);
        assert_eq!(gps.fix_time, None);
        assert_eq!(gps.timestamp, at(12, 0, 7));
        assert_eq!(gps.latitude, Some(0.0));
        assert_eq!(gps.valve_time, None);
    }

    #[test]
    fn test_month_first_no_fix_form() {
        let gps = decode_gps("00/00/0000 00:00:00").record;
        assert!(gps.no_fix);
        assert_eq!(gps.date.as_deref(), Some("0000/00/00"));
        assert_eq!(gps.timestamp, None);
    }

    #[test]
    fn test_year_first_date_is_flagged() {
        let line = CLEAN.replacen("05/01/2017", "2017/05/01", 1);
        let decoded = decode_gps(&line);
        assert!(!decoded.degraded());
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].kind, IssueKind::AmbiguousField);
        assert_eq!(decoded.issues[0].field, "date");
        assert_eq!(decoded.record.date.as_deref(), Some("2017/05/01"));
        assert_eq!(decoded.record.fix_time, at(12, 0, 5));

        let no_fix = decode_gps("0000/00/00 00:00:00");
        assert!(no_fix.issues.iter().all(|i| i.kind != IssueKind::AmbiguousField));
    }

    #[test]
    fn test_zero_year_with_time_uses_post_check() {
        let line = "00/00/0000 12:30:00 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07";
        let gps = decode_gps(line).record;
        assert!(!gps.no_fix);
        assert_eq!(gps.fix_time, None);
        assert_eq!(gps.timestamp, at(12, 0, 7));
    }

    #[test]
    fn test_corrupt_fields_are_nulled() {
        let line = "13/45/2017 12:00:05 47x0.1 N 12225.6789 Q 4a 1 2017/05/01_12:00:03 bad";
        let decoded = decode_gps(line);
        let fields: Vec<&str> = decoded.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"fix_time"));
        assert!(fields.contains(&"latitude"));
        assert!(fields.contains(&"lon_hemisphere"));
        assert!(fields.contains(&"fix_seconds"));
        assert!(fields.contains(&"post_check"));
        let gps = decoded.record;
        assert_eq!(gps.latitude, None);
        assert!(gps.longitude.unwrap() > 0.0);
        assert_eq!(gps.pre_check, at(12, 0, 3));
    }

    #[test]
    fn test_coordinate_decoding() {
        assert_eq!(decode_coordinate("0"), Some(0.0));
        assert_eq!(decode_coordinate("0000.0000"), Some(0.0));
        assert!((decode_coordinate("30.5").unwrap() - 30.5 / 60.0).abs() < 1e-12);
        assert_eq!(decode_coordinate("4700"), Some(47.0));
        assert_eq!(decode_coordinate("-4700"), None);
        assert_eq!(decode_coordinate(""), None);
        assert_eq!(decode_coordinate("47.1.2"), None);
    }

    #[test]
    fn test_coordinate_parts_are_kept() {
        let gps = decode_gps(CLEAN).record;
        assert_eq!(gps.lat_raw, Some(4710.1234));
        assert_eq!(gps.lat_degrees, Some(47));
        assert!((gps.lat_minutes.unwrap() - 10.1234).abs() < 1e-9);
        assert_eq!(gps.lon_raw, Some(12225.6789));
        assert_eq!(gps.lon_degrees, Some(122));
        assert!((gps.lon_minutes.unwrap() - 25.6789).abs() < 1e-9);

        // Parts stay unsigned; the hemisphere only signs the decimal value
        let rebuilt = gps.lon_degrees.unwrap() as f64 + gps.lon_minutes.unwrap() / 60.0;
        assert!((rebuilt + gps.longitude.unwrap()).abs() < 1e-9);
        let reencoded = gps.lat_degrees.unwrap() as f64 * 100.0 + gps.lat_minutes.unwrap();
        assert!((reencoded - gps.lat_raw.unwrap()).abs() < 1e-9);

        let corrupt = decode_gps(&CLEAN.replacen("4710.1234", "47x0.1", 1)).record;
        assert_eq!(corrupt.lat_raw, None);
        assert_eq!(corrupt.lat_degrees, None);
        assert_eq!(corrupt.lat_minutes, None);
    }

    #[test]
    fn test_split_coordinate() {
        let parts = split_coordinate("30.5").unwrap();
        assert_eq!(parts.degrees, 0);
        assert_eq!(parts.minutes, 30.5);
        assert_eq!(parts.raw, 30.5);
        assert_eq!(split_coordinate("17959.9999").unwrap().degrees, 179);
        assert_eq!(split_coordinate("0").unwrap().minutes, 0.0);
        assert_eq!(split_coordinate("4a"), None);
    }

    #[test]
    fn test_coordinate_round_trip() {
        for raw in [
            "4710.1234",
            "12225.6789",
            "0.0001",
            "59.9999",
            "100.5",
            "8959.9999",
            "17959.9999",
            "1234.56789",
        ] {
            let decoded = decode_coordinate(raw).unwrap();
            let reencoded = encode_coordinate(decoded);
            let original: f64 = raw.parse().unwrap();
            assert!(
                (reencoded - original).abs() < 1e-9,
                "{} -> {} -> {}",
                raw,
                decoded,
                reencoded
            );
        }
    }
}
