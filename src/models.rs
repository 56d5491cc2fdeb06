//! Core data structures and types for MAPCO2 telemetry processing.
//!
//! Defines the transport dialects, cycle identifiers, the typed records
//! decoded from each frame, the frame key that joins them, and the
//! processing statistics reported for a stream or a batch.

use crate::constants::{FRAME_KEY_FORMAT, FRAME_KEY_WINDOW_MINUTES, ctd_lengths};
use crate::provenance::IssueKind;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Transport dialect of a stream or frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Satellite relay, one row per cycle
    Summary,
    /// Recovered flash dump, many samples per cycle
    Flash,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Summary => "summary",
            Dialect::Flash => "flash",
        }
    }
}

/// Phase of the measurement sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CycleId {
    ZeroPumpOn,
    ZeroPumpOff,
    ZeroPostCal,
    SpanPumpOn,
    SpanPumpOff,
    SpanPostCal,
    EquilPumpOn,
    EquilPumpOff,
    AirPumpOn,
    AirPumpOff,
}

impl CycleId {
    /// Order of the ten cycle lines in a summary frame
    pub const SUMMARY_ORDER: [CycleId; 10] = [
        CycleId::ZeroPumpOn,
        CycleId::ZeroPumpOff,
        CycleId::ZeroPostCal,
        CycleId::SpanPumpOn,
        CycleId::SpanPumpOff,
        CycleId::SpanPostCal,
        CycleId::EquilPumpOn,
        CycleId::EquilPumpOff,
        CycleId::AirPumpOn,
        CycleId::AirPumpOff,
    ];

    /// Four-letter canonical form used in output rows
    pub fn canonical(&self) -> &'static str {
        match self {
            CycleId::ZeroPumpOn => "zpon",
            CycleId::ZeroPumpOff => "zpof",
            CycleId::ZeroPostCal => "zpcl",
            CycleId::SpanPumpOn => "spon",
            CycleId::SpanPumpOff => "spof",
            CycleId::SpanPostCal => "spcl",
            CycleId::EquilPumpOn => "epon",
            CycleId::EquilPumpOff => "epof",
            CycleId::AirPumpOn => "apon",
            CycleId::AirPumpOff => "apof",
        }
    }

    /// Name used on flash delimiter lines
    pub fn flash_name(&self) -> &'static str {
        match self {
            CycleId::ZeroPumpOn => "Zero_on",
            CycleId::ZeroPumpOff => "Zero_off",
            CycleId::ZeroPostCal => "Zero_cal",
            CycleId::SpanPumpOn => "Span_on",
            CycleId::SpanPumpOff => "Span_off",
            CycleId::SpanPostCal => "Span_cal",
            CycleId::EquilPumpOn => "Equil_on",
            CycleId::EquilPumpOff => "Equil_off",
            CycleId::AirPumpOn => "Air_on",
            CycleId::AirPumpOff => "Air_off",
        }
    }

    /// Resolve either the flash name or the canonical form, case-insensitively
    pub fn from_label(label: &str) -> Option<Self> {
        Self::SUMMARY_ORDER.into_iter().find(|cycle| {
            cycle.flash_name().eq_ignore_ascii_case(label)
                || cycle.canonical().eq_ignore_ascii_case(label)
        })
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Join key shared by every record of a frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameKey(String);

impl FrameKey {
    /// Build the key from the system serial and the authoritative timestamp
    pub fn new(system: &str, time: NaiveDateTime, half_hour_rounding: bool) -> Self {
        let time = if half_hour_rounding {
            floor_half_hour(time)
        } else {
            time.with_nanosecond(0).unwrap_or(time)
        };
        FrameKey(format!("{}_{}", system, time.format(FRAME_KEY_FORMAT)))
    }

    /// Split a key back into its system serial and timestamp
    pub fn parse(key: &str) -> Option<(String, NaiveDateTime)> {
        let (system, time) = key.rsplit_once('_')?;
        let time = NaiveDateTime::parse_from_str(time, FRAME_KEY_FORMAT).ok()?;
        Some((system.to_string(), time))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Floor a timestamp to the enclosing 30-minute window with seconds zeroed
pub fn floor_half_hour(time: NaiveDateTime) -> NaiveDateTime {
    let minute = time.minute() - time.minute() % FRAME_KEY_WINDOW_MINUTES;
    time.date()
        .and_hms_opt(time.hour(), minute, 0)
        .unwrap_or(time)
}

/// Convert a timestamp to nanoseconds since the Unix epoch
pub fn to_epoch_nanos(time: NaiveDateTime) -> Option<i64> {
    time.and_utc().timestamp_nanos_opt()
}

/// Where a frame's authoritative timestamp came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSource {
    Gps,
    UnitClock,
    PostCheck,
}

impl TimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSource::Gps => "gps",
            TimeSource::UnitClock => "unit_clock",
            TimeSource::PostCheck => "post_check",
        }
    }
}

/// The timestamp chosen for a frame and its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeTime {
    pub time: NaiveDateTime,
    pub source: TimeSource,
}

/// Frame header line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub mode: String,
    pub checksum: Option<String>,
    pub size: Option<i64>,
    pub unit_date: Option<String>,
    pub unit_time: Option<String>,
    pub station: Option<String>,
    pub system: Option<String>,
    /// `0.0` when the dialect omits it
    pub firmware: String,
    pub firmware_present: bool,
    pub unit_clock: Option<NaiveDateTime>,
}

/// GPS fix line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub raw_date: Option<String>,
    pub raw_time: Option<String>,
    /// Date reordered to `YYYY/MM/DD`
    pub date: Option<String>,
    /// The date/time matched the no-fix sentinel set
    pub no_fix: bool,
    /// Parsed GPS date/time, absent for no-fix or unparseable fields
    pub fix_time: Option<NaiveDateTime>,
    /// GPS date/time, or the post-check time when the date has the zero year
    pub timestamp: Option<NaiveDateTime>,
    /// Latitude scalar as read, `DDMM.mmmm`
    pub lat_raw: Option<f64>,
    pub lat_degrees: Option<i64>,
    pub lat_minutes: Option<f64>,
    /// Signed decimal degrees
    pub latitude: Option<f64>,
    pub lat_hemisphere: Option<String>,
    /// Longitude scalar as read, `DDDMM.mmmm`
    pub lon_raw: Option<f64>,
    pub lon_degrees: Option<i64>,
    pub lon_minutes: Option<f64>,
    pub longitude: Option<f64>,
    pub lon_hemisphere: Option<String>,
    pub fix_seconds: Option<f64>,
    pub quality: Option<i64>,
    pub pre_check_raw: Option<String>,
    pub pre_check: Option<NaiveDateTime>,
    pub post_check_raw: Option<String>,
    pub post_check: Option<NaiveDateTime>,
    pub valve_time: Option<String>,
}

impl GpsFix {
    /// A GPS record with nothing decoded
    pub fn empty() -> Self {
        Self {
            raw_date: None,
            raw_time: None,
            date: None,
            no_fix: false,
            fix_time: None,
            timestamp: None,
            lat_raw: None,
            lat_degrees: None,
            lat_minutes: None,
            latitude: None,
            lat_hemisphere: None,
            lon_raw: None,
            lon_degrees: None,
            lon_minutes: None,
            longitude: None,
            lon_hemisphere: None,
            fix_seconds: None,
            quality: None,
            pre_check_raw: None,
            pre_check: None,
            post_check_raw: None,
            post_check: None,
            valve_time: None,
        }
    }
}

/// Decoded 16-bit status word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    /// The flag token as transmitted
    pub raw: String,
    /// Hex text after clamp halves were replaced by `00`
    pub decoded_hex: String,
    pub word: u16,
    /// Zero-padded bit vector, most significant bit first
    pub bits: String,
    pub span_clamped: bool,
    pub zero_clamped: bool,
    /// `span[0]` is span-1
    pub span: [bool; 5],
    /// `zero[0]` is zero-1
    pub zero: [bool; 5],
}

impl StatusFlags {
    /// Number of named bits raised
    pub fn named_bit_count(&self) -> u32 {
        self.span.iter().chain(self.zero.iter()).filter(|b| **b).count() as u32
    }
}

/// Engineering line layout selected by token count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineeringLayout {
    /// 18 tokens, no secondary span coefficient
    Standard,
    /// 19 tokens, secondary span coefficient at position four
    WithSecondarySpan,
    /// Any other token count
    Partial,
}

impl EngineeringLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineeringLayout::Standard => "eng18",
            EngineeringLayout::WithSecondarySpan => "eng19",
            EngineeringLayout::Partial => "partial",
        }
    }
}

/// Oceanographic and meteorological context carried on the engineering line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Meteorology {
    pub sst: f64,
    pub sst_std: f64,
    pub ssc: f64,
    pub ssc_std: f64,
    pub sss: f64,
    pub sss_std: f64,
    pub u: f64,
    pub u_std: f64,
    pub v: f64,
    pub v_std: f64,
    pub compass: f64,
    pub vane: f64,
    pub wind_speed: f64,
}

impl Meteorology {
    pub const FIELDS: [&'static str; 13] = [
        "sst",
        "sst_std",
        "ssc",
        "ssc_std",
        "sss",
        "sss_std",
        "u",
        "u_std",
        "v",
        "v_std",
        "compass",
        "vane",
        "wind_speed",
    ];

    pub fn from_values(v: [f64; 13]) -> Self {
        Self {
            sst: v[0],
            sst_std: v[1],
            ssc: v[2],
            ssc_std: v[3],
            sss: v[4],
            sss_std: v[5],
            u: v[6],
            u_std: v[7],
            v: v[8],
            v_std: v[9],
            compass: v[10],
            vane: v[11],
            wind_speed: v[12],
        }
    }

    pub fn values(&self) -> [f64; 13] {
        [
            self.sst,
            self.sst_std,
            self.ssc,
            self.ssc_std,
            self.sss,
            self.sss_std,
            self.u,
            self.u_std,
            self.v,
            self.v_std,
            self.compass,
            self.vane,
            self.wind_speed,
        ]
    }
}

/// Engineering and status line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engineering {
    pub layout: EngineeringLayout,
    pub token_count: usize,
    pub v_logic: Option<f64>,
    pub v_trans: Option<f64>,
    pub zero_coeff: Option<f64>,
    pub span_coeff: Option<f64>,
    pub span2_coeff: Option<f64>,
    pub flags: Option<StatusFlags>,
    /// Unset when any position of the tuple failed to convert
    pub meteorology: Option<Meteorology>,
}

impl Engineering {
    /// An engineering record with nothing decoded
    pub fn empty() -> Self {
        Self {
            layout: EngineeringLayout::Partial,
            token_count: 0,
            v_logic: None,
            v_trans: None,
            zero_coeff: None,
            span_coeff: None,
            span2_coeff: None,
            flags: None,
            meteorology: None,
        }
    }
}

/// One CO2 measurement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle: CycleId,
    /// Sample index within the cycle block, 0 for summary rows
    pub sample: u32,
    pub minute: Option<f64>,
    pub licor_temp: Option<f64>,
    pub licor_temp_std: Option<f64>,
    pub licor_press: Option<f64>,
    pub licor_press_std: Option<f64>,
    pub xco2: Option<f64>,
    pub xco2_std: Option<f64>,
    pub o2: Option<f64>,
    pub o2_std: Option<f64>,
    pub rh: Option<f64>,
    pub rh_std: Option<f64>,
    pub rh_temp: Option<f64>,
    pub rh_temp_std: Option<f64>,
    pub raw1: Option<f64>,
    pub raw1_std: Option<f64>,
    pub raw2: Option<f64>,
    pub raw2_std: Option<f64>,
}

impl CycleRecord {
    /// Measurement columns in summary line order
    pub const FIELDS: [&'static str; 17] = [
        "minute",
        "licor_temp",
        "licor_temp_std",
        "licor_press",
        "licor_press_std",
        "xco2",
        "xco2_std",
        "o2",
        "o2_std",
        "rh",
        "rh_std",
        "rh_temp",
        "rh_temp_std",
        "raw1",
        "raw1_std",
        "raw2",
        "raw2_std",
    ];

    pub fn from_values(cycle: CycleId, sample: u32, v: [Option<f64>; 17]) -> Self {
        Self {
            cycle,
            sample,
            minute: v[0],
            licor_temp: v[1],
            licor_temp_std: v[2],
            licor_press: v[3],
            licor_press_std: v[4],
            xco2: v[5],
            xco2_std: v[6],
            o2: v[7],
            o2_std: v[8],
            rh: v[9],
            rh_std: v[10],
            rh_temp: v[11],
            rh_temp_std: v[12],
            raw1: v[13],
            raw1_std: v[14],
            raw2: v[15],
            raw2_std: v[16],
        }
    }

    pub fn values(&self) -> [Option<f64>; 17] {
        [
            self.minute,
            self.licor_temp,
            self.licor_temp_std,
            self.licor_press,
            self.licor_press_std,
            self.xco2,
            self.xco2_std,
            self.o2,
            self.o2_std,
            self.rh,
            self.rh_std,
            self.rh_temp,
            self.rh_temp_std,
            self.raw1,
            self.raw1_std,
            self.raw2,
            self.raw2_std,
        ]
    }
}

/// `<kind> <count>` line opening an auxiliary block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxHeader {
    pub kind: String,
    pub count: Option<usize>,
}

/// CTD column schema selected by field count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtdSchema {
    Base,
    BaseBattery,
    Extended,
    ExtendedBattery,
    Unknown,
}

impl CtdSchema {
    pub fn from_field_count(count: usize) -> Self {
        match count {
            ctd_lengths::BASE => CtdSchema::Base,
            ctd_lengths::BASE_BATTERY => CtdSchema::BaseBattery,
            ctd_lengths::EXTENDED => CtdSchema::Extended,
            ctd_lengths::EXTENDED_BATTERY => CtdSchema::ExtendedBattery,
            _ => CtdSchema::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CtdSchema::Base => "ctd43",
            CtdSchema::BaseBattery => "ctd45",
            CtdSchema::Extended => "ctd53",
            CtdSchema::ExtendedBattery => "ctd55",
            CtdSchema::Unknown => "unknown",
        }
    }

    /// Column names in packed-vector order for this schema
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = CTD_BASE_COLUMNS.to_vec();
        match self {
            CtdSchema::Base | CtdSchema::Unknown => {}
            CtdSchema::BaseBattery => columns.extend_from_slice(&CTD_BATTERY_COLUMNS),
            CtdSchema::Extended => columns.extend_from_slice(&CTD_EXTENDED_COLUMNS),
            CtdSchema::ExtendedBattery => {
                columns.extend_from_slice(&CTD_EXTENDED_COLUMNS);
                columns.extend_from_slice(&CTD_BATTERY_COLUMNS);
            }
        }
        columns
    }
}

/// Columns shared by every CTD schema
pub const CTD_BASE_COLUMNS: [&str; 43] = [
    "temperature",
    "temperature_std",
    "conductivity",
    "conductivity_std",
    "pressure",
    "pressure_std",
    "volt0",
    "volt0_std",
    "volt1",
    "volt1_std",
    "volt2",
    "volt2_std",
    "volt3",
    "volt3_std",
    "volt4",
    "volt4_std",
    "volt5",
    "volt5_std",
    "serial_temperature_1",
    "serial_temperature_1_std",
    "serial_pressure_1",
    "serial_pressure_1_std",
    "serial_oxygen_1",
    "serial_oxygen_1_std",
    "serial_temperature_2",
    "serial_temperature_2_std",
    "serial_pressure_2",
    "serial_pressure_2_std",
    "serial_oxygen_2",
    "serial_oxygen_2_std",
    "salinity",
    "salinity_std",
    "sound_velocity",
    "sound_velocity_std",
    "density",
    "density_std",
    "oxygen_saturation",
    "oxygen_saturation_std",
    "specific_conductivity",
    "specific_conductivity_std",
    "depth",
    "depth_std",
    "sample_count",
];

/// Extra voltage channels of the 53 and 55 field schemas
pub const CTD_EXTENDED_COLUMNS: [&str; 10] = [
    "volt6",
    "volt6_std",
    "volt7",
    "volt7_std",
    "volt8",
    "volt8_std",
    "volt9",
    "volt9_std",
    "volt10",
    "volt10_std",
];

/// Battery columns of the 45 and 55 field schemas
pub const CTD_BATTERY_COLUMNS: [&str; 2] = ["battery_voltage", "battery_current"];

/// Auxiliary CTD record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtdRecord {
    pub header: Option<AuxHeader>,
    pub schema: CtdSchema,
    pub field_count: usize,
    /// Scaled values in packed order; unconvertible tokens are `None`
    pub values: Vec<Option<f64>>,
    pub raw: String,
}

impl CtdRecord {
    /// Value for a named column, `None` when the schema lacks it
    pub fn value(&self, column: &str) -> Option<f64> {
        let columns = self.schema.columns();
        let limit = match self.schema {
            CtdSchema::Unknown => self.values.len().min(CTD_BASE_COLUMNS.len()),
            _ => self.values.len(),
        };
        columns
            .iter()
            .take(limit)
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i).copied().flatten())
    }
}

/// pH instrument generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhVariant {
    Sami,
    Seafet,
}

impl PhVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhVariant::Sami => "sami",
            PhVariant::Seafet => "seafet",
        }
    }
}

/// Auxiliary pH record, kept opaque for downstream decoders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhRecord {
    pub variant: PhVariant,
    pub header: Option<AuxHeader>,
    pub lines: Vec<String>,
    /// Payload lines joined verbatim
    pub payload: String,
    /// Byte offsets of each split delimiter in `payload`
    pub delimiter_offsets: Vec<usize>,
    pub segments: Vec<String>,
}

/// One scaled value of a Met payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetValue {
    pub line: u32,
    pub field: u32,
    pub value: Option<f64>,
}

/// Auxiliary meteorology record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetRecord {
    pub header: Option<AuxHeader>,
    pub raw: String,
    pub values: Vec<MetValue>,
}

/// Fully assembled frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Position of the frame in the stream
    pub index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub dialect: Dialect,
    pub repeat: bool,
    pub truncated: bool,
    pub degraded: bool,
    pub key: Option<FrameKey>,
    pub time: Option<AuthoritativeTime>,
    pub header: Option<Header>,
    pub gps: Option<GpsFix>,
    pub engineering: Option<Engineering>,
    pub cycles: Vec<CycleRecord>,
    pub ctd: Option<CtdRecord>,
    pub ph: Option<PhRecord>,
    pub met: Option<MetRecord>,
}

impl Frame {
    /// An empty frame flagged as a duplicate transmission
    pub fn repeat(index: usize, start_line: usize, end_line: usize, dialect: Dialect) -> Self {
        Self {
            index,
            start_line,
            end_line,
            dialect,
            repeat: true,
            truncated: false,
            degraded: true,
            key: None,
            time: None,
            header: None,
            gps: None,
            engineering: None,
            cycles: Vec::new(),
            ctd: None,
            ph: None,
            met: None,
        }
    }

    /// System serial from the header
    pub fn system(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.system.as_deref())
    }
}

/// Summary statistics for one parsed stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub lines: usize,
    pub blank_lines: usize,
    pub encoding_errors: usize,
    pub orphan_lines: usize,
    pub frames_total: usize,
    pub frames_emitted: usize,
    pub frames_degraded: usize,
    pub frames_truncated: usize,
    pub frames_repeat: usize,
    pub frames_rejected: usize,
    pub cycle_rows: usize,
    pub cancelled: bool,
    pub issue_counts: BTreeMap<IssueKind, usize>,
}

impl ParseStats {
    /// Fold another stream's statistics into this one
    pub fn merge(&mut self, other: &ParseStats) {
        self.lines += other.lines;
        self.blank_lines += other.blank_lines;
        self.encoding_errors += other.encoding_errors;
        self.orphan_lines += other.orphan_lines;
        self.frames_total += other.frames_total;
        self.frames_emitted += other.frames_emitted;
        self.frames_degraded += other.frames_degraded;
        self.frames_truncated += other.frames_truncated;
        self.frames_repeat += other.frames_repeat;
        self.frames_rejected += other.frames_rejected;
        self.cycle_rows += other.cycle_rows;
        self.cancelled |= other.cancelled;
        for (kind, count) in &other.issue_counts {
            *self.issue_counts.entry(*kind).or_insert(0) += count;
        }
    }

    /// Percentage of frames emitted without degradation
    pub fn clean_rate(&self) -> f64 {
        if self.frames_total == 0 {
            0.0
        } else {
            let clean = self.frames_total - self.frames_degraded.min(self.frames_total);
            (clean as f64 / self.frames_total as f64) * 100.0
        }
    }
}

/// Processing statistics for a batch of files
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub total_rows: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
    pub parse: ParseStats,
}
