//! Stream normalizer.
//!
//! Frames are pushed one at a time into typed column buffers and dropped;
//! `finish` turns the buffers into polars `DataFrame`s with one fixed schema
//! per record kind, whichever transport the frames came from. Numeric
//! columns are Float64 with explicit nulls, timestamps are `Datetime(ns)`
//! and enumerated fields are Categorical. The configured sentinel value is
//! nulled on the way in.

use crate::constants::row_sets;
use crate::models::{
    CTD_BASE_COLUMNS, CTD_BATTERY_COLUMNS, CTD_EXTENDED_COLUMNS, CycleRecord, Frame, Meteorology,
    to_epoch_nanos,
};
use crate::provenance::SideLog;
use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::debug;

/// Storage type of an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Float,
    Int,
    UInt,
    Bool,
    Timestamp,
    Category,
}

/// One cell on its way into a column buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Option<String>),
    Float(Option<f64>),
    Int(Option<i64>),
    UInt(Option<u32>),
    Bool(Option<bool>),
    /// Nanoseconds since the Unix epoch
    Timestamp(Option<i64>),
    Category(Option<String>),
}

impl Value {
    pub fn timestamp(time: Option<NaiveDateTime>) -> Self {
        Value::Timestamp(time.and_then(to_epoch_nanos))
    }

    pub fn category(symbol: Option<&str>) -> Self {
        Value::Category(symbol.map(str::to_string))
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        Value::Float(v)
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(Some(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(Some(v))
    }
}

impl From<Option<bool>> for Value {
    fn from(v: Option<bool>) -> Self {
        Value::Bool(v)
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        Value::Text(v.map(str::to_string))
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        Value::Text(v)
    }
}

#[derive(Debug)]
enum ColumnData {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    UInt(Vec<Option<u32>>),
    Bool(Vec<Option<bool>>),
    Timestamp(Vec<Option<i64>>),
    Category(Vec<Option<String>>),
}

impl ColumnData {
    fn new(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => ColumnData::Text(Vec::new()),
            ColumnKind::Float => ColumnData::Float(Vec::new()),
            ColumnKind::Int => ColumnData::Int(Vec::new()),
            ColumnKind::UInt => ColumnData::UInt(Vec::new()),
            ColumnKind::Bool => ColumnData::Bool(Vec::new()),
            ColumnKind::Timestamp => ColumnData::Timestamp(Vec::new()),
            ColumnKind::Category => ColumnData::Category(Vec::new()),
        }
    }

    /// Append a value; a value of the wrong kind is stored as null
    fn push(&mut self, value: Value, sentinel: f64) {
        match (self, value) {
            (ColumnData::Text(v), Value::Text(x)) => v.push(x),
            (ColumnData::Float(v), Value::Float(x)) => v.push(x.filter(|x| *x != sentinel)),
            (ColumnData::Int(v), Value::Int(x)) => v.push(x),
            (ColumnData::UInt(v), Value::UInt(x)) => v.push(x),
            (ColumnData::Bool(v), Value::Bool(x)) => v.push(x),
            (ColumnData::Timestamp(v), Value::Timestamp(x)) => v.push(x),
            (ColumnData::Category(v), Value::Category(x)) => v.push(x),
            (data, value) => {
                debug_assert!(false, "value {:?} does not fit column", value);
                data.push_null();
            }
        }
    }

    fn push_null(&mut self) {
        match self {
            ColumnData::Text(v) | ColumnData::Category(v) => v.push(None),
            ColumnData::Float(v) => v.push(None),
            ColumnData::Int(v) | ColumnData::Timestamp(v) => v.push(None),
            ColumnData::UInt(v) => v.push(None),
            ColumnData::Bool(v) => v.push(None),
        }
    }

    fn into_column(self, name: &str) -> PolarsResult<Column> {
        let name: PlSmallStr = name.into();
        Ok(match self {
            ColumnData::Text(v) => Column::new(name, v),
            ColumnData::Float(v) => Column::new(name, v),
            ColumnData::Int(v) => Column::new(name, v),
            ColumnData::UInt(v) => Column::new(name, v),
            ColumnData::Bool(v) => Column::new(name, v),
            ColumnData::Timestamp(v) => Series::new(name, v)
                .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
                .into_column(),
            ColumnData::Category(v) => Series::new(name, v)
                .cast(&DataType::Categorical(None, Default::default()))?
                .into_column(),
        })
    }
}

/// Column buffers for one row set
#[derive(Debug)]
pub struct RowSetBuilder {
    name: &'static str,
    schema: &'static [(&'static str, ColumnKind)],
    columns: Vec<ColumnData>,
    rows: usize,
    sentinel: f64,
}

impl RowSetBuilder {
    pub fn new(
        name: &'static str,
        schema: &'static [(&'static str, ColumnKind)],
        sentinel: f64,
    ) -> Self {
        Self {
            name,
            schema,
            columns: schema.iter().map(|(_, kind)| ColumnData::new(*kind)).collect(),
            rows: 0,
            sentinel,
        }
    }

    /// Append one row given in schema order; missing trailing cells are null
    pub fn push(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.schema.len(), "row width for {}", self.name);
        let mut cells = row.into_iter();
        for column in &mut self.columns {
            match cells.next() {
                Some(value) => column.push(value, self.sentinel),
                None => column.push_null(),
            }
        }
        self.rows += 1;
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn finish(self) -> PolarsResult<DataFrame> {
        let columns = self
            .columns
            .into_iter()
            .zip(self.schema)
            .map(|(data, (name, _))| data.into_column(name))
            .collect::<PolarsResult<Vec<Column>>>()?;
        DataFrame::new(columns)
    }
}

use ColumnKind::{Bool, Category, Float, Int, Text, Timestamp, UInt};

const HEADER_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("frame_index", Int),
    ("start_line", Int),
    ("repeat", Bool),
    ("truncated", Bool),
    ("degraded", Bool),
    ("dialect", Category),
    ("mode", Category),
    ("checksum", Text),
    ("size", Int),
    ("unit_date", Text),
    ("unit_time", Text),
    ("unit_clock", Timestamp),
    ("station", Text),
    ("firmware", Text),
    ("firmware_present", Bool),
    ("authoritative_time", Timestamp),
    ("time_source", Category),
];

const GPS_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("raw_date", Text),
    ("raw_time", Text),
    ("date", Text),
    ("no_fix", Bool),
    ("timestamp", Timestamp),
    ("lat_raw", Float),
    ("lat_degrees", Int),
    ("lat_minutes", Float),
    ("latitude", Float),
    ("lat_hemisphere", Category),
    ("lon_raw", Float),
    ("lon_degrees", Int),
    ("lon_minutes", Float),
    ("longitude", Float),
    ("lon_hemisphere", Category),
    ("fix_seconds", Float),
    ("quality", Int),
    ("pre_check", Timestamp),
    ("post_check", Timestamp),
    ("valve_time", Text),
];

const ENGINEERING_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("layout", Category),
    ("token_count", Int),
    ("v_logic", Float),
    ("v_trans", Float),
    ("zero_coeff", Float),
    ("span_coeff", Float),
    ("span2_coeff", Float),
    ("flag_raw", Text),
    ("flag_hex", Text),
    ("flag_word", Int),
    ("flag_bits", Text),
    ("span_clamped", Bool),
    ("zero_clamped", Bool),
    ("f_span_5", Bool),
    ("f_span_4", Bool),
    ("f_span_3", Bool),
    ("f_span_2", Bool),
    ("f_span_1", Bool),
    ("f_zero_5", Bool),
    ("f_zero_4", Bool),
    ("f_zero_3", Bool),
    ("f_zero_2", Bool),
    ("f_zero_1", Bool),
    ("sst", Float),
    ("sst_std", Float),
    ("ssc", Float),
    ("ssc_std", Float),
    ("sss", Float),
    ("sss_std", Float),
    ("u", Float),
    ("u_std", Float),
    ("v", Float),
    ("v_std", Float),
    ("compass", Float),
    ("vane", Float),
    ("wind_speed", Float),
];

const CYCLE_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("cycle", Category),
    ("sample", UInt),
    ("minute", Float),
    ("licor_temp", Float),
    ("licor_temp_std", Float),
    ("licor_press", Float),
    ("licor_press_std", Float),
    ("xco2", Float),
    ("xco2_std", Float),
    ("o2", Float),
    ("o2_std", Float),
    ("rh", Float),
    ("rh_std", Float),
    ("rh_temp", Float),
    ("rh_temp_std", Float),
    ("raw1", Float),
    ("raw1_std", Float),
    ("raw2", Float),
    ("raw2_std", Float),
];

const CTD_LEAD: [(&str, ColumnKind); 5] = [
    ("frame_key", Text),
    ("system", Text),
    ("schema", Category),
    ("field_count", Int),
    ("raw", Text),
];

/// Leading columns plus every CTD value column of the widest schema
const CTD_SCHEMA: &[(&str, ColumnKind)] = &ctd_schema();

const fn ctd_schema() -> [(&'static str, ColumnKind); 60] {
    let mut schema = [("", Float); 60];
    let mut i = 0;
    while i < CTD_LEAD.len() {
        schema[i] = CTD_LEAD[i];
        i += 1;
    }
    let mut j = 0;
    while j < CTD_BASE_COLUMNS.len() {
        schema[i] = (CTD_BASE_COLUMNS[j], Float);
        i += 1;
        j += 1;
    }
    j = 0;
    while j < CTD_EXTENDED_COLUMNS.len() {
        schema[i] = (CTD_EXTENDED_COLUMNS[j], Float);
        i += 1;
        j += 1;
    }
    j = 0;
    while j < CTD_BATTERY_COLUMNS.len() {
        schema[i] = (CTD_BATTERY_COLUMNS[j], Float);
        i += 1;
        j += 1;
    }
    schema
}

const PH_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("variant", Category),
    ("kind", Text),
    ("declared_count", Int),
    ("line_count", Int),
    ("segment_index", UInt),
    ("segment", Text),
    ("payload", Text),
    ("delimiter_offsets", Text),
];

const MET_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_key", Text),
    ("system", Text),
    ("line", UInt),
    ("field", UInt),
    ("value", Float),
];

const SIDE_LOG_SCHEMA: &[(&str, ColumnKind)] = &[
    ("frame_index", Int),
    ("line", Int),
    ("frame_key", Text),
    ("kind", Category),
    ("cycle", Category),
    ("field", Text),
    ("reason", Text),
];

/// The row sets of one or more streams
#[derive(Debug, Clone)]
pub struct NormalizedRowSets {
    pub header: DataFrame,
    pub gps: DataFrame,
    pub engineering: DataFrame,
    pub cycles: DataFrame,
    pub ctd: DataFrame,
    pub ph: DataFrame,
    pub met: DataFrame,
    pub side_log: DataFrame,
}

impl NormalizedRowSets {
    /// Row sets paired with their output names
    pub fn named(&self) -> [(&'static str, &DataFrame); 8] {
        [
            (row_sets::HEADER, &self.header),
            (row_sets::GPS, &self.gps),
            (row_sets::ENGINEERING, &self.engineering),
            (row_sets::CYCLES, &self.cycles),
            (row_sets::CTD, &self.ctd),
            (row_sets::PH, &self.ph),
            (row_sets::MET, &self.met),
            (row_sets::SIDE_LOG, &self.side_log),
        ]
    }

    /// Rows across the record row sets, side log excluded
    pub fn total_rows(&self) -> usize {
        self.named()
            .iter()
            .filter(|(name, _)| *name != row_sets::SIDE_LOG)
            .map(|(_, df)| df.height())
            .sum()
    }
}

/// Incremental builder of the normalized row sets
#[derive(Debug)]
pub struct StreamNormalizer {
    header: RowSetBuilder,
    gps: RowSetBuilder,
    engineering: RowSetBuilder,
    cycles: RowSetBuilder,
    ctd: RowSetBuilder,
    ph: RowSetBuilder,
    met: RowSetBuilder,
}

impl StreamNormalizer {
    pub fn new(sentinel: f64) -> Self {
        Self {
            header: RowSetBuilder::new(row_sets::HEADER, HEADER_SCHEMA, sentinel),
            gps: RowSetBuilder::new(row_sets::GPS, GPS_SCHEMA, sentinel),
            engineering: RowSetBuilder::new(row_sets::ENGINEERING, ENGINEERING_SCHEMA, sentinel),
            cycles: RowSetBuilder::new(row_sets::CYCLES, CYCLE_SCHEMA, sentinel),
            ctd: RowSetBuilder::new(row_sets::CTD, CTD_SCHEMA, sentinel),
            ph: RowSetBuilder::new(row_sets::PH, PH_SCHEMA, sentinel),
            met: RowSetBuilder::new(row_sets::MET, MET_SCHEMA, sentinel),
        }
    }

    /// Number of frames pushed so far
    pub fn frames(&self) -> usize {
        self.header.len()
    }

    /// Append every record of a frame to its row set
    pub fn push_frame(&mut self, frame: &Frame) {
        let key = frame.key.as_ref().map(|k| k.as_str());
        let system = frame.system();
        let ident = || -> [Value; 2] { [key.into(), system.into()] };
        let header = frame.header.as_ref();

        self.header.push(
            ident()
                .into_iter()
                .chain([
                    Value::Int(Some(frame.index as i64)),
                    Value::Int(Some(frame.start_line as i64)),
                    frame.repeat.into(),
                    frame.truncated.into(),
                    frame.degraded.into(),
                    Value::category(Some(frame.dialect.as_str())),
                    Value::category(header.map(|h| h.mode.as_str())),
                    header.and_then(|h| h.checksum.as_deref()).into(),
                    header.and_then(|h| h.size).into(),
                    header.and_then(|h| h.unit_date.as_deref()).into(),
                    header.and_then(|h| h.unit_time.as_deref()).into(),
                    Value::timestamp(header.and_then(|h| h.unit_clock)),
                    header.and_then(|h| h.station.as_deref()).into(),
                    header.map(|h| h.firmware.as_str()).into(),
                    header.map(|h| h.firmware_present).into(),
                    Value::timestamp(frame.time.map(|t| t.time)),
                    Value::category(frame.time.map(|t| t.source.as_str())),
                ])
                .collect(),
        );

        if frame.repeat {
            return;
        }

        if let Some(gps) = &frame.gps {
            self.gps.push(
                ident()
                    .into_iter()
                    .chain([
                        Value::from(gps.raw_date.as_deref()),
                        gps.raw_time.as_deref().into(),
                        gps.date.as_ref().map(|d| d.replace('/', "-")).into(),
                        gps.no_fix.into(),
                        Value::timestamp(gps.timestamp),
                        gps.lat_raw.into(),
                        gps.lat_degrees.into(),
                        gps.lat_minutes.into(),
                        gps.latitude.into(),
                        Value::category(gps.lat_hemisphere.as_deref()),
                        gps.lon_raw.into(),
                        gps.lon_degrees.into(),
                        gps.lon_minutes.into(),
                        gps.longitude.into(),
                        Value::category(gps.lon_hemisphere.as_deref()),
                        gps.fix_seconds.into(),
                        gps.quality.into(),
                        Value::timestamp(gps.pre_check),
                        Value::timestamp(gps.post_check),
                        gps.valve_time.as_deref().into(),
                    ])
                    .collect(),
            );
        }

        if let Some(engineering) = &frame.engineering {
            let flags = engineering.flags.as_ref();
            let mut row: Vec<Value> = ident().into_iter().collect();
            row.extend([
                Value::category(Some(engineering.layout.as_str())),
                Value::Int(Some(engineering.token_count as i64)),
                engineering.v_logic.into(),
                engineering.v_trans.into(),
                engineering.zero_coeff.into(),
                engineering.span_coeff.into(),
                engineering.span2_coeff.into(),
                flags.map(|f| f.raw.as_str()).into(),
                flags.map(|f| f.decoded_hex.as_str()).into(),
                flags.map(|f| f.word as i64).into(),
                flags.map(|f| f.bits.as_str()).into(),
                flags.map(|f| f.span_clamped).into(),
                flags.map(|f| f.zero_clamped).into(),
            ]);
            // Named bits, highest first
            row.extend((0..5).rev().map(|k| Value::from(flags.map(|f| f.span[k]))));
            row.extend((0..5).rev().map(|k| Value::from(flags.map(|f| f.zero[k]))));
            let met = engineering.meteorology.as_ref().map(Meteorology::values);
            row.extend((0..Meteorology::FIELDS.len()).map(|i| Value::from(met.map(|m| m[i]))));
            self.engineering.push(row);
        }

        for cycle in &frame.cycles {
            self.push_cycle(ident(), cycle);
        }

        if let Some(ctd) = &frame.ctd {
            let mut row: Vec<Value> = ident().into_iter().collect();
            row.extend([
                Value::category(Some(ctd.schema.as_str())),
                Value::Int(Some(ctd.field_count as i64)),
                Some(ctd.raw.as_str()).into(),
            ]);
            for (name, _) in &CTD_SCHEMA[CTD_LEAD.len()..] {
                row.push(ctd.value(name).into());
            }
            self.ctd.push(row);
        }

        if let Some(ph) = &frame.ph {
            let offsets = ph
                .delimiter_offsets
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join(",");
            for (index, segment) in ph.segments.iter().enumerate() {
                self.ph.push(
                    ident()
                        .into_iter()
                        .chain([
                            Value::category(Some(ph.variant.as_str())),
                            ph.header.as_ref().map(|h| h.kind.as_str()).into(),
                            ph.header
                                .as_ref()
                                .and_then(|h| h.count)
                                .map(|c| c as i64)
                                .into(),
                            Value::Int(Some(ph.lines.len() as i64)),
                            Value::UInt(Some(index as u32)),
                            Some(segment.as_str()).into(),
                            Some(ph.payload.as_str()).into(),
                            Some(offsets.as_str()).into(),
                        ])
                        .collect(),
                );
            }
        }

        if let Some(met) = &frame.met {
            for value in &met.values {
                self.met.push(
                    ident()
                        .into_iter()
                        .chain([
                            Value::from(value.line),
                            Value::from(value.field),
                            Value::from(value.value),
                        ])
                        .collect(),
                );
            }
        }
    }

    fn push_cycle(&mut self, ident: [Value; 2], cycle: &CycleRecord) {
        let mut row: Vec<Value> = ident.into_iter().collect();
        row.push(Value::category(Some(cycle.cycle.canonical())));
        row.push(cycle.sample.into());
        row.extend(cycle.values().into_iter().map(Value::from));
        self.cycles.push(row);
    }

    /// Build the row sets, the side log included
    pub fn finish(self, side_log: &SideLog) -> PolarsResult<NormalizedRowSets> {
        debug!(
            "Normalizing {} frames ({} cycle rows, {} side-log entries)",
            self.header.len(),
            self.cycles.len(),
            side_log.len()
        );
        Ok(NormalizedRowSets {
            header: self.header.finish()?,
            gps: self.gps.finish()?,
            engineering: self.engineering.finish()?,
            cycles: self.cycles.finish()?,
            ctd: self.ctd.finish()?,
            ph: self.ph.finish()?,
            met: self.met.finish()?,
            side_log: side_log_frame(side_log)?,
        })
    }
}

/// Export the side log as a row set
pub fn side_log_frame(side_log: &SideLog) -> PolarsResult<DataFrame> {
    // The side log has no float columns, so the sentinel never applies
    let mut builder = RowSetBuilder::new(row_sets::SIDE_LOG, SIDE_LOG_SCHEMA, f64::NAN);
    for entry in side_log.entries() {
        builder.push(vec![
            Value::Int(entry.frame_index.map(|i| i as i64)),
            Value::Int(entry.line.map(|l| l as i64)),
            entry.frame_key.as_ref().map(|k| k.as_str()).into(),
            Value::category(Some(entry.kind.as_str())),
            Value::category(entry.cycle.map(|c| c.canonical())),
            Some(entry.field.as_str()).into(),
            Some(entry.reason.as_str()).into(),
        ]);
    }
    builder.finish()
}

/// Null every occurrence of the sentinel in the Float64 columns
///
/// Applying it to an already normalized frame returns the frame unchanged.
pub fn normalize_frame(df: &DataFrame, sentinel: f64) -> PolarsResult<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            if column.dtype() != &DataType::Float64 {
                return Ok(column.clone());
            }
            let cleaned: Float64Chunked = column
                .as_materialized_series()
                .f64()?
                .iter()
                .map(|value| value.filter(|v| *v != sentinel))
                .collect();
            Ok(cleaned
                .with_name(column.name().clone())
                .into_series()
                .into_column())
        })
        .collect::<PolarsResult<Vec<Column>>>()?;
    DataFrame::new(columns)
}

/// Concatenate same-schema row sets from several streams in order
pub fn concat_row_sets(parts: Vec<NormalizedRowSets>) -> PolarsResult<Option<NormalizedRowSets>> {
    let mut parts = parts.into_iter();
    let Some(mut combined) = parts.next() else {
        return Ok(None);
    };
    for part in parts {
        combined.header.vstack_mut(&part.header)?;
        combined.gps.vstack_mut(&part.gps)?;
        combined.engineering.vstack_mut(&part.engineering)?;
        combined.cycles.vstack_mut(&part.cycles)?;
        combined.ctd.vstack_mut(&part.ctd)?;
        combined.ph.vstack_mut(&part.ph)?;
        combined.met.vstack_mut(&part.met)?;
        combined.side_log.vstack_mut(&part.side_log)?;
    }
    Ok(Some(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CycleId, Dialect, FrameKey};
    use crate::provenance::{IssueKind, ProvenanceEntry};
    use chrono::NaiveDate;

    fn series<'a>(df: &'a DataFrame, name: &str) -> &'a Series {
        df.column(name).unwrap().as_materialized_series()
    }

    fn frame_with_cycle(xco2: Option<f64>) -> Frame {
        let mut frame = Frame::repeat(0, 0, 3, Dialect::Summary);
        frame.repeat = false;
        frame.degraded = false;
        let time = NaiveDate::from_ymd_opt(2017, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        frame.key = Some(FrameKey::new("3", time, true));
        let mut values = [None; 17];
        values[5] = xco2;
        frame.cycles.push(CycleRecord::from_values(CycleId::ZeroPumpOn, 0, values));
        frame
    }

    #[test]
    fn test_schemas_are_fixed_for_empty_streams() {
        let row_sets = StreamNormalizer::new(-999.0)
            .finish(&SideLog::new())
            .unwrap();
        assert_eq!(row_sets.total_rows(), 0);
        assert_eq!(row_sets.header.width(), HEADER_SCHEMA.len());
        assert_eq!(row_sets.ctd.width(), 60);
        assert!(matches!(
            row_sets.cycles.column("cycle").unwrap().dtype(),
            DataType::Categorical(..)
        ));
        assert_eq!(
            row_sets.header.column("authoritative_time").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Nanoseconds, None)
        );
    }

    #[test]
    fn test_sentinel_is_nulled_on_push() {
        let mut normalizer = StreamNormalizer::new(-999.0);
        normalizer.push_frame(&frame_with_cycle(Some(-999.0)));
        normalizer.push_frame(&frame_with_cycle(Some(400.5)));
        let row_sets = normalizer.finish(&SideLog::new()).unwrap();

        let xco2 = series(&row_sets.cycles, "xco2").f64().unwrap().clone();
        assert_eq!(xco2.get(0), None);
        assert_eq!(xco2.get(1), Some(400.5));
        assert_eq!(row_sets.header.height(), 2);
        let keys = series(&row_sets.cycles, "frame_key").str().unwrap().clone();
        assert_eq!(keys.get(0), Some("3_2017-05-01T12:00:00Z"));
    }

    #[test]
    fn test_repeat_frame_yields_header_only() {
        let mut normalizer = StreamNormalizer::new(-999.0);
        normalizer.push_frame(&Frame::repeat(4, 10, 11, Dialect::Flash));
        let row_sets = normalizer.finish(&SideLog::new()).unwrap();
        assert_eq!(row_sets.header.height(), 1);
        assert_eq!(row_sets.total_rows(), 1);
        let repeat = series(&row_sets.header, "repeat").bool().unwrap().clone();
        assert_eq!(repeat.get(0), Some(true));
        assert_eq!(row_sets.header.column("frame_key").unwrap().null_count(), 1);
    }

    #[test]
    fn test_normalize_frame_is_idempotent() {
        let df = DataFrame::new(vec![
            Column::new("frame_key".into(), ["a", "b", "c"]),
            Column::new("xco2".into(), [Some(398.1), Some(-999.0), None]),
            Column::new("count".into(), [1i64, -999, 3]),
        ])
        .unwrap();

        let once = normalize_frame(&df, -999.0).unwrap();
        let twice = normalize_frame(&once, -999.0).unwrap();
        assert!(once.equals_missing(&twice));
        assert_eq!(once.column("xco2").unwrap().null_count(), 2);
        // Only float columns are touched
        assert_eq!(once.column("count").unwrap().null_count(), 0);
    }

    #[test]
    fn test_side_log_row_set() {
        let mut log = SideLog::new();
        log.push(ProvenanceEntry {
            frame_index: Some(2),
            line: Some(14),
            frame_key: None,
            kind: IssueKind::FieldUnparseable,
            cycle: Some(CycleId::SpanPumpOff),
            field: "xco2".to_string(),
            reason: "'x' is not a number".to_string(),
        });
        let df = side_log_frame(&log).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), SIDE_LOG_SCHEMA.len());
        let field = series(&df, "field").str().unwrap().clone();
        assert_eq!(field.get(0), Some("xco2"));
    }

    #[test]
    fn test_concat_row_sets_keeps_order() {
        let build = |xco2| {
            let mut normalizer = StreamNormalizer::new(-999.0);
            normalizer.push_frame(&frame_with_cycle(Some(xco2)));
            normalizer.finish(&SideLog::new()).unwrap()
        };
        let combined = concat_row_sets(vec![build(1.0), build(2.0)]).unwrap().unwrap();
        let xco2 = series(&combined.cycles, "xco2").f64().unwrap().clone();
        assert_eq!(xco2.get(0), Some(1.0));
        assert_eq!(xco2.get(1), Some(2.0));
        assert!(concat_row_sets(Vec::new()).unwrap().is_none());
    }
}
