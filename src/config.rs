//! Configuration management and validation.
//!
//! Provides the parser options recognized by the telemetry core and the
//! batch settings used when many streams are processed concurrently.

use crate::constants::{DEFAULT_MODE_TAGS, DEFAULT_REPEAT_MARKER, DEFAULT_SENTINEL};
use crate::error::{Co2Error, Result};
use crate::models::Dialect;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the parser should interpret the transport of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportHint {
    /// Detect from the presence of flash delimiters
    #[default]
    Auto,
    /// Force summary interpretation
    Summary,
    /// Force flash interpretation
    Flash,
}

impl TransportHint {
    /// The dialect this hint forces, if any
    pub fn forced_dialect(&self) -> Option<Dialect> {
        match self {
            TransportHint::Auto => None,
            TransportHint::Summary => Some(Dialect::Summary),
            TransportHint::Flash => Some(Dialect::Flash),
        }
    }
}

impl std::str::FromStr for TransportHint {
    type Err = Co2Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(TransportHint::Auto),
            "summary" | "iridium" => Ok(TransportHint::Summary),
            "flash" => Ok(TransportHint::Flash),
            other => Err(Co2Error::configuration(format!(
                "unknown transport '{}' (expected auto, summary or flash)",
                other
            ))),
        }
    }
}

/// Options recognized by the telemetry parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Forces summary or flash interpretation
    pub transport: TransportHint,

    /// Mode tags that open a frame
    pub mode_tags: Vec<String>,

    /// Numeric value replaced with null during normalization
    pub sentinel: f64,

    /// Floor the frame key timestamp to the 30-minute boundary
    pub half_hour_rounding: bool,

    /// Reject frames with field failures instead of degrading them
    pub strict: bool,

    /// Literal line marking a duplicate transmission
    pub repeat_marker: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            transport: TransportHint::Auto,
            mode_tags: DEFAULT_MODE_TAGS.iter().map(|s| s.to_string()).collect(),
            sentinel: DEFAULT_SENTINEL,
            half_hour_rounding: true,
            strict: false,
            repeat_marker: DEFAULT_REPEAT_MARKER.to_string(),
        }
    }
}

impl ParserConfig {
    /// Force a transport interpretation
    pub fn with_transport(mut self, transport: TransportHint) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the accepted mode tags
    pub fn with_mode_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mode_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sentinel null value
    pub fn with_sentinel(mut self, sentinel: f64) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Disable half-hour flooring of the frame key
    pub fn without_half_hour_rounding(mut self) -> Self {
        self.half_hour_rounding = false;
        self
    }

    /// Enable strict mode
    pub fn with_strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set the repeat marker line
    pub fn with_repeat_marker(mut self, marker: impl Into<String>) -> Self {
        self.repeat_marker = marker.into();
        self
    }

    /// Check whether a line opens a frame
    pub fn is_mode_tag(&self, line: &str) -> bool {
        match line.get(..4) {
            Some(prefix) => self.mode_tags.iter().any(|tag| tag == prefix),
            None => false,
        }
    }

    /// Check the options for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.mode_tags.is_empty() {
            return Err(Co2Error::configuration("at least one mode tag is required"));
        }
        if let Some(tag) = self.mode_tags.iter().find(|t| t.chars().count() != 4) {
            return Err(Co2Error::configuration(format!(
                "mode tag '{}' must be exactly four characters",
                tag
            )));
        }
        if self.repeat_marker.trim().is_empty() {
            return Err(Co2Error::configuration("repeat marker must not be blank"));
        }
        if self.sentinel.is_nan() {
            return Err(Co2Error::configuration("sentinel must be a number"));
        }
        debug!(
            "Parser config: transport={:?}, {} mode tags, sentinel={}, strict={}",
            self.transport,
            self.mode_tags.len(),
            self.sentinel,
            self.strict
        );
        Ok(())
    }
}

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

impl std::str::FromStr for CompressionAlgorithm {
    type Err = Co2Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "none" | "uncompressed" => Ok(CompressionAlgorithm::Uncompressed),
            other => Err(Co2Error::configuration(format!(
                "unknown compression '{}' (expected snappy, zstd, lz4 or none)",
                other
            ))),
        }
    }
}

/// System profiling information used to size the batch driver
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of CPU cores available
    pub cpu_cores: usize,
    /// Available memory in MB
    pub memory_mb: usize,
}

impl SystemProfile {
    /// Auto-detect system capabilities
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut system = System::new();
        system.refresh_memory();

        Self {
            cpu_cores: num_cpus::get(),
            memory_mb: (system.total_memory() / 1024 / 1024) as usize,
        }
    }
}

/// Settings for processing many telemetry files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Options passed to every stream parser
    pub parser: ParserConfig,

    /// Maximum concurrent file parsing
    pub max_concurrent_files: usize,

    /// Fraction of memory in use above which concurrency is halved
    pub memory_threshold: f64,

    /// Compression algorithm for Parquet output
    pub compression: CompressionAlgorithm,

    /// Enable column statistics in Parquet output
    pub enable_statistics: bool,

    /// Only report statistics, do not write row sets
    pub summary_only: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            max_concurrent_files: num_cpus::get().max(1),
            memory_threshold: 0.8,
            compression: CompressionAlgorithm::Snappy,
            enable_statistics: true,
            summary_only: false,
        }
    }
}

impl ProcessorConfig {
    /// Use the given parser options
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    /// Set maximum concurrent files
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files.max(1);
        self
    }

    /// Set the Parquet compression algorithm
    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    /// Report statistics only
    pub fn with_summary_only(mut self) -> Self {
        self.summary_only = true;
        self
    }

    /// Check the options for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.parser.validate()?;
        if !(0.0..=1.0).contains(&self.memory_threshold) {
            return Err(Co2Error::configuration(format!(
                "memory threshold {} must be between 0 and 1",
                self.memory_threshold
            )));
        }
        Ok(())
    }
}
