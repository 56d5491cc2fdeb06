//! Command-line interface components.

use crate::config::{CompressionAlgorithm, ParserConfig, ProcessorConfig, TransportHint};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mapco2")]
#[command(about = "Parse MAPCO2 moored CO2 telemetry into normalized Parquet row sets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Telemetry files, directories (walked recursively) or glob patterns
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,

    /// Output directory for Parquet files
    #[arg(short, long, default_value = "parquet")]
    pub output: PathBuf,

    /// Transport dialect (auto, summary, flash)
    #[arg(long, default_value = "auto")]
    pub transport: String,

    /// Comma-separated mode tags that open a frame
    #[arg(long, value_delimiter = ',')]
    pub mode_tags: Option<Vec<String>>,

    /// Numeric value replaced with null
    #[arg(long, allow_negative_numbers = true)]
    pub sentinel: Option<f64>,

    /// Keep the exact authoritative time in frame keys
    #[arg(long)]
    pub no_half_hour_rounding: bool,

    /// Reject frames with unparseable fields and fail on mixed dialects
    #[arg(long)]
    pub strict: bool,

    /// Literal line marking a duplicate transmission
    #[arg(long)]
    pub repeat_marker: Option<String>,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long, default_value = "snappy")]
    pub compression: String,

    /// Number of files parsed concurrently (defaults to the CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Report statistics without writing Parquet output
    #[arg(long)]
    pub summary_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parser options selected on the command line
    pub fn parser_config(&self) -> Result<ParserConfig> {
        let mut config =
            ParserConfig::default().with_transport(self.transport.parse::<TransportHint>()?);
        if let Some(tags) = &self.mode_tags {
            config = config.with_mode_tags(tags.iter().map(|t| t.trim().to_string()));
        }
        if let Some(sentinel) = self.sentinel {
            config = config.with_sentinel(sentinel);
        }
        if self.no_half_hour_rounding {
            config = config.without_half_hour_rounding();
        }
        if self.strict {
            config = config.with_strict();
        }
        if let Some(marker) = &self.repeat_marker {
            config = config.with_repeat_marker(marker.as_str());
        }
        config.validate()?;
        Ok(config)
    }

    /// Full processor configuration
    pub fn processor_config(&self) -> Result<ProcessorConfig> {
        let mut config = ProcessorConfig::default()
            .with_parser(self.parser_config()?)
            .with_compression(self.compression.parse::<CompressionAlgorithm>()?);
        if let Some(workers) = self.workers {
            config = config.with_max_concurrent_files(workers);
        }
        if self.summary_only {
            config = config.with_summary_only();
        }
        config.validate()?;
        Ok(config)
    }
}
