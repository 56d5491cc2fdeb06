//! Batch processing of telemetry files.
//!
//! Orchestrates discovery, concurrent per-file parsing and Parquet output
//! of the normalized row sets, reporting progress and a summary on the
//! terminal.

pub mod discovery;
pub mod streaming;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{
    discovery::FileDiscovery,
    streaming::{FileOutcome, StreamingProcessor},
    writer::{ParquetWriter, record_rows},
};

use crate::config::{ProcessorConfig, SystemProfile};
use crate::error::Result;
use crate::models::{ParseStats, ProcessingStats};
use crate::normalizer::NormalizedRowSets;

use colored::*;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Processor for a batch of telemetry inputs
#[derive(Debug)]
pub struct BatchProcessor {
    inputs: Vec<String>,
    output_path: PathBuf,
    config: ProcessorConfig,
    cancel: CancellationToken,
}

impl BatchProcessor {
    /// Create a processor over files, directories or glob patterns
    pub fn new(inputs: Vec<String>, output_path: PathBuf) -> Self {
        Self {
            inputs,
            output_path,
            config: ProcessorConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Configure the processor
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Main processing entry point
    pub async fn process(&mut self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        self.config.validate()?;

        println!("{}", "Starting MAPCO2 telemetry processing".bright_green().bold());
        println!("  {} {}", "Inputs:".bright_cyan(), self.inputs.join(", "));
        println!("  {} {}", "Output:".bright_cyan(), self.output_path.display());
        let profile = SystemProfile::detect();
        debug!(
            "System: {} cores, {} MB memory",
            profile.cpu_cores, profile.memory_mb
        );

        println!("\n{}", "Discovering telemetry files...".bright_yellow());
        let mut discovery = FileDiscovery::new(self.inputs.clone());
        let files = discovery.discover_files().await?;
        println!(
            "  {} {} telemetry files ({} skipped)",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold(),
            discovery.skipped()
        );

        if files.is_empty() {
            return Ok(ProcessingStats {
                output_path: self.output_path.clone(),
                processing_time_ms: start_time.elapsed().as_millis(),
                ..Default::default()
            });
        }

        println!("\n{}", "Parsing files...".bright_yellow());
        let streaming = StreamingProcessor::new(self.config.clone(), self.cancel.clone());
        let (outcomes, mut stats) = streaming.process_files(&files, &self.output_path).await?;

        let parts: Vec<NormalizedRowSets> = outcomes
            .into_iter()
            .map(|FileOutcome { outcome, .. }| outcome.row_sets)
            .collect();

        if self.config.summary_only {
            stats.total_rows = parts.iter().map(NormalizedRowSets::total_rows).sum();
            println!("\n{}", "Summary mode - no output written".bright_green());
        } else {
            println!("\n{}", "Writing Parquet output...".bright_yellow());
            let writer = ParquetWriter::new(self.output_path.clone(), self.config.clone());
            let written = writer.write_row_sets(&parts).await?;
            stats.total_rows = record_rows(&written);
        }

        let total_time = start_time.elapsed().as_millis();
        report(&stats, total_time);

        Ok(ProcessingStats {
            processing_time_ms: total_time,
            ..stats
        })
    }
}

fn report(stats: &ProcessingStats, total_time: u128) {
    let parse: &ParseStats = &stats.parse;

    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        total_time.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} ({} degraded, {} truncated, {} repeat, {} rejected)",
        "Frames:".bright_cyan(),
        parse.frames_total.to_string().bright_white().bold(),
        parse.frames_degraded,
        parse.frames_truncated,
        parse.frames_repeat,
        parse.frames_rejected
    );
    println!(
        "  {} {:.1}%",
        "Clean frames:".bright_cyan(),
        parse.clean_rate()
    );
    println!(
        "  {} {}",
        "Total rows:".bright_cyan(),
        stats.total_rows.to_string().bright_white().bold()
    );
    for (kind, count) in &parse.issue_counts {
        println!("    {} {}", format!("{}:", kind).yellow(), count);
    }
    if parse.cancelled {
        println!("  {}", "Cancelled before completion".bright_red().bold());
    }
}
