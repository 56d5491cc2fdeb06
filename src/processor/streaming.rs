//! Concurrent parsing of telemetry files
//!
//! Each file gets its own `StreamParser` on the blocking pool. Results are
//! yielded in input order, concurrency is halved under memory pressure and
//! a shared cancellation token stops both the scheduling of new files and
//! the frame loop of files already running.

use crate::config::ProcessorConfig;
use crate::error::{Co2Error, Result};
use crate::models::ProcessingStats;
use crate::parser::{ParseOutcome, StreamParser};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::Mutex;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Parse result for one input file
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: ParseOutcome,
}

/// Streaming processor for telemetry files
#[derive(Debug)]
pub struct StreamingProcessor {
    config: ProcessorConfig,
    cancel: CancellationToken,
    system_monitor: Arc<Mutex<System>>,
}

impl StreamingProcessor {
    pub fn new(config: ProcessorConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            system_monitor: Arc::new(Mutex::new(System::new())),
        }
    }

    /// Check if system is under memory pressure
    pub async fn check_memory_pressure(&self) -> bool {
        let mut system = self.system_monitor.lock().await;
        system.refresh_memory();

        let used_memory = system.used_memory() as f64;
        let total_memory = system.total_memory() as f64;

        if total_memory == 0.0 {
            return false;
        }

        let memory_usage = used_memory / total_memory;
        let is_pressure = memory_usage > self.config.memory_threshold;

        if is_pressure {
            debug!(
                "Memory pressure detected: {:.1}% usage (threshold: {:.1}%)",
                memory_usage * 100.0,
                self.config.memory_threshold * 100.0
            );
        }

        is_pressure
    }

    /// Parse every file, keeping discovery order in the returned outcomes
    pub async fn process_files(
        &self,
        files: &[PathBuf],
        output_path: &Path,
    ) -> Result<(Vec<FileOutcome>, ProcessingStats)> {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .map_err(|e| Co2Error::configuration(format!("Invalid progress template: {}", e)))?
                .progress_chars("#>-"),
        );
        pb.set_message("Parsing files");

        let mut concurrent_limit = self.config.max_concurrent_files.min(files.len()).max(1);
        if self.check_memory_pressure().await {
            concurrent_limit = (concurrent_limit / 2).max(1);
            debug!(
                "Memory pressure detected, reducing concurrency to {}",
                concurrent_limit
            );
        }

        let (outcomes, processed, failed) = stream::iter(files)
            .map(|file_path| {
                let pb = pb.clone();
                async move {
                    if self.cancel.is_cancelled() {
                        return None;
                    }
                    if let Some(file_name) = file_path.file_name() {
                        pb.set_message(format!("Parsing: {}", file_name.to_string_lossy()));
                    }

                    let result = self.process_single_file(file_path).await;
                    pb.inc(1);

                    match &result {
                        Ok(outcome) => debug!(
                            "Parsed {}: {} frames",
                            file_path.display(),
                            outcome.stats.frames_total
                        ),
                        Err(e) => error!("Failed to parse {}: {:#}", file_path.display(), e),
                    }
                    Some(result.map(|outcome| FileOutcome {
                        path: file_path.clone(),
                        outcome,
                    }))
                }
            })
            .buffered(concurrent_limit)
            .fold(
                (Vec::new(), 0usize, 0usize),
                |(mut outcomes, processed, failed), result| async move {
                    match result {
                        Some(Ok(outcome)) => {
                            outcomes.push(outcome);
                            (outcomes, processed + 1, failed)
                        }
                        Some(Err(_)) => (outcomes, processed, failed + 1),
                        None => (outcomes, processed, failed),
                    }
                },
            )
            .await;

        let mut stats = ProcessingStats {
            files_processed: processed,
            files_failed: failed,
            total_rows: 0,
            output_path: output_path.to_path_buf(),
            processing_time_ms: 0,
            parse: Default::default(),
        };
        for file in &outcomes {
            stats.parse.merge(&file.outcome.stats);
        }
        if self.cancel.is_cancelled() {
            stats.parse.cancelled = true;
            pb.abandon_with_message("Cancelled");
            warn!(
                "Cancelled after {} of {} files",
                processed + failed,
                files.len()
            );
        } else {
            pb.finish_with_message("All telemetry files parsed");
        }

        Ok((outcomes, stats))
    }

    /// Parse one file on the blocking pool
    pub async fn process_single_file(&self, file_path: &Path) -> Result<ParseOutcome> {
        let parser =
            StreamParser::new(self.config.parser.clone()).with_cancellation(self.cancel.clone());

        task::spawn_blocking({
            let file_path = file_path.to_owned();
            move || parser.parse_path(&file_path)
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                Co2Error::cancelled(format!("parser task for {} aborted", file_path.display()))
            } else {
                Co2Error::processing_failed(file_path, format!("Parser task failed: {}", e))
            }
        })?
    }
}
