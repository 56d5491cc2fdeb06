//! Parquet output of normalized row sets
//!
//! Each row set is concatenated across files in input order and written to
//! its own file in the output directory, the side log included.

use crate::config::ProcessorConfig;
use crate::constants::{get_output_filename, row_sets};
use crate::error::{Co2Error, Result};
use crate::normalizer::NormalizedRowSets;

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::{
    DataFrame, IntoLazy, LazyFrame, ParquetWriter as PolarsParquetWriter, StatisticsOptions,
    UnionArgs, concat,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Rows written to one Parquet file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRowSet {
    pub name: &'static str,
    pub path: PathBuf,
    pub rows: usize,
}

/// Parquet writer for the row sets of a batch
#[derive(Debug)]
pub struct ParquetWriter {
    output_dir: PathBuf,
    config: ProcessorConfig,
}

impl ParquetWriter {
    pub fn new(output_dir: PathBuf, config: ProcessorConfig) -> Self {
        Self { output_dir, config }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Concatenate the per-file row sets and write one file per row set
    pub async fn write_row_sets(&self, parts: &[NormalizedRowSets]) -> Result<Vec<WrittenRowSet>> {
        if parts.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.output_dir).await?;

        let progress_bar = ProgressBar::new(8);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")
                .map_err(|e| Co2Error::configuration(format!("Invalid progress template: {}", e)))?,
        );

        let mut written = Vec::new();
        for (index, (name, _)) in parts[0].named().into_iter().enumerate() {
            progress_bar.set_message(format!("Writing {}", name));

            let frames: Vec<LazyFrame> = parts
                .iter()
                .map(|part| part.named()[index].1.clone().lazy())
                .collect();
            let path = self.output_dir.join(get_output_filename(name));

            let df = tokio::task::spawn_blocking(move || {
                concat(frames, UnionArgs::default())?.collect()
            })
            .await
            .map_err(|e| Co2Error::ProcessingFailed {
                path: path.clone(),
                reason: format!("Failed to spawn concatenation task: {}", e),
            })??;

            let rows = df.height();
            self.write_dataframe(df, &path)?;
            debug!("Wrote {} rows to {}", rows, path.display());

            written.push(WrittenRowSet { name, path, rows });
            progress_bar.inc(1);
        }
        progress_bar.finish_with_message("Parquet output written");

        Ok(written)
    }

    /// Write one DataFrame with the configured compression and statistics
    fn write_dataframe(&self, mut df: DataFrame, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let statistics = if self.config.enable_statistics {
            StatisticsOptions::full()
        } else {
            StatisticsOptions::empty()
        };

        PolarsParquetWriter::new(file)
            .with_compression(self.config.compression.to_polars_compression())
            .with_statistics(statistics)
            .finish(&mut df)
            .map_err(|e| Co2Error::ProcessingFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write parquet: {}", e),
            })?;

        Ok(())
    }
}

/// Rows written across the record row sets, side log excluded
pub fn record_rows(written: &[WrittenRowSet]) -> usize {
    written
        .iter()
        .filter(|w| w.name != row_sets::SIDE_LOG)
        .map(|w| w.rows)
        .sum()
}
