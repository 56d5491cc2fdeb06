//! Multi-stream processing integration tests

use super::SUMMARY_FRAME;
use crate::config::ProcessorConfig;
use crate::constants::{get_output_filename, row_sets};
use crate::processor::BatchProcessor;
use polars::prelude::{DataFrame, ParquetReader, SerReader};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Helper to create telemetry from several systems across nested directories
fn create_multi_stream_inputs(temp_dir: &TempDir) -> PathBuf {
    let root = temp_dir.path().join("deployments");
    for (system, hour) in [("3", "12"), ("7", "13"), ("12", "14")] {
        let dir = root.join(format!("system_{}", system));
        fs::create_dir_all(&dir).unwrap();
        let frame = SUMMARY_FRAME
            .replace(" STN07 3 ", &format!(" STN07 {} ", system))
            .replace("05/01/2017 12:00:05", &format!("05/01/2017 {}:00:05", hour));
        fs::write(dir.join("stream.txt"), format!("{}\n{}", frame, frame)).unwrap();
    }
    root
}

fn read_row_set(output_dir: &Path, name: &str) -> DataFrame {
    let file = fs::File::open(output_dir.join(get_output_filename(name))).unwrap();
    ParquetReader::new(file).finish().unwrap()
}

fn column_strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_multi_stream_processing() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_multi_stream_inputs(&temp_dir);
    let output_dir = temp_dir.path().join("output");

    let mut processor =
        BatchProcessor::new(vec![root.to_string_lossy().to_string()], output_dir.clone())
            .with_config(ProcessorConfig::default().with_max_concurrent_files(3));
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.parse.frames_total, 6);
    assert_eq!(stats.parse.cycle_rows, 60);

    let header = read_row_set(&output_dir, row_sets::HEADER);
    assert_eq!(header.height(), 6);
    // Directory walk order is by name: system_12, system_3, system_7
    let systems = column_strings(&header, "system");
    let expected: Vec<Option<String>> = ["12", "12", "3", "3", "7", "7"]
        .iter()
        .map(|s| Some(s.to_string()))
        .collect();
    assert_eq!(systems, expected);

    let keys = column_strings(&header, "frame_key");
    assert_eq!(keys[0].as_deref(), Some("12_2017-05-01T14:00:00Z"));
    assert_eq!(keys[2].as_deref(), Some("3_2017-05-01T12:00:00Z"));
}

#[tokio::test]
async fn test_records_share_frame_keys() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_multi_stream_inputs(&temp_dir);
    let output_dir = temp_dir.path().join("output");

    let mut processor =
        BatchProcessor::new(vec![root.to_string_lossy().to_string()], output_dir.clone());
    processor.process().await.unwrap();

    let header_keys = column_strings(&read_row_set(&output_dir, row_sets::HEADER), "frame_key");
    for name in [row_sets::GPS, row_sets::ENGINEERING, row_sets::CYCLES] {
        let keys = column_strings(&read_row_set(&output_dir, name), "frame_key");
        for key in keys {
            assert!(header_keys.contains(&key), "{} key {:?} not in header", name, key);
        }
    }
}

#[tokio::test]
async fn test_glob_inputs() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_multi_stream_inputs(&temp_dir);
    let output_dir = temp_dir.path().join("output");

    let pattern = format!("{}/system_[37]/*.txt", root.display());
    let mut processor = BatchProcessor::new(vec![pattern], output_dir);
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 2);
    assert_eq!(stats.parse.frames_total, 4);
}

#[tokio::test]
async fn test_cancelled_batch() {
    let temp_dir = TempDir::new().unwrap();
    let root = create_multi_stream_inputs(&temp_dir);
    let output_dir = temp_dir.path().join("output");

    let token = CancellationToken::new();
    token.cancel();
    let mut processor =
        BatchProcessor::new(vec![root.to_string_lossy().to_string()], output_dir.clone())
            .with_cancellation(token);
    let stats = processor.process().await.unwrap();

    assert!(stats.parse.cancelled);
    assert_eq!(stats.files_processed, 0);
    assert!(!output_dir.exists());
}
