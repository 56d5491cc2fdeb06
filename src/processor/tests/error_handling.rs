//! Error handling integration tests

use super::SUMMARY_FRAME;
use crate::config::{ParserConfig, ProcessorConfig};
use crate::error::Co2Error;
use crate::processor::BatchProcessor;
use crate::provenance::IssueKind;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_nonexistent_input() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nonexistent");

    let mut processor = BatchProcessor::new(
        vec![missing.to_string_lossy().to_string()],
        temp_dir.path().join("output"),
    );
    let result = processor.process().await;

    match result {
        Err(Co2Error::InputNotFound { path }) => assert_eq!(path, missing),
        other => panic!("Expected InputNotFound error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let parser = ParserConfig::default().with_mode_tags(Vec::<String>::new());

    let mut processor = BatchProcessor::new(
        vec![temp_dir.path().to_string_lossy().to_string()],
        temp_dir.path().join("output"),
    )
    .with_config(ProcessorConfig::default().with_parser(parser));

    assert!(matches!(
        processor.process().await,
        Err(Co2Error::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_garbage_file_yields_no_frames() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("noise.txt");
    fs::write(&input, "This is not telemetry\n\u{0}\u{0}\u{0}\nstill not\n").unwrap();

    let mut processor = BatchProcessor::new(
        vec![input.to_string_lossy().to_string()],
        temp_dir.path().join("output"),
    );
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.parse.frames_total, 0);
    assert_eq!(stats.parse.orphan_lines, 2);
    assert_eq!(stats.total_rows, 0);
}

#[tokio::test]
async fn test_invalid_utf8_is_tolerated() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("corrupt.txt");
    let mut bytes = SUMMARY_FRAME.as_bytes().to_vec();
    bytes.extend_from_slice(b"\xff\xfe garbage\n");
    fs::write(&input, bytes).unwrap();

    let mut processor = BatchProcessor::new(
        vec![input.to_string_lossy().to_string()],
        temp_dir.path().join("output"),
    );
    let stats = processor.process().await.unwrap();

    assert_eq!(stats.parse.encoding_errors, 1);
    assert_eq!(stats.parse.frames_total, 1);
    assert_eq!(stats.parse.cycle_rows, 10);
}

#[tokio::test]
async fn test_strict_mixed_dialect_counts_file_as_failed() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("mixed.txt");
    let flash = "NORM A1B2 512 2017/05/01 12:10:00 STN07 3 2.1_01/01/2015\n\
        05/01/2017 12:00:05 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07 0\n\
        13.2 12.9 0.987 1.013 0000 28.51 0.02 5.12 0.01 35.1 0.03 -12.5 3.1 8.2 2.9 181 175 7.4\n\
        ***** Zero_on 0\nLicor 1\n35.1 101.3 398.7 2900 2950\nO2 1\n20.9\nRH 1\n85\nRHT 1\n22\n";
    fs::write(&input, format!("{}{}", flash, SUMMARY_FRAME)).unwrap();

    let strict = ProcessorConfig::default().with_parser(ParserConfig::default().with_strict());
    let mut processor = BatchProcessor::new(
        vec![input.to_string_lossy().to_string()],
        temp_dir.path().join("strict"),
    )
    .with_config(strict);
    let stats = processor.process().await.unwrap();
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.files_processed, 0);

    let mut processor = BatchProcessor::new(
        vec![input.to_string_lossy().to_string()],
        temp_dir.path().join("lenient"),
    );
    let stats = processor.process().await.unwrap();
    assert_eq!(stats.files_processed, 1);
    assert_eq!(
        stats.parse.issue_counts.get(&IssueKind::InconsistentDialect),
        Some(&1)
    );
}
