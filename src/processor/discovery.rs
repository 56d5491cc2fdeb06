//! Input discovery for telemetry batches
//!
//! Resolves each input argument to a list of telemetry files. An argument
//! may name a file, a directory (walked recursively) or a glob pattern.
//! Files are returned in a stable order so that output rows follow the
//! order in which inputs were given.

use crate::error::{Co2Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File discovery component for telemetry inputs
#[derive(Debug)]
pub struct FileDiscovery {
    inputs: Vec<String>,
    skipped: usize,
}

impl FileDiscovery {
    pub fn new(inputs: Vec<String>) -> Self {
        Self { inputs, skipped: 0 }
    }

    /// Files passed over during the last discovery (hidden or Parquet output)
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Resolve every input to telemetry files, deduplicated in input order
    pub async fn discover_files(&mut self) -> Result<Vec<PathBuf>> {
        let inputs = self.inputs.clone();
        let (files, skipped) = task::spawn_blocking(move || resolve_all(&inputs))
            .await
            .map_err(|e| Co2Error::ProcessingFailed {
                path: PathBuf::new(),
                reason: format!("Failed to run discovery task: {}", e),
            })??;

        self.skipped = skipped;
        debug!(
            "Discovered {} telemetry files ({} skipped)",
            files.len(),
            skipped
        );
        Ok(files)
    }
}

fn resolve_all(inputs: &[String]) -> Result<(Vec<PathBuf>, usize)> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut skipped = 0;

    for input in inputs {
        let (found, passed_over) = resolve_input(input)?;
        skipped += passed_over;
        for file in found {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    Ok((files, skipped))
}

fn resolve_input(input: &str) -> Result<(Vec<PathBuf>, usize)> {
    let path = Path::new(input);

    if path.is_file() {
        return Ok((vec![path.to_path_buf()], 0));
    }

    if path.is_dir() {
        return walk_directory(path);
    }

    if is_glob_pattern(input) {
        return expand_glob(input);
    }

    Err(Co2Error::InputNotFound {
        path: path.to_path_buf(),
    })
}

fn walk_directory(root: &Path) -> Result<(Vec<PathBuf>, usize)> {
    debug!("Walking {}", root.display());
    let mut files = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if is_telemetry_file(entry.path()) {
            files.push(entry.into_path());
        } else {
            skipped += 1;
        }
    }

    Ok((files, skipped))
}

fn expand_glob(pattern: &str) -> Result<(Vec<PathBuf>, usize)> {
    let paths = glob::glob(pattern).map_err(|e| Co2Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    let mut skipped = 0;
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() && is_telemetry_file(&path) => files.push(path),
            Ok(path) if path.is_dir() => {
                let (found, passed_over) = walk_directory(&path)?;
                files.extend(found);
                skipped += passed_over;
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                warn!("Skipping unreadable match for {}: {}", pattern, e);
                skipped += 1;
            }
        }
    }

    if files.is_empty() {
        debug!("Pattern {} matched no telemetry files", pattern);
    }
    files.sort();
    Ok((files, skipped))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Telemetry files carry no fixed extension; skip hidden files and our own output
fn is_telemetry_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    let parquet = path.extension().is_some_and(|ext| ext == "parquet");
    !hidden && !parquet
}
