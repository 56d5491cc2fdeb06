//! Line sanitizer for raw telemetry byte streams.
//!
//! Splits a byte source into logical lines, tolerating invalid UTF-8,
//! removing every Unicode category-C character (controls, format
//! characters, surrogates, private use and unassigned code points) and
//! trimming whitespace.
//! Lines are produced lazily and in source order; nothing is merged or
//! dropped, so line numbers stay aligned with the input.

use crate::error::{Co2Error, Result};
use regex::Regex;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

/// Unicode general category C (`Cc Cf Cs Co Cn`)
static OTHER_CATEGORY: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\p{C}"));

/// One logical line after sanitizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedLine {
    /// Zero-based position in the stream
    pub number: usize,
    pub text: String,
    /// Invalid UTF-8 was replaced on this line
    pub encoding_error: bool,
    /// Nothing remained after sanitizing
    pub was_blank: bool,
}

/// Lazy iterator of sanitized lines over any buffered reader
#[derive(Debug)]
pub struct Sanitizer<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
    finished: bool,
}

impl<R: BufRead> Sanitizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(256),
            line_number: 0,
            finished: false,
        }
    }
}

impl Sanitizer<BufReader<File>> {
    /// Open a file for sanitizing
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for Sanitizer<R> {
    type Item = Result<SanitizedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(_) => {
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                }
                let line = sanitize_line(self.line_number, &self.buffer);
                self.line_number += 1;
                if line.is_err() {
                    self.finished = true;
                }
                Some(line)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Sanitize a whole in-memory buffer
pub fn sanitize_bytes(data: &[u8]) -> Vec<SanitizedLine> {
    // Reading from a slice cannot fail
    Sanitizer::new(data).filter_map(|line| line.ok()).collect()
}

/// Sanitize a single raw line (without its terminating newline)
pub fn sanitize_line(number: usize, raw: &[u8]) -> Result<SanitizedLine> {
    let decoded = String::from_utf8_lossy(raw);
    let encoding_error = matches!(decoded, Cow::Owned(_));

    let text = other_category()?.replace_all(&decoded, "").trim().to_string();
    let was_blank = text.is_empty();

    Ok(SanitizedLine {
        number,
        text,
        encoding_error,
        was_blank,
    })
}

/// Compiled category-C matcher
pub fn other_category() -> Result<&'static Regex> {
    OTHER_CATEGORY
        .as_ref()
        .map_err(|e| Co2Error::Pattern(e.clone()))
}
