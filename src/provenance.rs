//! Per-parser side log of decode provenance.
//!
//! Every degradation absorbed by the parser is recorded here as one entry,
//! so the row sets stay clean while the reasons remain inspectable.

use crate::models::{CycleId, FrameKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of degradation a frame can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// Frame ended before the expected number of lines
    FrameTruncated,
    /// A token could not be converted to its expected type
    FieldUnparseable,
    /// A recognized block matched none of the known shapes
    UnknownAuxBlock,
    /// Frame consisted solely of the repeat marker
    RepeatFrame,
    /// GPS reported no fix; the timestamp fallback engaged
    SentinelNoFix,
    /// Value kept as read although its interpretation is uncertain
    AmbiguousField,
    /// Flash delimiters mixed with summary framing
    InconsistentDialect,
    /// Frame dropped under strict mode
    FrameRejected,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::FrameTruncated => "frame_truncated",
            IssueKind::FieldUnparseable => "field_unparseable",
            IssueKind::UnknownAuxBlock => "unknown_aux_block",
            IssueKind::RepeatFrame => "repeat_frame",
            IssueKind::SentinelNoFix => "sentinel_no_fix",
            IssueKind::AmbiguousField => "ambiguous_field",
            IssueKind::InconsistentDialect => "inconsistent_dialect",
            IssueKind::FrameRejected => "frame_rejected",
        }
    }

    /// Whether this kind marks the frame as degraded
    pub fn degrades(&self) -> bool {
        !matches!(self, IssueKind::SentinelNoFix | IssueKind::AmbiguousField)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field-level problem reported by a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub kind: IssueKind,
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn unparseable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::FieldUnparseable,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn new(kind: IssueKind, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// One side-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub frame_index: Option<usize>,
    pub line: Option<usize>,
    pub frame_key: Option<FrameKey>,
    pub kind: IssueKind,
    pub cycle: Option<CycleId>,
    pub field: String,
    pub reason: String,
}

/// Ordered log of provenance entries owned by one parser instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideLog {
    entries: Vec<ProvenanceEntry>,
}

impl SideLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ProvenanceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded for one frame
    pub fn for_frame(&self, frame_index: usize) -> impl Iterator<Item = &ProvenanceEntry> {
        self.entries
            .iter()
            .filter(move |e| e.frame_index == Some(frame_index))
    }

    /// Number of entries per kind
    pub fn counts_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }
}
