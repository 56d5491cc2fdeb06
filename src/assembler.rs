//! Frame assembler.
//!
//! Runs the field decoders over the line spans of one indexed frame,
//! resolves the authoritative timestamp, stamps the frame key and converts
//! decoder issues into side-log entries. Nothing here fails the stream: a
//! frame that cannot be fully decoded is emitted partial and degraded.
//!
//! Summary frames are read with a small state machine:
//!
//! ```text
//! SeekHeader -> GotHeader -> GotGps -> GotEngr -> CollectCycles(0..=10)
//! ```
//!
//! The optional CTD and pH blocks that follow are read from the spans the
//! indexer recorded. Flash frames share the first three states and take
//! their cycles from the `*****` sections.

use crate::config::ParserConfig;
use crate::constants::SUMMARY_CYCLES;
use crate::decoders::{
    Decoded, cycle::looks_like_cycle_line, decode_ctd, decode_engineering, decode_flash_cycle,
    decode_gps, decode_header, decode_met, decode_ph, decode_summary_cycle,
};
use crate::indexer::{BlockSpan, FlashSectionKind, FrameBounds};
use crate::models::{
    AuthoritativeTime, CycleId, Dialect, Engineering, EngineeringLayout, Frame, FrameKey,
    GpsFix, PhVariant, TimeSource,
};
use crate::provenance::{FieldIssue, IssueKind, ProvenanceEntry};
use crate::sanitizer::SanitizedLine;
use chrono::Datelike;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Position of the summary reader within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryState {
    SeekHeader,
    GotHeader,
    GotGps,
    GotEngr,
    CollectCycles(usize),
}

impl SummaryState {
    /// Number of cycle lines collected so far
    fn cycles(&self) -> usize {
        match self {
            SummaryState::CollectCycles(n) => *n,
            _ => 0,
        }
    }

    /// Whether the engineering line has been read
    fn past_engineering(&self) -> bool {
        matches!(self, SummaryState::GotEngr | SummaryState::CollectCycles(_))
    }
}

/// Result of assembling one frame
#[derive(Debug, Clone)]
pub struct AssembledFrame {
    pub frame: Frame,
    pub entries: Vec<ProvenanceEntry>,
    /// Dropped under strict mode
    pub rejected: bool,
}

/// An issue tagged with where it arose
#[derive(Debug)]
struct Located {
    line: Option<usize>,
    cycle: Option<CycleId>,
    issue: FieldIssue,
}

/// Assembles frames for one stream
#[derive(Debug)]
pub struct FrameAssembler<'a> {
    config: &'a ParserConfig,
    /// Topics already warned about in this stream
    warned: HashSet<String>,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self {
            config,
            warned: HashSet::new(),
        }
    }

    /// Assemble one frame from the lines of its span
    ///
    /// `lines` must hold the sanitized lines `bounds.span.start..bounds.span.end`.
    pub fn assemble(&mut self, bounds: &FrameBounds, lines: &[SanitizedLine]) -> AssembledFrame {
        if bounds.repeat {
            debug!("Frame {} is a repeat marker", bounds.index);
            let frame = Frame::repeat(
                bounds.index,
                bounds.span.start,
                bounds.span.end,
                bounds.dialect,
            );
            let entries = vec![ProvenanceEntry {
                frame_index: Some(bounds.index),
                line: Some(bounds.span.start),
                frame_key: None,
                kind: IssueKind::RepeatFrame,
                cycle: None,
                field: "frame".to_string(),
                reason: "duplicate transmission marker".to_string(),
            }];
            return AssembledFrame {
                frame,
                entries,
                rejected: false,
            };
        }

        let view = FrameLines {
            offset: bounds.span.start,
            lines,
        };
        let mut issues: Vec<Located> = Vec::new();
        let mut frame = Frame {
            index: bounds.index,
            start_line: bounds.span.start,
            end_line: bounds.span.end,
            dialect: bounds.dialect,
            repeat: false,
            truncated: false,
            degraded: false,
            key: None,
            time: None,
            header: None,
            gps: None,
            engineering: None,
            cycles: Vec::new(),
            ctd: None,
            ph: None,
            met: None,
        };

        let mut state = SummaryState::SeekHeader;
        for (number, text) in view.texts(bounds.co2) {
            state = match state {
                SummaryState::SeekHeader => {
                    let header = take_record(decode_header(text), number, None, &mut issues);
                    frame.header = Some(header);
                    SummaryState::GotHeader
                }
                SummaryState::GotHeader => {
                    frame.gps = Some(take_record(decode_gps(text), number, None, &mut issues));
                    SummaryState::GotGps
                }
                SummaryState::GotGps => {
                    let engineering =
                        take_record(decode_engineering(text), number, None, &mut issues);
                    self.note_layout(&engineering);
                    frame.engineering = Some(engineering);
                    SummaryState::GotEngr
                }
                SummaryState::GotEngr | SummaryState::CollectCycles(_) => {
                    let n = state.cycles();
                    if n >= SUMMARY_CYCLES || !looks_like_cycle_line(text) {
                        debug!("Ignoring trailing line {} of frame {}", number, bounds.index);
                        break;
                    }
                    let cycle = CycleId::SUMMARY_ORDER[n];
                    let record = take_record(
                        decode_summary_cycle(text, cycle),
                        number,
                        Some(cycle),
                        &mut issues,
                    );
                    frame.cycles.push(record);
                    SummaryState::CollectCycles(n + 1)
                }
            };
        }

        let collected = state.cycles();
        frame.truncated = match bounds.dialect {
            Dialect::Summary => collected < SUMMARY_CYCLES,
            Dialect::Flash => !state.past_engineering(),
        };

        if let Some(span) = bounds.ctd {
            let texts = view.text_lines(span);
            let ctd = take_record(decode_ctd(&texts), span.start, None, &mut issues);
            frame.ctd = Some(ctd);
        }

        let ph_blocks = [
            (bounds.ph_legacy, PhVariant::Sami),
            (bounds.ph_seafet, PhVariant::Seafet),
        ];
        for (span, variant) in ph_blocks {
            let Some(span) = span else { continue };
            if frame.ph.is_some() {
                issues.push(Located {
                    line: Some(span.start),
                    cycle: None,
                    issue: FieldIssue::new(
                        IssueKind::UnknownAuxBlock,
                        "ph",
                        format!("second pH block ({}) ignored", variant.as_str()),
                    ),
                });
                continue;
            }
            let texts = view.text_lines(span);
            let ph = take_record(decode_ph(&texts, variant), span.start, None, &mut issues);
            frame.ph = Some(ph);
        }

        match bounds.dialect {
            Dialect::Flash => {
                self.assemble_flash_sections(bounds, &view, &mut frame, &mut issues)
            }
            Dialect::Summary => {
                for section in &bounds.flash_sections {
                    issues.push(Located {
                        line: Some(section.delimiter_line),
                        cycle: None,
                        issue: FieldIssue::new(
                            IssueKind::UnknownAuxBlock,
                            "flash",
                            "flash section ignored under summary transport",
                        ),
                    });
                }
            }
        }
        if bounds.dialect == Dialect::Flash && frame.cycles.is_empty() {
            frame.truncated = true;
        }

        if frame.truncated {
            issues.push(Located {
                line: Some(bounds.span.start),
                cycle: None,
                issue: FieldIssue::new(
                    IssueKind::FrameTruncated,
                    "frame",
                    match bounds.dialect {
                        Dialect::Summary => format!(
                            "expected {} cycle lines, found {}",
                            SUMMARY_CYCLES, collected
                        ),
                        Dialect::Flash => format!(
                            "flash frame ended with {} cycle rows",
                            frame.cycles.len()
                        ),
                    },
                ),
            });
        }

        // Every frame carries its GPS and engineering rows, empty if never read
        frame.gps.get_or_insert_with(GpsFix::empty);
        frame.engineering.get_or_insert_with(Engineering::empty);

        frame.time = authoritative_time(&frame);
        let key = match (frame.system(), frame.time) {
            (Some(system), Some(time)) => Some(FrameKey::new(
                system,
                time.time,
                self.config.half_hour_rounding,
            )),
            (system, _) => {
                let reason = if system.is_none() {
                    "header carries no system serial"
                } else {
                    "no usable GPS, unit-clock or post-check time"
                };
                issues.push(Located {
                    line: Some(bounds.span.start),
                    cycle: None,
                    issue: FieldIssue::unparseable("frame_key", reason),
                });
                None
            }
        };
        frame.key = key;

        for located in issues
            .iter()
            .filter(|l| l.issue.kind == IssueKind::AmbiguousField)
        {
            self.warn_once(&located.issue.field, &located.issue.reason);
        }

        frame.degraded = frame.truncated || issues.iter().any(|l| l.issue.kind.degrades());
        let rejected = self.config.strict
            && issues.iter().any(|l| {
                matches!(
                    l.issue.kind,
                    IssueKind::FieldUnparseable | IssueKind::UnknownAuxBlock
                )
            });

        let mut entries: Vec<ProvenanceEntry> = issues
            .into_iter()
            .map(|l| ProvenanceEntry {
                frame_index: Some(frame.index),
                line: l.line,
                frame_key: frame.key.clone(),
                kind: l.issue.kind,
                cycle: l.cycle,
                field: l.issue.field,
                reason: l.issue.reason,
            })
            .collect();

        if rejected {
            warn!(
                "Frame {} (line {}) rejected in strict mode",
                frame.index, frame.start_line
            );
            entries.push(ProvenanceEntry {
                frame_index: Some(frame.index),
                line: Some(frame.start_line),
                frame_key: frame.key.clone(),
                kind: IssueKind::FrameRejected,
                cycle: None,
                field: "frame".to_string(),
                reason: "field failures under strict mode".to_string(),
            });
        } else if frame.degraded {
            debug!(
                "Frame {} degraded with {} side-log entries",
                frame.index,
                entries.len()
            );
        }

        AssembledFrame {
            frame,
            entries,
            rejected,
        }
    }

    fn assemble_flash_sections(
        &self,
        bounds: &FrameBounds,
        view: &FrameLines<'_>,
        frame: &mut Frame,
        issues: &mut Vec<Located>,
    ) {
        for section in &bounds.flash_sections {
            let texts = view.text_lines(section.body);
            let line = section.delimiter_line;
            match &section.kind {
                FlashSectionKind::Cycle {
                    cycle,
                    minute,
                    minute_raw,
                } => {
                    if minute.is_none() {
                        issues.push(Located {
                            line: Some(line),
                            cycle: Some(*cycle),
                            issue: FieldIssue::unparseable(
                                "minute",
                                match minute_raw {
                                    Some(raw) => format!("'{}' is not a number", raw),
                                    None => "delimiter carries no minute".to_string(),
                                },
                            ),
                        });
                    }
                    let rows = take_record(
                        decode_flash_cycle(&texts, *cycle, *minute),
                        line,
                        Some(*cycle),
                        issues,
                    );
                    frame.cycles.extend(rows);
                }
                FlashSectionKind::Met => {
                    let met = take_record(decode_met(&texts), line, None, issues);
                    if frame.met.is_some() {
                        issues.push(duplicate(line, "met"));
                    } else {
                        frame.met = Some(met);
                    }
                }
                FlashSectionKind::Ctd => {
                    let ctd = take_record(decode_ctd(&texts), line, None, issues);
                    if frame.ctd.is_some() {
                        issues.push(duplicate(line, "ctd"));
                    } else {
                        frame.ctd = Some(ctd);
                    }
                }
                FlashSectionKind::Unknown(name) => issues.push(Located {
                    line: Some(line),
                    cycle: None,
                    issue: FieldIssue::new(
                        IssueKind::UnknownAuxBlock,
                        "flash",
                        format!("unrecognized section '{}'", name),
                    ),
                }),
            }
        }
    }

    fn note_layout(&mut self, engineering: &Engineering) {
        if engineering.layout == EngineeringLayout::WithSecondarySpan {
            self.warn_once(
                "span2_coeff",
                "19-token engineering lines carry a secondary span coefficient; it is kept opaque",
            );
        }
    }

    /// Warn the first time a topic comes up; later occurrences stay in the side log
    fn warn_once(&mut self, topic: &str, message: &str) {
        if self.warned.insert(topic.to_string()) {
            warn!("{}: {}", topic, message);
        }
    }
}

/// The frame's own lines, addressed by absolute line number
struct FrameLines<'l> {
    offset: usize,
    lines: &'l [SanitizedLine],
}

impl<'l> FrameLines<'l> {
    /// Non-blank lines of a span with their line numbers
    fn texts(&self, span: BlockSpan) -> Vec<(usize, &'l str)> {
        let start = span.start.saturating_sub(self.offset).min(self.lines.len());
        let end = span.end.saturating_sub(self.offset).clamp(start, self.lines.len());
        self.lines[start..end]
            .iter()
            .filter(|line| !line.was_blank)
            .map(|line| (line.number, line.text.as_str()))
            .collect()
    }

    fn text_lines(&self, span: BlockSpan) -> Vec<&'l str> {
        self.texts(span).into_iter().map(|(_, text)| text).collect()
    }
}

fn take_record<T>(
    decoded: Decoded<T>,
    line: usize,
    cycle: Option<CycleId>,
    issues: &mut Vec<Located>,
) -> T {
    let (record, found) = decoded.into_parts();
    issues.extend(found.into_iter().map(|issue| Located {
        line: Some(line),
        cycle,
        issue,
    }));
    record
}

fn duplicate(line: usize, field: &str) -> Located {
    Located {
        line: Some(line),
        cycle: None,
        issue: FieldIssue::new(
            IssueKind::UnknownAuxBlock,
            field,
            format!("second {} section ignored", field),
        ),
    }
}

/// Choose the frame's timestamp: GPS fix, else unit clock, else GPS post-check
///
/// A GPS fix counts only when it is not the no-fix sentinel and its year is
/// not zero.
pub fn authoritative_time(frame: &Frame) -> Option<AuthoritativeTime> {
    let gps_fix = frame
        .gps
        .as_ref()
        .filter(|gps| !gps.no_fix)
        .and_then(|gps| gps.fix_time)
        .filter(|time| time.year() > 0);
    if let Some(time) = gps_fix {
        return Some(AuthoritativeTime {
            time,
            source: TimeSource::Gps,
        });
    }

    if let Some(time) = frame.header.as_ref().and_then(|h| h.unit_clock) {
        return Some(AuthoritativeTime {
            time,
            source: TimeSource::UnitClock,
        });
    }

    frame
        .gps
        .as_ref()
        .and_then(|gps| gps.post_check)
        .map(|time| AuthoritativeTime {
            time,
            source: TimeSource::PostCheck,
        })
}
