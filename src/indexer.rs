//! Frame indexer.
//!
//! Scans sanitized lines in a single pass and records, for each frame, the
//! line span of the CO2 block and of every auxiliary sub-block. Only the
//! boundary table is kept; the lines themselves stay with the caller.
//!
//! All spans are half-open (`start..end`). A frame runs from its header
//! line up to the next frame's header (or the end of the stream), and each
//! sub-block runs up to the next sub-block start inside the same frame.

use crate::config::ParserConfig;
use crate::constants::{
    CTD_PREFIX, CTD_TERMINATOR, FLASH_CTD_SECTION, FLASH_DELIMITER, FLASH_MET_SECTION,
    PH_LEGACY_PREFIXES, PH_SEAFET_PREFIX, has_prefix,
};
use crate::models::{CycleId, Dialect};
use crate::sanitizer::SanitizedLine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Half-open line span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// What a `*****` delimiter line introduces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlashSectionKind {
    /// A named cycle with the elapsed minute from the delimiter suffix
    Cycle {
        cycle: CycleId,
        minute: Option<f64>,
        minute_raw: Option<String>,
    },
    Met,
    Ctd,
    /// A delimiter naming nothing we recognize
    Unknown(String),
}

/// One flash section: the delimiter line and the payload lines after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashSection {
    pub delimiter_line: usize,
    pub kind: FlashSectionKind,
    pub body: BlockSpan,
}

/// Boundary table row for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameBounds {
    pub index: usize,
    /// The whole frame, header line included
    pub span: BlockSpan,
    /// Header through the last CO2 cycle line
    pub co2: BlockSpan,
    pub repeat: bool,
    pub ph_legacy: Option<BlockSpan>,
    pub ph_seafet: Option<BlockSpan>,
    pub ctd: Option<BlockSpan>,
    pub flash_sections: Vec<FlashSection>,
    /// Dialect the assembler should apply
    pub dialect: Dialect,
    /// Dialect observed in this frame alone
    pub observed_dialect: Dialect,
    /// Non-blank lines in the frame
    pub content_lines: usize,
}

/// Complete boundary table of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameIndex {
    pub frames: Vec<FrameBounds>,
    pub dialect: Dialect,
    pub line_count: usize,
    /// Non-blank lines before the first frame
    pub orphan_lines: usize,
    /// Counts of (flash, summary) frames when both occur
    pub inconsistent: Option<(usize, usize)>,
}

impl FrameIndex {
    /// Index an in-memory sequence of sanitized lines
    pub fn build(lines: &[SanitizedLine], config: &ParserConfig) -> Self {
        let mut indexer = FrameIndexer::new(config);
        for line in lines {
            indexer.observe(line.number, &line.text);
        }
        indexer.finish(lines.len())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Sub-block being tracked inside the open frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubBlock {
    PhLegacy,
    PhSeafet,
    Ctd,
}

#[derive(Debug)]
struct OpenFrame {
    start: usize,
    repeat: bool,
    starts: Vec<(SubBlock, usize)>,
    ctd_terminator: Option<usize>,
    delimiters: Vec<(usize, FlashSectionKind)>,
    has_cycle_delimiter: bool,
    content_lines: usize,
}

/// Incremental single-pass indexer
#[derive(Debug)]
pub struct FrameIndexer<'a> {
    config: &'a ParserConfig,
    frames: Vec<FrameBounds>,
    open: Option<OpenFrame>,
    orphan_lines: usize,
}

impl<'a> FrameIndexer<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self {
            config,
            frames: Vec::new(),
            open: None,
            orphan_lines: 0,
        }
    }

    /// Feed the next line of the stream
    pub fn observe(&mut self, number: usize, text: &str) {
        let is_repeat = text == self.config.repeat_marker;
        if is_repeat || self.config.is_mode_tag(text) {
            self.close(number);
            self.open = Some(OpenFrame {
                start: number,
                repeat: is_repeat,
                starts: Vec::new(),
                ctd_terminator: None,
                delimiters: Vec::new(),
                has_cycle_delimiter: false,
                content_lines: 1,
            });
            return;
        }

        let Some(frame) = self.open.as_mut() else {
            if !text.is_empty() {
                self.orphan_lines += 1;
            }
            return;
        };

        if text.is_empty() {
            return;
        }
        frame.content_lines += 1;
        if frame.repeat {
            return;
        }

        if text.starts_with(FLASH_DELIMITER) {
            let kind = parse_delimiter(text);
            if matches!(kind, FlashSectionKind::Cycle { .. }) {
                frame.has_cycle_delimiter = true;
            }
            frame.delimiters.push((number, kind));
            return;
        }

        // Flash sections own everything after their delimiter
        if !frame.delimiters.is_empty() {
            return;
        }

        let block = if has_prefix(text, PH_LEGACY_PREFIXES) {
            Some(SubBlock::PhLegacy)
        } else if text.starts_with(PH_SEAFET_PREFIX) {
            Some(SubBlock::PhSeafet)
        } else if text.starts_with(CTD_PREFIX) {
            Some(SubBlock::Ctd)
        } else {
            None
        };

        if let Some(block) = block {
            if frame.starts.iter().any(|(b, _)| *b == block) {
                debug!("Ignoring second {:?} block start at line {}", block, number);
            } else {
                frame.starts.push((block, number));
            }
        } else if frame.ctd_terminator.is_none()
            && frame.starts.iter().any(|(b, _)| *b == SubBlock::Ctd)
            && starts_with_ignore_case(text, CTD_TERMINATOR)
        {
            frame.ctd_terminator = Some(number);
        }
    }

    /// Close the open frame and resolve dialects
    pub fn finish(mut self, line_count: usize) -> FrameIndex {
        self.close(line_count);

        let flash_frames = self
            .frames
            .iter()
            .filter(|f| !f.repeat && f.observed_dialect == Dialect::Flash)
            .count();
        // Summary frames only count once they carry cycle lines
        let summary_frames = self
            .frames
            .iter()
            .filter(|f| {
                !f.repeat && f.observed_dialect == Dialect::Summary && f.content_lines > 3
            })
            .count();

        let detected = if flash_frames > 0 {
            Dialect::Flash
        } else {
            Dialect::Summary
        };
        let dialect = self.config.transport.forced_dialect().unwrap_or(detected);

        let inconsistent = (flash_frames > 0 && summary_frames > 0)
            .then_some((flash_frames, summary_frames));
        if let Some((flash, summary)) = inconsistent {
            warn!(
                "Stream mixes {} flash frames with {} summary frames; treating as {}",
                flash,
                summary,
                dialect.as_str()
            );
        }

        for frame in &mut self.frames {
            frame.dialect = dialect;
        }

        debug!(
            "Indexed {} frames over {} lines ({} dialect, {} orphan lines)",
            self.frames.len(),
            line_count,
            dialect.as_str(),
            self.orphan_lines
        );

        FrameIndex {
            frames: self.frames,
            dialect,
            line_count,
            orphan_lines: self.orphan_lines,
            inconsistent,
        }
    }

    fn close(&mut self, end: usize) {
        let Some(open) = self.open.take() else {
            return;
        };

        let span = BlockSpan {
            start: open.start,
            end,
        };

        let mut starts = open.starts;
        starts.sort_by_key(|(_, line)| *line);
        let first_delimiter = open.delimiters.first().map(|(line, _)| *line);
        let first_block = starts.first().map(|(_, line)| *line);
        let co2_end = [first_block, first_delimiter]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(end);

        let mut ph_legacy = None;
        let mut ph_seafet = None;
        let mut ctd = None;
        for (i, (block, start)) in starts.iter().enumerate() {
            let next = starts.get(i + 1).map(|(_, line)| *line).unwrap_or(end);
            match block {
                SubBlock::PhLegacy => ph_legacy = Some(BlockSpan { start: *start, end: next }),
                SubBlock::PhSeafet => ph_seafet = Some(BlockSpan { start: *start, end: next }),
                SubBlock::Ctd => {
                    let stop = match open.ctd_terminator {
                        Some(t) if t > *start && t < next => t,
                        _ => next,
                    };
                    ctd = Some(BlockSpan {
                        start: *start,
                        end: stop,
                    });
                }
            }
        }

        let flash_sections = open
            .delimiters
            .iter()
            .enumerate()
            .map(|(i, (line, kind))| {
                let next = open
                    .delimiters
                    .get(i + 1)
                    .map(|(l, _)| *l)
                    .unwrap_or(end);
                FlashSection {
                    delimiter_line: *line,
                    kind: kind.clone(),
                    body: BlockSpan {
                        start: line + 1,
                        end: next,
                    },
                }
            })
            .collect();

        let observed_dialect = if open.has_cycle_delimiter {
            Dialect::Flash
        } else {
            Dialect::Summary
        };

        self.frames.push(FrameBounds {
            index: self.frames.len(),
            span,
            co2: BlockSpan {
                start: open.start,
                end: co2_end,
            },
            repeat: open.repeat,
            ph_legacy,
            ph_seafet,
            ctd,
            flash_sections,
            dialect: observed_dialect,
            observed_dialect,
            content_lines: open.content_lines,
        });
    }
}

/// Interpret a `*****` delimiter line
pub fn parse_delimiter(text: &str) -> FlashSectionKind {
    let body = text.trim_start_matches('*').trim();
    let mut tokens = body.split_whitespace();
    let Some(name) = tokens.next() else {
        return FlashSectionKind::Unknown(String::new());
    };

    if let Some(cycle) = CycleId::from_label(name) {
        let minute_raw = tokens.next().map(str::to_string);
        let minute = minute_raw.as_deref().and_then(|m| m.parse::<f64>().ok());
        return FlashSectionKind::Cycle {
            cycle,
            minute,
            minute_raw,
        };
    }
    if name.eq_ignore_ascii_case(FLASH_MET_SECTION) {
        return FlashSectionKind::Met;
    }
    if name.eq_ignore_ascii_case(FLASH_CTD_SECTION) {
        return FlashSectionKind::Ctd;
    }
    FlashSectionKind::Unknown(name.to_string())
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportHint;
    use crate::sanitizer::sanitize_bytes;

    fn index(text: &str) -> FrameIndex {
        FrameIndex::build(&sanitize_bytes(text.as_bytes()), &ParserConfig::default())
    }

    #[test]
    fn test_empty_stream() {
        let index = index("");
        assert!(index.is_empty());
        assert_eq!(index.dialect, Dialect::Summary);
        assert_eq!(index.inconsistent, None);
    }

    #[test]
    fn test_frames_split_on_mode_tags() {
        let index = index("garbage\nNORM a\ngps\nengr\nc1\n\nFAST b\ngps\n");
        assert_eq!(index.orphan_lines, 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.frames[0].span, BlockSpan { start: 1, end: 6 });
        assert_eq!(index.frames[1].span, BlockSpan { start: 6, end: 8 });
        assert_eq!(index.frames[0].co2, index.frames[0].span);
    }

    #[test]
    fn test_sub_blocks_end_at_successor() {
        let text = "NORM a\ngps\nengr\nc1\nSamiPH 1\nABCD\nSBE16 2\n1 2\n3 4\nend sbe16\ntrailing\nNORM b\n";
        let index = index(text);
        let frame = &index.frames[0];
        assert_eq!(frame.co2, BlockSpan { start: 0, end: 4 });
        assert_eq!(frame.ph_legacy, Some(BlockSpan { start: 4, end: 6 }));
        assert_eq!(frame.ctd, Some(BlockSpan { start: 6, end: 9 }));
        assert_eq!(frame.ph_seafet, None);
        assert_eq!(frame.span.end, 11);
    }

    #[test]
    fn test_ctd_terminator_is_case_insensitive() {
        let index = index("NORM a\nSBE16 1\n1 2\nEND SBE16\n");
        assert_eq!(index.frames[0].ctd, Some(BlockSpan { start: 1, end: 3 }));
    }

    #[test]
    fn test_repeat_marker_opens_empty_frame() {
        let index = index("NORM a\ngps\nREPEAT\nNORM b\n");
        assert_eq!(index.len(), 3);
        assert!(!index.frames[0].repeat);
        assert!(index.frames[1].repeat);
        assert_eq!(index.frames[1].span, BlockSpan { start: 2, end: 3 });
        assert!(!index.frames[2].repeat);
    }

    #[test]
    fn test_flash_detection() {
        let text = "NORM a\ngps\nengr\n***** Zero_on 0\nLicor 1\n1 2 3 4 5\n***** Zero_off 3\n***** Met\nMet 1\n100\n";
        let index = index(text);
        assert_eq!(index.dialect, Dialect::Flash);
        let frame = &index.frames[0];
        assert_eq!(frame.co2, BlockSpan { start: 0, end: 3 });
        assert_eq!(frame.flash_sections.len(), 3);
        assert_eq!(
            frame.flash_sections[0].kind,
            FlashSectionKind::Cycle {
                cycle: CycleId::ZeroPumpOn,
                minute: Some(0.0),
                minute_raw: Some("0".to_string()),
            }
        );
        assert_eq!(frame.flash_sections[0].body, BlockSpan { start: 4, end: 6 });
        assert_eq!(frame.flash_sections[2].kind, FlashSectionKind::Met);
        assert_eq!(frame.flash_sections[2].body, BlockSpan { start: 8, end: 10 });
    }

    #[test]
    fn test_prefixes_after_delimiter_are_ignored() {
        let index = index("NORM a\ngps\nengr\n***** SBE16\nSBE16 1\n1 2\n");
        let frame = &index.frames[0];
        assert_eq!(frame.ctd, None);
        assert_eq!(frame.flash_sections[0].kind, FlashSectionKind::Ctd);
        // Met/SBE16 delimiters alone do not imply flash transport
        assert_eq!(index.dialect, Dialect::Summary);
    }

    #[test]
    fn test_mixed_dialects_are_reported() {
        let text = "NORM a\ngps\nengr\nc1\nc2\nNORM b\ngps\nengr\n***** Air_on 1\n";
        let index = index(text);
        assert_eq!(index.inconsistent, Some((1, 1)));
        assert_eq!(index.dialect, Dialect::Flash);
        assert!(index.frames.iter().all(|f| f.dialect == Dialect::Flash));
        assert_eq!(index.frames[0].observed_dialect, Dialect::Summary);
    }

    #[test]
    fn test_transport_hint_overrides_detection() {
        let config = ParserConfig::default().with_transport(TransportHint::Summary);
        let lines = sanitize_bytes(b"NORM a\n***** Zero_on 0\n");
        let index = FrameIndex::build(&lines, &config);
        assert_eq!(index.dialect, Dialect::Summary);
        assert_eq!(index.frames[0].dialect, Dialect::Summary);
    }

    #[test]
    fn test_parse_delimiter_variants() {
        assert_eq!(parse_delimiter("*****Met"), FlashSectionKind::Met);
        assert_eq!(parse_delimiter("***** sbe16 12"), FlashSectionKind::Ctd);
        assert_eq!(
            parse_delimiter("***** Pump 4"),
            FlashSectionKind::Unknown("Pump".to_string())
        );
        assert!(matches!(
            parse_delimiter("***** Span_cal x"),
            FlashSectionKind::Cycle {
                cycle: CycleId::SpanPostCal,
                minute: None,
                ..
            }
        ));
    }
}
