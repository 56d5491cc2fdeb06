//! Stream parser.
//!
//! Runs the pipeline over one input in two passes. The first pass sanitizes
//! and indexes every line without keeping any text. The second pass
//! re-sanitizes the input and buffers only the lines of the frame being
//! assembled, so peak memory is one frame plus the boundary table and the
//! row-set builders. Cancellation is checked between frames.

use crate::assembler::FrameAssembler;
use crate::config::ParserConfig;
use crate::error::{Co2Error, Result};
use crate::indexer::{FrameBounds, FrameIndex, FrameIndexer};
use crate::models::{Dialect, ParseStats};
use crate::normalizer::{NormalizedRowSets, StreamNormalizer};
use crate::provenance::{IssueKind, ProvenanceEntry, SideLog};
use crate::sanitizer::{SanitizedLine, Sanitizer};
use std::io::Read;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything produced for one stream
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub row_sets: NormalizedRowSets,
    pub side_log: SideLog,
    pub stats: ParseStats,
    pub dialect: Dialect,
}

/// Line counters gathered while indexing
#[derive(Debug, Default, Clone, Copy)]
struct LineCounts {
    lines: usize,
    blank: usize,
    encoding_errors: usize,
}

/// Parser for a single telemetry stream
#[derive(Debug, Clone)]
pub struct StreamParser {
    config: ParserConfig,
    cancel: Option<CancellationToken>,
}

impl StreamParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Stop between frames once the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a telemetry file
    pub fn parse_path(&self, path: &Path) -> Result<ParseOutcome> {
        self.config.validate()?;
        if !path.is_file() {
            return Err(Co2Error::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!("Parsing {}", path.display());

        let (index, counts) = self.index(Sanitizer::from_path(path)?)?;
        self.assemble(index, counts, Sanitizer::from_path(path)?)
    }

    /// Parse an in-memory stream
    pub fn parse_bytes(&self, data: &[u8]) -> Result<ParseOutcome> {
        self.config.validate()?;
        let (index, counts) = self.index(Sanitizer::new(data))?;
        self.assemble(index, counts, Sanitizer::new(data))
    }

    /// Parse any reader; the input is read fully before the first pass
    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ParseOutcome> {
        self.config.validate()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.parse_bytes(&data)
    }

    fn index<I>(&self, lines: I) -> Result<(FrameIndex, LineCounts)>
    where
        I: Iterator<Item = Result<SanitizedLine>>,
    {
        let mut indexer = FrameIndexer::new(&self.config);
        let mut counts = LineCounts::default();
        for line in lines {
            let line = line?;
            counts.lines += 1;
            counts.blank += usize::from(line.was_blank);
            counts.encoding_errors += usize::from(line.encoding_error);
            indexer.observe(line.number, &line.text);
        }
        Ok((indexer.finish(counts.lines), counts))
    }

    fn assemble<I>(&self, index: FrameIndex, counts: LineCounts, lines: I) -> Result<ParseOutcome>
    where
        I: Iterator<Item = Result<SanitizedLine>>,
    {
        let mut side_log = SideLog::new();
        if let Some((flash_frames, summary_frames)) = index.inconsistent {
            if self.config.strict {
                return Err(Co2Error::InconsistentDialect {
                    flash_frames,
                    summary_frames,
                });
            }
            side_log.push(ProvenanceEntry {
                frame_index: None,
                line: None,
                frame_key: None,
                kind: IssueKind::InconsistentDialect,
                cycle: None,
                field: "dialect".to_string(),
                reason: format!(
                    "{} flash frames and {} summary frames; stream treated as {}",
                    flash_frames,
                    summary_frames,
                    index.dialect.as_str()
                ),
            });
        }

        let mut run = StreamRun {
            assembler: FrameAssembler::new(&self.config),
            normalizer: StreamNormalizer::new(self.config.sentinel),
            side_log,
            stats: ParseStats {
                lines: counts.lines,
                blank_lines: counts.blank,
                encoding_errors: counts.encoding_errors,
                orphan_lines: index.orphan_lines,
                frames_total: index.len(),
                ..Default::default()
            },
        };

        let mut pending = index.frames.iter().peekable();
        let mut buffer: Vec<SanitizedLine> = Vec::new();
        for line in lines {
            let line = line?;
            let Some(bounds) = pending.peek().copied() else {
                break;
            };
            if line.number < bounds.span.start {
                continue;
            }
            let closes = line.number + 1 >= bounds.span.end;
            buffer.push(line);
            if closes {
                if self.is_cancelled() {
                    run.stats.cancelled = true;
                    break;
                }
                run.emit(bounds, &buffer);
                buffer.clear();
                pending.next();
            }
        }

        // A source that shrank between passes leaves frames without lines
        if !run.stats.cancelled {
            for bounds in pending {
                if self.is_cancelled() {
                    run.stats.cancelled = true;
                    break;
                }
                run.emit(bounds, &buffer);
                buffer.clear();
            }
        }

        if run.stats.cancelled {
            warn!(
                "Parsing cancelled after {} of {} frames",
                run.normalizer.frames(),
                run.stats.frames_total
            );
        }

        let StreamRun {
            normalizer,
            side_log,
            mut stats,
            ..
        } = run;
        stats.issue_counts = side_log.counts_by_kind();
        let row_sets = normalizer.finish(&side_log)?;

        info!(
            "Parsed {} frames ({} degraded, {} rejected, {} cycle rows) from {} lines",
            stats.frames_total,
            stats.frames_degraded,
            stats.frames_rejected,
            stats.cycle_rows,
            stats.lines
        );

        Ok(ParseOutcome {
            row_sets,
            side_log,
            stats,
            dialect: index.dialect,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Per-stream state of the assembling pass
struct StreamRun<'a> {
    assembler: FrameAssembler<'a>,
    normalizer: StreamNormalizer,
    side_log: SideLog,
    stats: ParseStats,
}

impl StreamRun<'_> {
    fn emit(&mut self, bounds: &FrameBounds, lines: &[SanitizedLine]) {
        let assembled = self.assembler.assemble(bounds, lines);
        let frame = assembled.frame;

        if frame.repeat {
            self.stats.frames_repeat += 1;
        }
        if frame.truncated {
            self.stats.frames_truncated += 1;
        }
        if frame.degraded {
            self.stats.frames_degraded += 1;
        }
        for entry in assembled.entries {
            self.side_log.push(entry);
        }

        if assembled.rejected {
            self.stats.frames_rejected += 1;
            debug!("Frame {} rejected", frame.index);
            return;
        }
        self.stats.frames_emitted += 1;
        self.stats.cycle_rows += frame.cycles.len();
        self.normalizer.push_frame(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportHint;
    use std::io::Cursor;
    use tempfile::TempDir;

    const HEADER: &str = "NORM A1B2 512 2017/05/01 12:10:00 STN07 3 2.1_01/01/2015";
    const GPS: &str = "05/01/2017 12:00:05 4710.1234 N 12225.6789 W 42 1 2017/05/01_12:00:03 2017/05/01_12:00:07 0";
    const ENGR: &str = "13.2 12.9 0.987 1.013 0000 28.51 0.02 5.12 0.01 35.1 0.03 -12.5 3.1 8.2 2.9 181 175 7.4";
    const CYCLE: &str = "1.5 35.1 0.1 101.3 0.2 398.7 0.5 20.9 0.1 85.0 1.0 22.0 0.1 2900 3 2950 4";

    fn summary_frame() -> String {
        let mut text = format!("{}\n{}\n{}\n", HEADER, GPS, ENGR);
        for _ in 0..10 {
            text.push_str(CYCLE);
            text.push('\n');
        }
        text
    }

    fn flash_frame() -> String {
        format!(
            "{}\n{}\n{}\n***** Zero_on 0\nLicor 1\n35.1 101.3 398.7 2900 2950\nO2 1\n20.9\nRH 1\n85\nRHT 1\n22\n",
            HEADER, GPS, ENGR
        )
    }

    #[test]
    fn test_parse_bytes_counts_frames() {
        let text = format!("junk before\n\n{}\n{}", summary_frame(), summary_frame());
        let outcome = StreamParser::new(ParserConfig::default())
            .parse_bytes(text.as_bytes())
            .unwrap();

        assert_eq!(outcome.stats.frames_total, 2);
        assert_eq!(outcome.stats.frames_emitted, 2);
        assert_eq!(outcome.stats.frames_degraded, 0);
        assert_eq!(outcome.stats.cycle_rows, 20);
        assert_eq!(outcome.stats.orphan_lines, 1);
        assert_eq!(outcome.stats.blank_lines, 2);
        assert_eq!(outcome.row_sets.cycles.height(), 20);
        assert_eq!(outcome.row_sets.header.height(), 2);
        assert!(outcome.side_log.is_empty());
        assert_eq!(outcome.dialect, Dialect::Summary);
    }

    #[test]
    fn test_empty_stream() {
        let outcome = StreamParser::new(ParserConfig::default())
            .parse_bytes(b"")
            .unwrap();
        assert_eq!(outcome.stats.frames_total, 0);
        assert_eq!(outcome.row_sets.total_rows(), 0);
        assert!(!outcome.stats.cancelled);
    }

    #[test]
    fn test_reader_matches_bytes() {
        let text = summary_frame();
        let parser = StreamParser::new(ParserConfig::default());
        let from_bytes = parser.parse_bytes(text.as_bytes()).unwrap();
        let from_reader = parser.parse_reader(Cursor::new(text.into_bytes())).unwrap();
        assert_eq!(from_bytes.stats, from_reader.stats);
        assert!(
            from_bytes
                .row_sets
                .cycles
                .equals_missing(&from_reader.row_sets.cycles)
        );
    }

    #[test]
    fn test_parse_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stream.txt");
        std::fs::write(&path, summary_frame()).unwrap();

        let parser = StreamParser::new(ParserConfig::default());
        let outcome = parser.parse_path(&path).unwrap();
        assert_eq!(outcome.stats.frames_emitted, 1);

        let missing = parser.parse_path(&dir.path().join("missing.txt"));
        assert!(matches!(missing, Err(Co2Error::InputNotFound { .. })));
    }

    #[test]
    fn test_cancelled_before_first_frame() {
        let token = CancellationToken::new();
        token.cancel();
        let text = format!("{}{}", summary_frame(), summary_frame());
        let outcome = StreamParser::new(ParserConfig::default())
            .with_cancellation(token)
            .parse_bytes(text.as_bytes())
            .unwrap();
        assert!(outcome.stats.cancelled);
        assert_eq!(outcome.stats.frames_emitted, 0);
        assert_eq!(outcome.row_sets.header.height(), 0);
    }

    #[test]
    fn test_cancelled_after_two_frames() {
        let token = CancellationToken::new();
        let text = summary_frame().repeat(4);
        let parser = StreamParser::new(ParserConfig::default()).with_cancellation(token.clone());

        let (index, counts) = parser.index(Sanitizer::new(text.as_bytes())).unwrap();
        assert_eq!(index.len(), 4);
        // Cancel as soon as the third frame starts arriving
        let third_start = index.frames[2].span.start;
        let lines = Sanitizer::new(text.as_bytes()).inspect(move |line| {
            if line.as_ref().is_ok_and(|l| l.number == third_start) {
                token.cancel();
            }
        });
        let outcome = parser.assemble(index, counts, lines).unwrap();

        assert!(outcome.stats.cancelled);
        assert_eq!(outcome.stats.frames_total, 4);
        assert_eq!(outcome.stats.frames_emitted, 2);
        assert_eq!(outcome.row_sets.header.height(), 2);
        assert_eq!(outcome.row_sets.engineering.height(), 2);
        assert_eq!(outcome.row_sets.cycles.height(), 20);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ParserConfig {
            mode_tags: Vec::new(),
            ..ParserConfig::default()
        };
        let parser = StreamParser::new(config);
        let text = summary_frame();

        assert!(matches!(
            parser.parse_bytes(text.as_bytes()),
            Err(Co2Error::Configuration { .. })
        ));
        assert!(matches!(
            parser.parse_reader(Cursor::new(text.clone().into_bytes())),
            Err(Co2Error::Configuration { .. })
        ));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stream.txt");
        std::fs::write(&path, &text).unwrap();
        assert!(matches!(
            parser.parse_path(&path),
            Err(Co2Error::Configuration { .. })
        ));

        let long_tag = StreamParser::new(ParserConfig::default().with_mode_tags(["NORMAL"]));
        assert!(matches!(
            long_tag.parse_bytes(text.as_bytes()),
            Err(Co2Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_mixed_dialects() {
        let text = format!("{}{}", flash_frame(), summary_frame());

        let outcome = StreamParser::new(ParserConfig::default())
            .parse_bytes(text.as_bytes())
            .unwrap();
        assert_eq!(outcome.dialect, Dialect::Flash);
        assert_eq!(
            outcome.stats.issue_counts.get(&IssueKind::InconsistentDialect),
            Some(&1)
        );

        let strict = StreamParser::new(ParserConfig::default().with_strict())
            .parse_bytes(text.as_bytes());
        assert!(matches!(
            strict,
            Err(Co2Error::InconsistentDialect {
                flash_frames: 1,
                summary_frames: 1
            })
        ));
    }

    #[test]
    fn test_forced_transport() {
        let outcome = StreamParser::new(
            ParserConfig::default().with_transport(TransportHint::Flash),
        )
        .parse_bytes(summary_frame().as_bytes())
        .unwrap();
        assert_eq!(outcome.dialect, Dialect::Flash);
    }

    #[test]
    fn test_strict_mode_rejects_bad_frames() {
        let bad = summary_frame().replacen("398.7", "bogus", 1);
        let text = format!("{}{}", bad, summary_frame());
        let outcome = StreamParser::new(ParserConfig::default().with_strict())
            .parse_bytes(text.as_bytes())
            .unwrap();
        assert_eq!(outcome.stats.frames_rejected, 1);
        assert_eq!(outcome.stats.frames_emitted, 1);
        assert_eq!(outcome.row_sets.header.height(), 1);
        assert_eq!(
            outcome.stats.issue_counts.get(&IssueKind::FrameRejected),
            Some(&1)
        );
    }
}
