//! MAPCO2 Telemetry Processor Library
//!
//! Parses the line-oriented telemetry of MAPCO2 moored CO2 systems, in both
//! the satellite summary transport and the recovered flash dump, into
//! normalized row sets keyed by a shared frame key.
//!
//! The pipeline runs leaf-first:
//! - [`sanitizer`] turns raw bytes into clean logical lines
//! - [`indexer`] locates frames and their sub-blocks and detects the dialect
//! - [`decoders`] convert single lines and blocks into typed records
//! - [`assembler`] builds frames, picks the authoritative time and the key
//! - [`normalizer`] accumulates frames into typed polars row sets
//!
//! [`parser::StreamParser`] runs the pipeline over one stream and
//! [`processor::BatchProcessor`] over many files, writing Parquet output.
//! Degradations never fail a stream; they are recorded in the
//! [`provenance::SideLog`].

pub mod assembler;
pub mod cli;
pub mod config;
pub mod constants;
pub mod decoders;
pub mod error;
pub mod indexer;
pub mod models;
pub mod normalizer;
pub mod parser;
pub mod processor;
pub mod provenance;
pub mod sanitizer;

pub use config::{CompressionAlgorithm, ParserConfig, ProcessorConfig, TransportHint};
pub use error::{Co2Error, Result};
pub use models::{CycleId, Dialect, Frame, FrameKey, ParseStats, ProcessingStats};
pub use normalizer::{NormalizedRowSets, normalize_frame};
pub use parser::{ParseOutcome, StreamParser};
pub use processor::BatchProcessor;
pub use provenance::{IssueKind, ProvenanceEntry, SideLog};
