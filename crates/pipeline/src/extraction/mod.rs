//! Resource extraction from distributed-trace payloads
//!
//! Input is the `{Traces: [{Id, Duration, Segments: [{Id, Document}]}]}`
//! shape returned by the tracing service. Every segment is decoded on its
//! own; a bad segment becomes a [`ParseMiss`] and never stops its siblings.

mod arn;
mod extractor;
mod graph;
mod segment;

pub use arn::{resource_from_arn, Arn};
pub use extractor::{extract, extract_for_trace, ExtractError, ExtractionOutcome};
pub use graph::{ParseMiss, ResourceGraph};
pub use segment::SegmentDocument;
