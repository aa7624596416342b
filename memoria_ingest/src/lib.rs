#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

//! Message ingestion: buffering, episode-boundary detection and extraction
//! into typed memories (§4.B, §4.C, §4.D, §4.I).

pub mod boundary;
pub mod buffer;
pub mod extractor;
pub mod json_contract;
pub mod message;
pub mod profile;

pub use boundary::{rolling_summary, BoundaryDecision, BoundaryDetector};
pub use buffer::{AppendOutcome, MessageBuffer};
pub use extractor::{ExtractionResult, ExtractionStatus, Extractor, ProfilePatch};
pub use json_contract::parse_llm_json;
pub use message::{ConversationMeta, Episode, Message, Scene};
pub use profile::{ProfileBuilder, ProvenanceEntry};
