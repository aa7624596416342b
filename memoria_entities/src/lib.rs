#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious
)]
#![allow(clippy::similar_names, clippy::missing_errors_doc)]

//! `sea-orm` `Model`/`ActiveModel`/`Entity`/`Column` definitions for every
//! doc-store table named in the data model: one table per memory variant
//! (`episodic_memory`, `event_log`, `semantic_memory`, `profile`,
//! `foresight`) plus `conversation_meta`.
//!
//! No donor crate source existed for these tables (the donor workspace
//! declares the equivalent crate but ships no `src/`); the column sets here
//! are derived from the field-level evidence in the data model and from how
//! `memoria_memory`/`memoria_ingest` read and write each record.

pub mod conversation_meta;
pub mod episodic_memory;
pub mod event_log;
pub mod foresight;
pub mod profile;
pub mod semantic_memory;

pub use conversation_meta::Entity as ConversationMetaEntity;
pub use episodic_memory::Entity as EpisodicMemoryEntity;
pub use event_log::Entity as EventLogEntity;
pub use foresight::Entity as ForesightEntity;
pub use profile::Entity as ProfileEntity;
pub use semantic_memory::Entity as SemanticMemoryEntity;
