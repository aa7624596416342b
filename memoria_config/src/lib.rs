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
#![allow(clippy::missing_errors_doc)]

pub mod schema;

pub use schema::{
    AgenticConfig, BoundaryConfig, BufferConfig, Config, DatabaseConfig, ExtractionConfig,
    NamespaceConfig, ProfileConfig, ProviderConfig, ProvidersConfig, RerankConfig, RetrievalConfig,
};
