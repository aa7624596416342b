#![deny(
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
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod command;

use command::{
    CommandStrategy, DeleteInput, DeleteStrategy, FetchInput, FetchStrategy, IngestInput,
    IngestStrategy, InfoStrategy, InitStrategy, MetadataGetInput, MetadataGetStrategy,
    MetadataPatchInput, MetadataPatchStrategy, MetadataUpsertInput, MetadataUpsertStrategy,
    SearchInput, SearchStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "memoria")]
#[command(about = "memoria conversational memory engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize `~/.memoria/config.json`
    Init,
    /// Show version
    Version,
    /// Show configuration and test store connectivity
    Info,
    /// Ingest one message (§6 "Ingestion endpoint")
    Ingest {
        /// Path to a JSON file with `memoria_api::IngestRequest` shape; reads stdin if omitted
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Fetch stored memories by scope/type (§6 "Fetch endpoint")
    Fetch {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        group_id: Option<String>,
        #[arg(long)]
        memory_type: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Search memories (§6 "Search endpoint")
    Search {
        query: String,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        group_id: Option<String>,
        #[arg(long, default_value = "rrf")]
        method: String,
        #[arg(long, default_value = "episodic_memory")]
        memory_type: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Get conversation metadata for a group (absent = default config)
    MetaGet {
        #[arg(long)]
        group_id: Option<String>,
    },
    /// Create or refresh conversation metadata
    MetaUpsert {
        #[arg(long)]
        group_id: Option<String>,
        #[arg(long)]
        scene: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Patch the mutable subset of conversation metadata
    MetaPatch {
        #[arg(long)]
        group_id: Option<String>,
        /// JSON object of patchable fields
        fields: String,
    },
    /// Soft-delete memories matching a filter (§6 "Delete endpoint")
    Delete {
        #[arg(long)]
        event_id: Option<uuid::Uuid>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        group_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Ingest { file } => IngestStrategy.execute(IngestInput { file }).await,
        Commands::Fetch {
            user_id,
            group_id,
            memory_type,
            limit,
            offset,
        } => {
            FetchStrategy
                .execute(FetchInput {
                    user_id,
                    group_id,
                    memory_type,
                    limit,
                    offset,
                })
                .await
        }
        Commands::Search {
            query,
            user_id,
            group_id,
            method,
            memory_type,
            top_k,
        } => {
            SearchStrategy
                .execute(SearchInput {
                    query,
                    user_id,
                    group_id,
                    method,
                    memory_type,
                    top_k,
                })
                .await
        }
        Commands::MetaGet { group_id } => {
            MetadataGetStrategy.execute(MetadataGetInput { group_id }).await
        }
        Commands::MetaUpsert {
            group_id,
            scene,
            name,
        } => {
            MetadataUpsertStrategy
                .execute(MetadataUpsertInput {
                    group_id,
                    scene,
                    name,
                })
                .await
        }
        Commands::MetaPatch { group_id, fields } => {
            MetadataPatchStrategy
                .execute(MetadataPatchInput { group_id, fields })
                .await
        }
        Commands::Delete {
            event_id,
            user_id,
            group_id,
        } => {
            DeleteStrategy
                .execute(DeleteInput {
                    event_id,
                    user_id,
                    group_id,
                })
                .await
        }
    }
}
