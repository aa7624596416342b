//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type implementing `CommandStrategy`,
//! enabling compile-time dispatch with no shared mutable command state.

use std::sync::Arc;

use memoria_agentic::AgenticRetriever;
use memoria_config::Config;
use memoria_core::port::{EmbedderPort, LlmPort, RerankerPort, TextIndexPort, VectorIndexPort};
use memoria_ingest::{BoundaryDetector, ConversationMeta, Episode, Extractor, MessageBuffer, ProfileBuilder};
use memoria_memory::{
    BM25TextIndex, BruteForceVectorIndex, ConversationMetaStore, EpisodicMemoryStore, EventLogStore, ForesightStore,
    HybridRetriever, MemoryStore, ProfileStore, RerankStage, SemanticMemoryStore,
};
use memoria_providers::HttpProvider;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

mod delete;
mod fetch;
mod info;
mod init;
mod ingest;
mod metadata;
mod search;
mod version;

pub use delete::{DeleteInput, DeleteStrategy};
pub use fetch::{FetchInput, FetchStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use ingest::{IngestInput, IngestStrategy};
pub use metadata::{
    MetadataGetInput, MetadataGetStrategy, MetadataPatchInput, MetadataPatchStrategy, MetadataUpsertInput,
    MetadataUpsertStrategy,
};
pub use search::{SearchInput, SearchStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// Each strategy defines its own input type via associated type, so adding a
/// new command requires only implementing this trait.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// The full collaborator graph a command needs, assembled fresh per
/// invocation (§2.1 "a minimal CLI demonstrating ingest/search wiring").
pub struct Runtime {
    pub config: Config,
    pub memory_store: Arc<MemoryStore>,
    pub hybrid: Arc<HybridRetriever>,
    pub rerank: Arc<RerankStage>,
    pub agentic: Arc<AgenticRetriever>,
    pub conversation_meta: Arc<ConversationMetaStore>,
    pub buffer: Arc<MessageBuffer>,
    pub extractor: Arc<Extractor>,
    pub profile_builder: Arc<ProfileBuilder>,
}

impl Runtime {
    /// Loads `~/.memoria/config.json`, opens the database connection, and
    /// wires every collaborator port into the B/C/D/E/F/G/H/I pipeline
    /// (§4.A "Collaborator ports").
    pub async fn connect() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let db: DatabaseConnection = Database::connect(&config.database.url).await?;

        let llm: Arc<dyn LlmPort> = Arc::new(HttpProvider::new(
            config.providers.llm.base_url.clone(),
            config.providers.llm.api_key.clone(),
            config.providers.llm.model.clone(),
        ));
        let embedder: Arc<dyn EmbedderPort> = Arc::new(HttpProvider::new(
            config.providers.embedder.base_url.clone(),
            config.providers.embedder.api_key.clone(),
            config.providers.embedder.model.clone(),
        ));
        let reranker: Arc<dyn RerankerPort> = Arc::new(HttpProvider::new(
            config.providers.reranker.base_url.clone(),
            config.providers.reranker.api_key.clone(),
            config.providers.reranker.model.clone(),
        ));

        let episodic = Arc::new(EpisodicMemoryStore::new(db.clone()));
        let event_log = Arc::new(EventLogStore::new(db.clone()));
        let semantic = Arc::new(SemanticMemoryStore::new(db.clone()));
        let profile = Arc::new(ProfileStore::new(db.clone()));
        let foresight = Arc::new(ForesightStore::new(db.clone()));
        let conversation_meta = Arc::new(ConversationMetaStore::new(db.clone()));

        let text_index: Arc<dyn TextIndexPort> = Arc::new(BM25TextIndex::new());
        let vector_index: Arc<dyn VectorIndexPort> = Arc::new(BruteForceVectorIndex::new());

        let memory_store = Arc::new(MemoryStore::new(
            episodic,
            event_log,
            semantic,
            profile.clone(),
            foresight,
            text_index.clone(),
            vector_index.clone(),
            embedder.clone(),
        ));

        let hybrid = Arc::new(HybridRetriever::new(
            text_index,
            vector_index,
            embedder.clone(),
            config.retrieval.clone(),
        ));
        let rerank = Arc::new(RerankStage::new(reranker, config.rerank.clone()));
        let agentic = Arc::new(AgenticRetriever::new(
            hybrid.clone(),
            rerank.clone(),
            memory_store.clone(),
            llm.clone(),
            config.agentic.clone(),
        ));

        let boundary = BoundaryDetector::new(embedder.clone(), config.boundary.clone());
        let buffer = Arc::new(MessageBuffer::new(boundary, config.buffer.clone()));
        let extractor = Arc::new(Extractor::new(
            llm,
            config.extraction.clone(),
            config.providers.llm.model.clone(),
        ));
        let profile_builder = Arc::new(ProfileBuilder::new(
            profile,
            config.profile.clone(),
            config.extraction.provenance_cap,
        ));

        Ok(Self {
            config,
            memory_store,
            hybrid,
            rerank,
            agentic,
            conversation_meta,
            buffer,
            extractor,
            profile_builder,
        })
    }

    /// Runs an episode through the Extractor and persists every resulting
    /// memory plus profile patch (§4.D, §4.E, §4.I). Returns the ids of
    /// every row written, in `episodic, facts..., semantic..., foresights...`
    /// order.
    pub async fn extract_and_store(&self, episode: &Episode, meta: &ConversationMeta) -> anyhow::Result<Vec<Uuid>> {
        let result = self.extractor.extract(episode, meta).await;
        let mut saved = vec![self.memory_store.put_episodic(result.episodic).await?];

        for fact in result.facts {
            saved.push(self.memory_store.put_event_log(fact).await?);
        }
        for semantic in result.semantic {
            saved.push(self.memory_store.put_semantic(semantic).await?);
        }
        for foresight in result.foresights {
            saved.push(self.memory_store.put_foresight(foresight).await?);
        }

        self.profile_builder.apply_patches(result.profile_patches).await?;
        Ok(saved)
    }
}
