use memoria_config::Config;
use memoria_core::adaptive::CutoffStrategy;
use tracing::info;

/// Strategy for displaying configuration information and store connectivity.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== memoria Configuration ===\n");

        println!("Providers:");
        println!("  Language: {}", config.providers.language);
        println!("  LLM: {}", describe_provider(&config.providers.llm));
        println!("  Embedder: {}", describe_provider(&config.providers.embedder));
        println!("  Reranker: {}", describe_provider(&config.providers.reranker));
        println!();

        println!("Database:");
        println!("  URL: {}", mask_database_url(&config.database.url));

        info!("testing database connection");
        match sea_orm::Database::connect(&config.database.url).await {
            Ok(_) => println!("  Status: Connected"),
            Err(e) => {
                println!("  Status: Connection failed");
                println!("  Error: {e}");
            }
        }
        println!();

        println!("Buffer (§4.B):");
        println!("  Gap threshold: {}s", config.buffer.gap_threshold_secs);
        println!("  Max buffer messages: {}", config.buffer.max_buffer_messages);
        println!("  Idle threshold: {}s", config.buffer.idle_threshold_secs);
        println!();

        println!("Boundary (§4.C):");
        println!("  Hard gap: {}s", config.boundary.hard_gap_secs);
        println!("  Min episode messages: {}", config.boundary.min_episode_messages);
        println!("  Topic similarity threshold: {}", config.boundary.topic_similarity_threshold);
        println!();

        println!("Retrieval (§4.F):");
        println!("  RRF k: {}", config.retrieval.rrf_k);
        println!("  Radius: {}", config.retrieval.radius);
        println!("  Time range: {} days", config.retrieval.time_range_days);
        println!("  Adaptive enabled: {}", config.retrieval.adaptive.enabled);
        println!("  Adaptive strategy: {}", format_strategy(&config.retrieval.adaptive.strategy));
        println!();

        println!("Rerank (§4.G):");
        println!("  Batch size: {}", config.rerank.batch_size);
        println!("  Concurrency: {}", config.rerank.concurrency);
        println!();

        println!("Agentic (§4.H):");
        println!("  Round 1 cap: {}", config.agentic.round1_cap);
        println!("  Refined query cap: {}", config.agentic.refined_query_cap);
        println!();

        println!("Namespace prefix: {}", config.namespace.prefix);

        Ok(())
    }
}

fn describe_provider(provider: &memoria_config::ProviderConfig) -> String {
    if provider.base_url.is_empty() {
        "(not configured)".to_string()
    } else {
        format!("{} @ {}", provider.model, provider.base_url)
    }
}

fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let Some((credentials, after_at)) = rest.split_once('@') else {
        return url.to_string();
    };

    let Some((username, _password)) = credentials.split_once(':') else {
        return url.to_string();
    };

    format!("{scheme}://{username}:***{after_at}")
}

fn format_strategy(strategy: &CutoffStrategy) -> String {
    match strategy {
        CutoffStrategy::AbsoluteThreshold { min_score } => {
            format!("AbsoluteThreshold(min_score={min_score})")
        }
        CutoffStrategy::RelativeThreshold { min_ratio } => {
            format!("RelativeThreshold(min_ratio={min_ratio})")
        }
        CutoffStrategy::ScoreCliff { max_drop_ratio } => {
            format!("ScoreCliff(max_drop_ratio={max_drop_ratio})")
        }
        CutoffStrategy::Elbow { sensitivity } => {
            format!("Elbow(sensitivity={sensitivity})")
        }
        CutoffStrategy::Combined {
            relative_threshold,
            max_drop_ratio,
            absolute_min,
        } => format!(
            "Combined(relative_threshold={relative_threshold}, max_drop_ratio={max_drop_ratio}, absolute_min={absolute_min})"
        ),
    }
}
