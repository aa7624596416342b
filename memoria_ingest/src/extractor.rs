//! `Extractor` (component D, §4.D, §4.D.1, §4.D.2): turns a closed episode
//! into typed memory records plus a side-effect list of profile patches.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use memoria_config::ExtractionConfig;
use memoria_core::port::LlmPort;
use memoria_core::retry::{retry_with_backoff, BackoffConfig};
use memoria_core::{ChatMessage, Role};
use memoria_entities::{episodic_memory, event_log, foresight, semantic_memory};
use memoria_memory::SchemaRegistry;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::json_contract::parse_llm_json;
use crate::message::{ConversationMeta, Episode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Complete,
    Partial,
    Failed,
}

impl ExtractionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// A profile delta emitted as a side effect of extraction (§4.I,
/// §4.I.1 "the Extractor emits `ProfilePatch` values synchronously as part
/// of its `extract` return value").
#[derive(Debug, Clone)]
pub struct ProfilePatch {
    pub user_id: String,
    pub group_id: Option<String>,
    pub attribute_path: String,
    pub value: serde_json::Value,
    pub provenance_memory_id: Uuid,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ExtractionResult {
    pub episodic: episodic_memory::Model,
    pub facts: Vec<event_log::Model>,
    pub semantic: Vec<semantic_memory::Model>,
    pub foresights: Vec<foresight::Model>,
    pub profile_patches: Vec<ProfilePatch>,
    pub extraction_status: ExtractionStatus,
}

pub struct Extractor {
    llm: Arc<dyn LlmPort>,
    schema: SchemaRegistry,
    config: ExtractionConfig,
    model: String,
}

#[derive(Deserialize)]
struct EpisodicSummaryResponse {
    summary: String,
    importance: f64,
    #[serde(default)]
    #[allow(dead_code)]
    salient_user_ids: Vec<String>,
}

#[derive(Deserialize)]
struct AtomicFactResponse {
    subject: String,
    predicate: String,
    object: String,
    time: Option<String>,
}

#[derive(Deserialize)]
struct SemanticResponse {
    subject: String,
    statement: String,
    confidence: f64,
    valid_from: String,
    valid_to: Option<String>,
}

#[derive(Deserialize)]
struct ProfileHintResponse {
    user_id: String,
    attribute_path: String,
    value: serde_json::Value,
    confidence: f64,
}

#[derive(Deserialize)]
struct ForesightResponse {
    user_id: String,
    event_time: String,
    content: String,
}

impl Extractor {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmPort>, config: ExtractionConfig, model: impl Into<String>) -> Self {
        let schema = if config.strict_schema {
            SchemaRegistry::new().strict()
        } else {
            SchemaRegistry::new()
        };
        Self {
            llm,
            schema,
            config,
            model: model.into(),
        }
    }

    /// §4.D: at most one `EpisodicMemory`, plus zero or more facts/semantic
    /// rows/foresights. A persistently-failing sub-step degrades
    /// `extraction_status` rather than aborting the whole extraction.
    #[tracing::instrument(skip(self, episode, meta), fields(episode_id = %episode.episode_id))]
    pub async fn extract(&self, episode: &Episode, meta: &ConversationMeta) -> ExtractionResult {
        let preamble = render_preamble(episode, meta);
        let backoff = BackoffConfig::default();

        let summary_outcome = self.summarize_episode(&preamble, backoff).await;
        let facts_outcome = self.extract_facts(&preamble, episode, backoff).await;
        let semantic_outcome = self.abstract_semantic(&preamble, episode, backoff).await;
        let profile_outcome = self.extract_profile_hints(&preamble, episode, backoff).await;
        let foresight_outcome = self.detect_foresight(&preamble, episode, backoff).await;

        let succeeded = [
            summary_outcome.is_some(),
            facts_outcome.is_some(),
            semantic_outcome.is_some(),
            profile_outcome.is_some(),
            foresight_outcome.is_some(),
        ];
        let status = if succeeded.iter().all(|&ok| ok) {
            ExtractionStatus::Complete
        } else if succeeded.iter().any(|&ok| ok) {
            ExtractionStatus::Partial
        } else {
            ExtractionStatus::Failed
        };

        let (summary, importance) = summary_outcome
            .map(|r| (r.summary, r.importance.clamp(0.0, 1.0)))
            .unwrap_or_else(|| (fallback_summary(episode), 0.0));

        let user_id = episode
            .messages
            .first()
            .map_or_else(|| episode.conversation_key.clone(), |m| m.sender.clone());
        let source_message_ids: Vec<String> = episode.messages.iter().map(|m| m.message_id.clone()).collect();

        let now = Utc::now();
        let episodic = episodic_memory::Model {
            id: Uuid::now_v7(),
            episode_id: episode.episode_id,
            user_id,
            group_id: episode.group_id.clone(),
            timestamp: episode.end_time,
            summary,
            content: render_transcript(episode),
            source_message_ids: serde_json::json!(source_message_ids),
            importance,
            extraction_status: status.as_str().to_string(),
            content_hash: String::new(),
            reinforcement_count: 0,
            index_pending: false,
            deleted: false,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let facts = facts_outcome
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| self.build_fact(f, episode))
            .collect();

        let semantic = semantic_outcome
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| build_semantic(s, episode))
            .collect();

        let foresights = foresight_outcome
            .unwrap_or_default()
            .into_iter()
            .filter_map(|f| build_foresight(f, episode))
            .collect();

        let profile_patches = profile_outcome
            .unwrap_or_default()
            .into_iter()
            .map(|p| ProfilePatch {
                user_id: p.user_id,
                group_id: episode.group_id.clone(),
                attribute_path: p.attribute_path,
                value: p.value,
                provenance_memory_id: episodic.id,
                confidence: p.confidence.clamp(0.0, 1.0),
                timestamp: now,
            })
            .collect();

        ExtractionResult {
            episodic,
            facts,
            semantic,
            foresights,
            profile_patches,
            extraction_status: status,
        }
    }

    async fn summarize_episode(&self, preamble: &str, backoff: BackoffConfig) -> Option<EpisodicSummaryResponse> {
        let prompt = format!(
            "{preamble}\n\nSummarize this episode as JSON: {{\"summary\": string, \"importance\": number in [0,1], \"salient_user_ids\": [string]}}."
        );
        self.call_llm_step(&prompt, backoff, "episodic_summary").await
    }

    async fn extract_facts(
        &self,
        preamble: &str,
        episode: &Episode,
        backoff: BackoffConfig,
    ) -> Option<Vec<AtomicFactResponse>> {
        let prompt = format!(
            "{preamble}\n\nExtract atomic facts as a JSON array of {{\"subject\": string, \"predicate\": string, \"object\": string, \"time\": string|null}}. Resolve relative times against {}.",
            episode.end_time.to_rfc3339()
        );
        self.call_llm_step(&prompt, backoff, "atomic_facts").await
    }

    async fn abstract_semantic(
        &self,
        preamble: &str,
        episode: &Episode,
        backoff: BackoffConfig,
    ) -> Option<Vec<SemanticResponse>> {
        let prompt = format!(
            "{preamble}\n\nAbstract stable long-term statements as a JSON array of {{\"subject\": string, \"statement\": string, \"confidence\": number, \"valid_from\": string, \"valid_to\": string|null}}. Default valid_from to {}.",
            episode.end_time.to_rfc3339()
        );
        self.call_llm_step(&prompt, backoff, "semantic_abstraction").await
    }

    async fn extract_profile_hints(
        &self,
        preamble: &str,
        _episode: &Episode,
        backoff: BackoffConfig,
    ) -> Option<Vec<ProfileHintResponse>> {
        let prompt = format!(
            "{preamble}\n\nEmit profile hints as a JSON array of {{\"user_id\": string, \"attribute_path\": string, \"value\": any, \"confidence\": number}}."
        );
        self.call_llm_step(&prompt, backoff, "profile_hints").await
    }

    async fn detect_foresight(
        &self,
        preamble: &str,
        episode: &Episode,
        backoff: BackoffConfig,
    ) -> Option<Vec<ForesightResponse>> {
        let prompt = format!(
            "{preamble}\n\nList future-dated commitments as a JSON array of {{\"user_id\": string, \"event_time\": string, \"content\": string}}, only events after {}.",
            episode.end_time.to_rfc3339()
        );
        self.call_llm_step(&prompt, backoff, "foresight").await
    }

    async fn call_llm_step<T: serde::de::DeserializeOwned>(
        &self,
        prompt: &str,
        backoff: BackoffConfig,
        step: &'static str,
    ) -> Option<T> {
        let messages = vec![ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        }];
        let result = retry_with_backoff(backoff, || self.llm.chat(&messages, &self.model)).await;
        match result {
            Ok(response) => parse_llm_json(&response.content).or_else(|| {
                warn!(step, "LLM response failed JSON-contract parsing");
                None
            }),
            Err(e) => {
                warn!(step, "extraction sub-step exhausted retries: {e}");
                None
            }
        }
    }

    /// §4.D.1: validates `object` against `predicate`'s schema, dropping
    /// only the offending fact rather than failing the whole step.
    fn build_fact(&self, fact: AtomicFactResponse, episode: &Episode) -> Option<event_log::Model> {
        if let Err(e) = self.schema.validate_fact(&fact.predicate, &fact.object) {
            warn!("dropping fact with invalid predicate/object: {e}");
            return None;
        }

        let time = fact
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map_or(episode.end_time, |t| t.with_timezone(&Utc));

        Some(event_log::Model {
            id: Uuid::now_v7(),
            episode_id: episode.episode_id,
            subject: fact.subject,
            predicate: fact.predicate,
            object: fact.object,
            time,
            group_id: episode.group_id.clone(),
            source_message_ids: serde_json::json!(episode
                .messages
                .iter()
                .map(|m| m.message_id.clone())
                .collect::<Vec<_>>()),
            content_hash: String::new(),
            reinforcement_count: 0,
            index_pending: false,
            deleted: false,
            version: 1,
            created_at: Utc::now(),
        })
    }
}

fn build_semantic(resp: SemanticResponse, episode: &Episode) -> Option<semantic_memory::Model> {
    let valid_from = DateTime::parse_from_rfc3339(&resp.valid_from)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(episode.end_time);
    let valid_to = resp
        .valid_to
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));

    let now = Utc::now();
    Some(semantic_memory::Model {
        id: Uuid::now_v7(),
        subject: resp.subject,
        statement: resp.statement,
        confidence: resp.confidence.clamp(0.0, 1.0),
        valid_from,
        valid_to,
        group_id: episode.group_id.clone(),
        source_episode_ids: serde_json::json!([episode.episode_id]),
        content_hash: String::new(),
        reinforcement_count: 0,
        index_pending: false,
        deleted: false,
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

fn build_foresight(resp: ForesightResponse, episode: &Episode) -> Option<foresight::Model> {
    let event_time = DateTime::parse_from_rfc3339(&resp.event_time)
        .map(|t| t.with_timezone(&Utc))
        .ok()?;
    if event_time <= episode.end_time {
        return None;
    }
    Some(foresight::Model {
        id: Uuid::now_v7(),
        user_id: resp.user_id,
        group_id: episode.group_id.clone(),
        event_time,
        content: resp.content,
        content_hash: String::new(),
        index_pending: false,
        deleted: false,
        version: 1,
        created_at: Utc::now(),
    })
}

fn fallback_summary(episode: &Episode) -> String {
    episode
        .messages
        .first()
        .map_or_else(String::new, |m| m.content.chars().take(200).collect())
}

/// §4.D step 1: compact transcript with localized timestamps, participant
/// display names, and optional `scene_desc`.
fn render_preamble(episode: &Episode, meta: &ConversationMeta) -> String {
    let mut out = String::new();
    if let Some(desc) = &meta.scene_desc {
        out.push_str(desc);
        out.push('\n');
    }
    out.push_str(&render_transcript(episode));
    out
}

fn render_transcript(episode: &Episode) -> String {
    episode
        .messages
        .iter()
        .map(|m| {
            let who = m.sender_name.as_deref().unwrap_or(&m.sender);
            format!("[{}] {}: {}", m.create_time.to_rfc3339(), who, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::port::PortError;
    use memoria_core::LlmResponse;

    fn episode() -> Episode {
        Episode::close(
            Some("g1".to_string()),
            "g1".to_string(),
            vec![crate::message::Message {
                message_id: "1".to_string(),
                create_time: Utc::now(),
                sender: "u1".to_string(),
                sender_name: Some("Alice".to_string()),
                role: Role::User,
                content: "I love hiking on weekends".to_string(),
                group_id: Some("g1".to_string()),
                group_name: None,
                refer_list: Vec::new(),
            }],
        )
    }

    #[tokio::test]
    async fn all_steps_failing_yields_failed_status_with_fallback_summary() {
        struct AlwaysFailLlm;
        #[async_trait::async_trait]
        impl LlmPort for AlwaysFailLlm {
            async fn chat(&self, _messages: &[ChatMessage], _model: &str) -> Result<LlmResponse, PortError> {
                Err(PortError::Rejected("no".to_string()))
            }
        }

        let extractor = Extractor::new(Arc::new(AlwaysFailLlm), ExtractionConfig::default(), "test-model");
        let ep = episode();
        let meta = ConversationMeta::default();
        let result = extractor.extract(&ep, &meta).await;

        assert_eq!(result.extraction_status, ExtractionStatus::Failed);
        assert!(result.episodic.summary.contains("hiking"));
        assert!(result.facts.is_empty());
    }
}
