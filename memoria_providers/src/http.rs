//! Generic, provider-agnostic HTTP clients for the three remote
//! collaborator ports (§4.A, §9 "Collaborator ports"). Vendor wiring is
//! explicitly out of scope (§1); this speaks the common
//! OpenAI-compatible `/chat/completions` + `/embeddings` shape and a
//! `/rerank` endpoint shape shared by most hosted rerank models, so any
//! compatible endpoint (self-hosted or vendor) can be plugged in purely
//! through `base_url`/`api_key`/`model` configuration.

use async_trait::async_trait;
use memoria_core::port::{EmbedderPort, LlmPort, PortError, RerankerPort};
use memoria_core::retry::{BackoffConfig, retry_with_backoff};
use memoria_core::{ChatMessage, LlmResponse, Role, Usage};
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    backoff: BackoffConfig,
}

impl HttpProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            backoff: BackoffConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    async fn handle_response(response: reqwest::Response) -> Result<serde_json::Value, PortError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<serde_json::Value>().await.ok();
            warn!(%status, ?body, "collaborator HTTP call failed");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(PortError::Transient {
                    collaborator: "http",
                    source: anyhow::anyhow!("HTTP {status}"),
                })
            } else {
                Err(PortError::Rejected(format!("HTTP {status}")))
            };
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PortError::Transient {
                collaborator: "http",
                source: e.into(),
            })
    }

    const fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl LlmPort for HttpProvider {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<LlmResponse, PortError> {
        let payload: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({"role": Self::role_str(m.role), "content": m.content}))
            .collect();
        let request = json!({ "model": model, "messages": payload });

        info!(model, "sending chat request");
        let url = format!("{}/chat/completions", self.base_url);
        let response = retry_with_backoff(self.backoff, || async {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| PortError::Transient {
                    collaborator: "llm",
                    source: e.into(),
                })?;
            Self::handle_response(resp).await
        })
        .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| PortError::Rejected("missing choices[0].message.content".into()))?
            .to_string();

        let usage = response.get("usage").and_then(|u| {
            Some(Usage {
                prompt_tokens: u32::try_from(u["prompt_tokens"].as_u64()?).ok()?,
                completion_tokens: u32::try_from(u["completion_tokens"].as_u64()?).ok()?,
                total_tokens: u32::try_from(u["total_tokens"].as_u64()?).ok()?,
            })
        });

        Ok(LlmResponse { content, usage })
    }
}

#[async_trait]
impl EmbedderPort for HttpProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PortError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = json!({ "model": self.model, "input": text });

        let response = retry_with_backoff(self.backoff, || async {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| PortError::Transient {
                    collaborator: "embedder",
                    source: e.into(),
                })?;
            Self::handle_response(resp).await
        })
        .await?;

        let arr = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| PortError::Rejected("missing data[0].embedding".into()))?;

        arr.iter()
            .map(|v| {
                #[allow(clippy::cast_possible_truncation)]
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| PortError::Rejected("non-numeric embedding value".into()))
            })
            .collect()
    }
}

#[async_trait]
impl RerankerPort for HttpProvider {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, PortError> {
        let url = format!("{}/rerank", self.base_url);
        let request = json!({ "model": self.model, "query": query, "documents": documents });

        let response = retry_with_backoff(self.backoff, || async {
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| PortError::Transient {
                    collaborator: "reranker",
                    source: e.into(),
                })?;
            Self::handle_response(resp).await
        })
        .await?;

        let results = response["results"]
            .as_array()
            .ok_or_else(|| PortError::Rejected("missing results".into()))?;

        let mut scores = vec![0.0_f32; documents.len()];
        for r in results {
            let Some(index) = r["index"].as_u64().and_then(|i| usize::try_from(i).ok()) else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            let score = r["relevance_score"].as_f64().unwrap_or(0.0) as f32;
            if let Some(slot) = scores.get_mut(index) {
                *slot = score;
            }
        }
        Ok(scores)
    }
}
