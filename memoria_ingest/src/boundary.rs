//! `BoundaryDetector` (component C, §4.C, §4.C.1): decides episode closure
//! from the buffered messages plus the incoming one.

use std::sync::Arc;

use chrono::Duration;
use memoria_config::BoundaryConfig;
use memoria_core::port::EmbedderPort;
use memoria_memory::cosine_similarity;

use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryDecision {
    Open,
    CloseBeforeNew,
    CloseAfterNew,
}

pub struct BoundaryDetector {
    embedder: Arc<dyn EmbedderPort>,
    config: BoundaryConfig,
}

impl BoundaryDetector {
    #[must_use]
    pub const fn new(embedder: Arc<dyn EmbedderPort>, config: BoundaryConfig) -> Self {
        Self { embedder, config }
    }

    /// §4.C algorithm. A single-message buffer never closes on the soft-gap
    /// heuristic (step 2 requires `min_episode_messages`); normal
    /// user/assistant turn-taking in assistant scene is not itself grounds
    /// for closing — only a hard gap or a genuine topic shift is.
    pub async fn decide(&self, buffer: &[Message], incoming: &Message) -> BoundaryDecision {
        let Some(last) = buffer.last() else {
            return BoundaryDecision::Open;
        };

        let gap = incoming.create_time - last.create_time;
        if gap >= Duration::seconds(self.config.hard_gap_secs) {
            return BoundaryDecision::CloseBeforeNew;
        }

        if buffer.len() < self.config.min_episode_messages {
            return BoundaryDecision::Open;
        }

        let refer_chain_intact = !incoming.refer_list.is_empty()
            && incoming
                .refer_list
                .iter()
                .any(|id| buffer.iter().any(|m| &m.message_id == id));
        if refer_chain_intact {
            return BoundaryDecision::Open;
        }

        let rolling_summary = rolling_summary(buffer, self.config_chars());
        let (Ok(summary_embedding), Ok(message_embedding)) = (
            self.embedder.embed(&rolling_summary).await,
            self.embedder.embed(&incoming.content).await,
        ) else {
            // Embedder unavailable: fall through to open rather than block
            // ingestion on a collaborator-port failure (§7 "retrieval
            // tolerates the absence of one modality").
            return BoundaryDecision::Open;
        };

        if cosine_similarity(&summary_embedding, &message_embedding) < self.config.topic_similarity_threshold {
            BoundaryDecision::CloseBeforeNew
        } else {
            BoundaryDecision::Open
        }
    }

    const fn config_chars(&self) -> usize {
        2000
    }
}

/// Rolling summary text (§4.C.1): the buffer's messages concatenated in
/// order and truncated to `max_chars`, maintained as a cheap derived value
/// rather than a fresh LLM call per message.
#[must_use]
pub fn rolling_summary(buffer: &[Message], max_chars: usize) -> String {
    let mut text = String::new();
    for msg in buffer {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&msg.content);
    }
    if text.len() > max_chars {
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= max_chars)
            .last()
            .unwrap_or(0);
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memoria_core::port::PortError;
    use memoria_core::Role;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait::async_trait]
    impl EmbedderPort for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, PortError> {
            Ok(self.0.clone())
        }
    }

    fn msg(id: &str, content: &str, offset_secs: i64) -> Message {
        Message {
            message_id: id.to_string(),
            create_time: Utc::now() + Duration::seconds(offset_secs),
            sender: "u1".to_string(),
            sender_name: None,
            role: Role::User,
            content: content.to_string(),
            group_id: None,
            group_name: None,
            refer_list: Vec::new(),
        }
    }

    #[tokio::test]
    async fn hard_gap_closes_before_new() {
        let detector = BoundaryDetector::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), BoundaryConfig {
            hard_gap_secs: 60,
            min_episode_messages: 3,
            topic_similarity_threshold: 0.5,
        });
        let buffer = vec![msg("1", "hi", 0)];
        let incoming = msg("2", "hello again", 3600);
        assert_eq!(detector.decide(&buffer, &incoming).await, BoundaryDecision::CloseBeforeNew);
    }

    #[tokio::test]
    async fn single_message_buffer_never_soft_closes() {
        let detector = BoundaryDetector::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), BoundaryConfig {
            hard_gap_secs: 3600,
            min_episode_messages: 3,
            topic_similarity_threshold: 0.99,
        });
        let buffer = vec![msg("1", "hi", 0)];
        let incoming = msg("2", "totally different topic", 10);
        assert_eq!(detector.decide(&buffer, &incoming).await, BoundaryDecision::Open);
    }

    #[tokio::test]
    async fn topic_shift_below_threshold_closes() {
        struct ShiftingEmbedder;
        #[async_trait::async_trait]
        impl EmbedderPort for ShiftingEmbedder {
            async fn embed(&self, text: &str) -> Result<Vec<f32>, PortError> {
                if text.contains("unrelated") {
                    Ok(vec![0.0, 1.0])
                } else {
                    Ok(vec![1.0, 0.0])
                }
            }
        }

        let detector = BoundaryDetector::new(Arc::new(ShiftingEmbedder), BoundaryConfig {
            hard_gap_secs: 3600,
            min_episode_messages: 2,
            topic_similarity_threshold: 0.5,
        });
        let buffer = vec![msg("1", "talking about hiking", 0), msg("2", "more hiking", 5)];
        let incoming = msg("3", "totally unrelated content", 10);
        assert_eq!(detector.decide(&buffer, &incoming).await, BoundaryDecision::CloseBeforeNew);
    }
}
