//! `MessageBuffer` (component B, §4.B, §4.B.1): per-`(group_id,
//! conversation_key)` ordered accumulation with time-gap, size, topic-shift
//! and idle flush policies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use memoria_config::BufferConfig;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::boundary::{BoundaryDecision, BoundaryDetector};
use crate::message::{Episode, Message, Scene};

type BufferKey = (Option<String>, String);

/// One partition's mutable state, protected by its own mutex so unrelated
/// partitions never contend (§5 "MessageBuffer is partitioned... Each
/// partition is protected by a mutex").
struct Partition {
    messages: Vec<Message>,
    last_append: DateTime<Utc>,
    /// Prevents a second extraction from starting for this partition while
    /// one is already in flight (§5 "A single `extraction_in_flight` marker
    /// per partition"). A message arriving mid-extraction starts a new
    /// buffer rather than waiting.
    extraction_in_flight: AtomicBool,
}

impl Partition {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_append: Utc::now(),
            extraction_in_flight: AtomicBool::new(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was buffered and does not itself close an episode.
    Accumulated,
    /// The message was buffered, but appending it first forced the prior
    /// buffer closed (hard gap, topic-shift boundary, or an already-full
    /// buffer) — `msg` itself is not a member of any of these episodes
    /// (§8 S1: the flush is a side effect, the message's own status is
    /// still `accumulated`).
    AccumulatedAfterFlush(Vec<Episode>),
    /// Appending the message filled the buffer to `max_buffer_messages`,
    /// so `msg` itself is the last message of the closed episode(s).
    Flushed(Vec<Episode>),
}

fn conversation_key(scene: Scene, msg: &Message) -> String {
    match scene {
        Scene::Assistant => msg.sender.clone(),
        Scene::GroupChat => msg.group_id.clone().unwrap_or_default(),
    }
}

/// The buffer table: an outer `RwLock<HashMap<...>>` for entry creation
/// (read lock for lookup, write lock only the first time a key is seen),
/// each partition independently mutex-guarded (§4.B.1).
pub struct MessageBuffer {
    partitions: RwLock<HashMap<BufferKey, Arc<Mutex<Partition>>>>,
    boundary: BoundaryDetector,
    config: BufferConfig,
    idle_flushing: Arc<AtomicBool>,
}

impl MessageBuffer {
    #[must_use]
    pub fn new(boundary: BoundaryDetector, config: BufferConfig) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            boundary,
            config,
            idle_flushing: Arc::new(AtomicBool::new(true)),
        }
    }

    async fn partition_for(&self, key: &BufferKey) -> Arc<Mutex<Partition>> {
        if let Some(p) = self.partitions.read().await.get(key) {
            return p.clone();
        }
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Partition::new())))
            .clone()
    }

    /// §4.B `append`: returns `queued` (Accumulated) or `flushed` with the
    /// episode(s) produced. Duplicate `message_id` within the buffer is a
    /// no-op (§4.B "Ordering").
    #[instrument(skip(self, msg), fields(message_id = %msg.message_id))]
    pub async fn append(&self, scene: Scene, msg: Message) -> AppendOutcome {
        let key = (msg.group_id.clone(), conversation_key(scene, &msg));
        let partition = self.partition_for(&key).await;
        let mut guard = partition.lock().await;

        if guard.messages.iter().any(|m| m.message_id == msg.message_id) {
            return AppendOutcome::Accumulated;
        }

        let mut prior_episodes = Vec::new();

        if guard.messages.len() + 1 > self.config.max_buffer_messages && !guard.messages.is_empty() {
            prior_episodes.push(self.flush_locked(&key, &mut guard));
        } else if !guard.messages.is_empty() {
            let gap = msg.create_time - guard.last_append;
            if gap >= Duration::seconds(self.config.gap_threshold_secs) {
                prior_episodes.push(self.flush_locked(&key, &mut guard));
            } else if self.boundary.decide(&guard.messages, &msg).await == BoundaryDecision::CloseBeforeNew {
                prior_episodes.push(self.flush_locked(&key, &mut guard));
            }
        }

        guard.messages.push(msg.clone());
        guard.last_append = msg.create_time;

        if guard.messages.len() >= self.config.max_buffer_messages {
            prior_episodes.push(self.flush_locked(&key, &mut guard));
            return AppendOutcome::Flushed(prior_episodes);
        }

        if prior_episodes.is_empty() {
            AppendOutcome::Accumulated
        } else {
            AppendOutcome::AccumulatedAfterFlush(prior_episodes)
        }
    }

    fn flush_locked(&self, key: &BufferKey, guard: &mut tokio::sync::MutexGuard<'_, Partition>) -> Episode {
        let messages = std::mem::take(&mut guard.messages);
        info!(conversation_key = %key.1, count = messages.len(), "flushing buffer partition");
        Episode::close(key.0.clone(), key.1.clone(), messages)
    }

    /// Flushes any partition whose last append is older than
    /// `idle_threshold_secs` (§4.B "Idle flush").
    pub async fn flush_idle(&self) -> Vec<Episode> {
        let now = Utc::now();
        let threshold = Duration::seconds(self.config.idle_threshold_secs);
        let keys: Vec<BufferKey> = self.partitions.read().await.keys().cloned().collect();

        let mut flushed = Vec::new();
        for key in keys {
            let partition = self.partition_for(&key).await;
            let mut guard = partition.lock().await;
            if !guard.messages.is_empty() && now - guard.last_append >= threshold {
                flushed.push(self.flush_locked(&key, &mut guard));
            }
        }
        flushed
    }

    /// Spawns the idle-flush background task (§4.B.1). `on_flush` is called
    /// with each episode produced by an idle flush (typically forwarding
    /// into the extraction pipeline).
    pub fn spawn_idle_flusher<F, Fut>(self: &Arc<Self>, on_flush: F) -> Arc<AtomicBool>
    where
        F: Fn(Episode) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let running = self.idle_flushing.clone();
        let buffer = self.clone();
        let interval_secs = self.config.idle_scan_interval_secs.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                for episode in buffer.flush_idle().await {
                    on_flush(episode).await;
                }
            }
        });
        running
    }

    pub fn stop_idle_flusher(flag: &AtomicBool) {
        flag.store(false, Ordering::SeqCst);
    }

    pub async fn mark_extraction_in_flight(&self, scene: Scene, msg: &Message) -> bool {
        let key = (msg.group_id.clone(), conversation_key(scene, msg));
        let partition = self.partition_for(&key).await;
        let guard = partition.lock().await;
        guard.extraction_in_flight.swap(true, Ordering::SeqCst)
    }

    pub async fn clear_extraction_in_flight(&self, scene: Scene, msg: &Message) {
        let key = (msg.group_id.clone(), conversation_key(scene, msg));
        let partition = self.partition_for(&key).await;
        let guard = partition.lock().await;
        guard.extraction_in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::port::PortError;
    use memoria_core::Role;

    struct NoOpEmbedder;

    #[async_trait::async_trait]
    impl memoria_core::port::EmbedderPort for NoOpEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, PortError> {
            Ok(vec![1.0])
        }
    }

    fn buffer() -> MessageBuffer {
        let boundary = BoundaryDetector::new(
            Arc::new(NoOpEmbedder),
            memoria_config::BoundaryConfig {
                hard_gap_secs: 1800,
                min_episode_messages: 3,
                topic_similarity_threshold: 0.5,
            },
        );
        MessageBuffer::new(
            boundary,
            BufferConfig {
                gap_threshold_secs: 1800,
                max_buffer_messages: 50,
                idle_threshold_secs: 600,
                idle_scan_interval_secs: 60,
                rolling_summary_chars: 2000,
            },
        )
    }

    fn msg(id: &str, offset_secs: i64) -> Message {
        Message {
            message_id: id.to_string(),
            create_time: Utc::now() + Duration::seconds(offset_secs),
            sender: "u1".to_string(),
            sender_name: None,
            role: Role::User,
            content: format!("message {id}"),
            group_id: Some("g1".to_string()),
            group_name: None,
            refer_list: Vec::new(),
        }
    }

    #[tokio::test]
    async fn s1_buffer_then_flush_on_hard_gap() {
        let buf = buffer();
        let first = msg("1", 0);
        let second = msg("2", 120);
        assert_eq!(buf.append(Scene::GroupChat, first).await, AppendOutcome::Accumulated);
        assert_eq!(buf.append(Scene::GroupChat, second).await, AppendOutcome::Accumulated);

        let third = msg("3", 2700);
        let outcome = buf.append(Scene::GroupChat, third).await;
        match outcome {
            AppendOutcome::AccumulatedAfterFlush(episodes) => {
                assert_eq!(episodes.len(), 1);
                assert_eq!(episodes[0].messages.len(), 2);
            }
            other => panic!("expected the hard-gap flush to be reported as accumulated-after-flush, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_message_id_is_idempotent() {
        let buf = buffer();
        let m = msg("1", 0);
        assert_eq!(buf.append(Scene::GroupChat, m.clone()).await, AppendOutcome::Accumulated);
        assert_eq!(buf.append(Scene::GroupChat, m).await, AppendOutcome::Accumulated);
    }

    #[tokio::test]
    async fn size_flush_at_max_buffer_messages() {
        let boundary = BoundaryDetector::new(
            Arc::new(NoOpEmbedder),
            memoria_config::BoundaryConfig {
                hard_gap_secs: 999_999,
                min_episode_messages: 999,
                topic_similarity_threshold: 0.0,
            },
        );
        let buf = MessageBuffer::new(
            boundary,
            BufferConfig {
                gap_threshold_secs: 999_999,
                max_buffer_messages: 2,
                idle_threshold_secs: 600,
                idle_scan_interval_secs: 60,
                rolling_summary_chars: 2000,
            },
        );
        assert_eq!(buf.append(Scene::GroupChat, msg("1", 0)).await, AppendOutcome::Accumulated);
        let outcome = buf.append(Scene::GroupChat, msg("2", 1)).await;
        assert!(matches!(outcome, AppendOutcome::Flushed(_)));
    }
}
