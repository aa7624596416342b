use std::io::Read as _;

use memoria_api::IngestResponse;
use memoria_ingest::{AppendOutcome, ConversationMeta};

use super::{CommandStrategy, Runtime};

pub struct IngestInput {
    pub file: Option<String>,
}

/// Strategy for the ingestion endpoint (§6 "Ingestion endpoint"): reads one
/// `IngestRequest`-shaped JSON document, appends it to the sender's buffer
/// partition, and runs extraction whenever that append closes an episode.
#[derive(Debug, Clone, Copy)]
pub struct IngestStrategy;

impl CommandStrategy for IngestStrategy {
    type Input = IngestInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let raw = read_input(input.file.as_deref())?;
        let request: memoria_api::IngestRequest = serde_json::from_str(&raw)?;
        let message = request.into_message().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let meta_row = rt.conversation_meta.get_by_group(message.group_id.as_deref()).await?;
        let meta: ConversationMeta = meta_row.map(Into::into).unwrap_or_default();

        let response = match rt.buffer.append(meta.scene, message).await {
            AppendOutcome::Accumulated => IngestResponse::accumulated(),
            // §8 S1: a prior buffer closing as a side effect of this append is
            // still extracted and persisted, but *this* message's own status
            // is `accumulated` — it did not close its own episode.
            AppendOutcome::AccumulatedAfterFlush(episodes) => {
                for episode in episodes {
                    rt.extract_and_store(&episode, &meta).await?;
                }
                IngestResponse::accumulated()
            }
            AppendOutcome::Flushed(episodes) => {
                let mut saved = Vec::new();
                for episode in episodes {
                    saved.extend(rt.extract_and_store(&episode, &meta).await?);
                }
                IngestResponse::extracted(saved)
            }
        };

        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}

fn read_input(file: Option<&str>) -> anyhow::Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
