use memoria_api::{DeleteRequest, DeleteResponse};

use super::{CommandStrategy, Runtime};

pub struct DeleteInput {
    pub event_id: Option<uuid::Uuid>,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

/// Strategy for the delete endpoint (§6 "Delete endpoint"): soft-deletes
/// every doc-store row matching the AND-combined filter and removes the
/// matching text/vector index entries (§4.J, §8 property 6).
#[derive(Debug, Clone, Copy)]
pub struct DeleteStrategy;

impl CommandStrategy for DeleteStrategy {
    type Input = DeleteInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let request = DeleteRequest {
            event_id: input.event_id,
            user_id: input.user_id,
            group_id: input.group_id,
        };
        let filter = request.resolve().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let deleted_count = rt.memory_store.soft_delete(&filter).await?;

        let response = DeleteResponse {
            status: "ok",
            deleted_count,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}
