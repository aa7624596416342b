use memoria_api::{FetchRequest, FetchResponse};
use memoria_memory::{SortBy, SortOrder};

use super::{CommandStrategy, Runtime};

pub struct FetchInput {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub memory_type: String,
    pub limit: usize,
    pub offset: usize,
}

/// Strategy for the fetch endpoint (§6 "Fetch endpoint"): paginated,
/// sorted reads of one memory table scoped by `user_id`/`group_id`.
#[derive(Debug, Clone, Copy)]
pub struct FetchStrategy;

impl CommandStrategy for FetchStrategy {
    type Input = FetchInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let request = FetchRequest {
            user_id: input.user_id,
            group_id: input.group_id,
            memory_type: input.memory_type,
            limit: input.limit,
            offset: input.offset,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            start_time: None,
            end_time: None,
            version_range: None,
        };
        let resolved = request.resolve().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let rows = rt
            .memory_store
            .fetch(
                resolved.data_source,
                &resolved.filter,
                resolved.version_range,
                resolved.sort_by,
                resolved.sort_order,
                resolved.limit,
                resolved.offset,
            )
            .await?;

        let response = FetchResponse { status: "ok", rows };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}
