use memoria_api::{MetadataResponse, PatchRequest, UpsertRequest};

use super::{CommandStrategy, Runtime};

pub struct MetadataGetInput {
    pub group_id: Option<String>,
}

/// Strategy for the metadata GET endpoint (§6 "Metadata endpoints").
#[derive(Debug, Clone, Copy)]
pub struct MetadataGetStrategy;

impl CommandStrategy for MetadataGetStrategy {
    type Input = MetadataGetInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let rt = Runtime::connect().await?;
        let row = rt
            .conversation_meta
            .get_by_group(input.group_id.as_deref())
            .await?
            .ok_or_else(|| anyhow::anyhow!("no conversation metadata found for group {:?}", input.group_id))?;

        let response = MetadataResponse {
            status: "ok",
            conversation_meta: row,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}

pub struct MetadataUpsertInput {
    pub group_id: Option<String>,
    pub scene: String,
    pub name: Option<String>,
}

/// Strategy for the metadata upsert endpoint (§3 "created via upsert on
/// `group_id`"; immutable fields frozen after first creation).
#[derive(Debug, Clone, Copy)]
pub struct MetadataUpsertStrategy;

impl CommandStrategy for MetadataUpsertStrategy {
    type Input = MetadataUpsertInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let request = UpsertRequest {
            group_id: input.group_id,
            scene: input.scene,
            scene_desc: None,
            name: input.name,
            description: None,
            default_timezone: "UTC".to_string(),
            user_details: serde_json::json!({}),
            tags: serde_json::json!([]),
        };
        let model = request.into_model().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let row = rt.conversation_meta.upsert(model).await?;

        let response = MetadataResponse {
            status: "ok",
            conversation_meta: row,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}

pub struct MetadataPatchInput {
    pub group_id: Option<String>,
    pub fields: String,
}

/// Strategy for the metadata PATCH endpoint (§6, §8 property 7): only the
/// patchable subset of fields may be mutated post-creation.
#[derive(Debug, Clone, Copy)]
pub struct MetadataPatchStrategy;

impl CommandStrategy for MetadataPatchStrategy {
    type Input = MetadataPatchInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let fields: serde_json::Value = serde_json::from_str(&input.fields)?;
        let request = PatchRequest {
            group_id: input.group_id,
            fields,
        };
        request.validate().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let row = rt
            .conversation_meta
            .patch_fields(request.group_id.as_deref(), request.fields)
            .await?;

        let response = MetadataResponse {
            status: "ok",
            conversation_meta: row,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}
