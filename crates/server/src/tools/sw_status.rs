//! sw_status tool implementation.
//!
//! Reports the lifecycle state and the cache stores on disk.

use pantry_core::{CacheRequest, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::{HostStatus, ServiceHost};

/// Parameters for the sw_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusParams {
    /// Also list the requests held by each store.
    #[serde(default)]
    pub include_requests: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreContents {
    pub store: String,
    pub requests: Vec<CacheRequest>,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    #[serde(flatten)]
    pub status: HostStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<StoreContents>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(host: &ServiceHost, params: SwStatusParams) -> Result<CallToolResult, McpError> {
    let status = host.status().await?;

    let mut contents = Vec::new();
    if params.include_requests {
        for store in &status.stores {
            contents.push(StoreContents { store: store.clone(), requests: host.store_requests(store).await? });
        }
    }

    let output = SwStatusOutput { status, contents };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
