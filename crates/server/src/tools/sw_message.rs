//! sw_message tool implementation.
//!
//! Posts a client message to the waiting (or active) controller.

use pantry_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ServiceHost;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Structured payload, e.g. `{"type": "SKIP_WAITING"}`.
    pub payload: serde_json::Value,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(host: &ServiceHost, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let delivery = host.post_message(&params.payload).await;

    let json = serde_json::to_string_pretty(&delivery)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
