//! sw_update tool implementation.
//!
//! Registers a new controller version, the way a page picks up a changed
//! worker script.

use pantry_client::ControllerConfig;
use pantry_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ServiceHost;

/// Parameters for the sw_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwUpdateParams {
    /// Cache version for the new controller.
    pub version: String,

    /// Override whether install skips waiting (default: configured value).
    #[serde(default)]
    pub skip_waiting: Option<bool>,
}

/// Implementation of the sw_update tool.
///
/// The new version inherits the active controller's settings, or `base` when
/// nothing is active yet.
pub async fn update_impl(
    host: &ServiceHost, base: &ControllerConfig, params: SwUpdateParams,
) -> Result<CallToolResult, McpError> {
    let version = params.version.trim();
    if version.is_empty() {
        return Err(Error::InvalidInput("version cannot be empty".into()).into());
    }

    let mut config = host.active_config().await.unwrap_or_else(|| base.clone()).with_version(version);
    if let Some(skip_waiting) = params.skip_waiting {
        config.skip_waiting_on_install = skip_waiting;
    }

    let registration = host.register(config).await;

    let json = serde_json::to_string_pretty(&registration)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
