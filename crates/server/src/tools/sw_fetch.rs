//! sw_fetch tool implementation.
//!
//! Dispatches a page request through the active cache controller.

use pantry_client::{ControllerConfig, ResponseSource, fetch::resolve};
use pantry_core::{CacheRequest, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::ServiceHost;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a root-relative path resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET is intercepted.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// Canonical request URL.
    pub url: String,
    pub method: String,
    /// Where the response came from.
    pub source: ResponseSource,
    /// False when the page would see a network error.
    pub has_response: bool,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Body decoded as UTF-8 (lossy).
    pub body: Option<String>,
    pub body_bytes: usize,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    host: &ServiceHost, base: &ControllerConfig, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let url = resolve(&base.origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = CacheRequest::new(params.method.trim(), url.as_str());

    let page = host.fetch(&request).await?;

    let output = match page.response {
        Some(response) => SwFetchOutput {
            url: request.url,
            method: request.method,
            source: page.source,
            has_response: true,
            status: Some(response.status),
            status_text: Some(response.status_text.clone()),
            body_bytes: response.body.len(),
            body: Some(response.text()),
            headers: response.headers.into_iter().map(|(name, value)| Header { name, value }).collect(),
        },
        None => SwFetchOutput {
            url: request.url,
            method: request.method,
            source: page.source,
            has_response: false,
            status: None,
            status_text: None,
            headers: Vec::new(),
            body: None,
            body_bytes: 0,
        },
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
