//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the hosting runtime.
use std::sync::Arc;

use crate::host::ServiceHost;
use crate::tools::{
    SwFetchParams, SwMessageParams, SwStatusParams, SwUpdateParams, fetch_impl, message_impl, status_impl,
    update_impl,
};

use pantry_client::ControllerConfig;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pantry-sw.
#[derive(Clone)]
pub struct PantryServer {
    tool_router: ToolRouter<Self>,
    host: Arc<ServiceHost>,
    base: ControllerConfig,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PantryServer {
    /// Create a new server handler around a running host.
    ///
    /// `base` supplies the origin for relative URLs and the settings new
    /// versions start from when nothing is active.
    pub fn new(host: Arc<ServiceHost>, base: ControllerConfig) -> Self {
        Self { tool_router: Self::tool_router(), host, base }
    }

    /// Issue a page request through the active cache controller.
    #[tool(
        description = "Fetch a URL as a controlled page would. GET requests are served network-first with cache fallback; other methods pass through."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, &self.base, params.0).await
    }

    /// Post a client message to the controller.
    #[tool(description = "Post a message to the waiting or active controller. {\"type\": \"SKIP_WAITING\"} activates a waiting version.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.host, params.0).await
    }

    /// Register a new controller version.
    #[tool(description = "Install a new cache version. It activates immediately unless it is told to wait.")]
    async fn sw_update(&self, params: Parameters<SwUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.host, &self.base, params.0).await
    }

    /// Report lifecycle state and cache stores.
    #[tool(description = "Show active and waiting versions and the cache stores that exist.")]
    async fn sw_status(&self, params: Parameters<SwStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.host, params.0).await
    }
}

impl ServerHandler for PantryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pantry-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
