//! Remote catalog client over streamable HTTP.
//!
//! The wire protocol is a seam: the loader and middleware depend only on
//! [`ToolCatalog`], and [`RmcpCatalog`] is the shipped implementation that
//! speaks MCP via rmcp's reqwest-backed streamable-HTTP transport. Tests
//! substitute their own catalog.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{Error, Result};
use crate::mcp::types::{RemoteTool, ResolvedServer, ToolHandle};

type McpSession = RunningService<RoleClient, ()>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens sessions to resolved servers and returns their combined catalogs.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Open one session per server and return the union of the tool
    /// catalogs they expose. No credential is invented at this layer:
    /// authentication is whatever the caller already resolved into the
    /// descriptors' headers.
    async fn connect(&self, servers: &[ResolvedServer]) -> Result<Vec<ToolHandle>>;
}

impl std::fmt::Debug for dyn ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ToolCatalog")
    }
}

/// rmcp-backed [`ToolCatalog`] for streamable-HTTP servers.
pub struct RmcpCatalog {
    connect_timeout: Duration,
}

impl RmcpCatalog {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for RmcpCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl ToolCatalog for RmcpCatalog {
    async fn connect(&self, servers: &[ResolvedServer]) -> Result<Vec<ToolHandle>> {
        let mut set = tokio::task::JoinSet::new();
        for (idx, server) in servers.iter().cloned().enumerate() {
            let connect_timeout = self.connect_timeout;
            set.spawn(async move { (idx, fetch_server_tools(server, connect_timeout).await) });
        }

        // Fetches complete in any order; reassemble in input order so the
        // combined catalog is deterministic.
        let mut batches: Vec<Vec<ToolHandle>> = Vec::new();
        batches.resize_with(servers.len(), Vec::new);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(batch))) => batches[idx] = batch,
                Ok((_, Err(e))) => return Err(e),
                Err(e) => {
                    return Err(Error::ToolLoadFailed(format!("catalog task join error: {e}")));
                }
            }
        }
        Ok(batches.into_iter().flatten().collect())
    }
}

async fn fetch_server_tools(
    server: ResolvedServer,
    connect_timeout: Duration,
) -> Result<Vec<ToolHandle>> {
    let mut headers = reqwest::header::HeaderMap::new();
    for (key, value) in &server.headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            Error::InvalidConfiguration(format!(
                "server '{}': invalid header name '{}': {}",
                server.name, key, e
            ))
        })?;
        let value: reqwest::header::HeaderValue = value.parse().map_err(|e| {
            Error::InvalidConfiguration(format!(
                "server '{}': invalid value for header '{}': {}",
                server.name, key, e
            ))
        })?;
        headers.insert(name, value);
    }

    let http = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| {
            Error::ToolLoadFailed(format!("server '{}': build HTTP client: {}", server.name, e))
        })?;

    tracing::debug!(
        "connecting to MCP server '{}' via {} at {}",
        server.name,
        server.transport,
        server.url
    );
    let config = StreamableHttpClientTransportConfig::with_uri(server.url.to_string());
    let transport = StreamableHttpClientTransport::with_client(http, config);
    let session: McpSession = ().serve(transport).await.map_err(|e| {
        Error::ToolLoadFailed(format!(
            "server '{}': initialize client: {}. Check MCP server connectivity \
             and authentication",
            server.name, e
        ))
    })?;
    let session = Arc::new(session);

    let listed = session.peer().list_all_tools().await.map_err(|e| {
        Error::ToolLoadFailed(format!("server '{}': list tools: {}", server.name, e))
    })?;
    tracing::info!(
        "retrieved {} tool(s) from server '{}': {:?}",
        listed.len(),
        server.name,
        listed.iter().map(|t| t.name.as_ref()).collect::<Vec<_>>()
    );

    Ok(listed
        .into_iter()
        .map(|tool| {
            Arc::new(SessionTool {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                session: Arc::clone(&session),
            }) as ToolHandle
        })
        .collect())
}

/// A catalog entry bound to the session it was discovered on. The session
/// stays open as long as any of its tools remain cached.
struct SessionTool {
    name: String,
    description: Option<String>,
    session: Arc<McpSession>,
}

#[async_trait]
impl RemoteTool for SessionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    async fn call(&self, args: JsonMap<String, JsonValue>) -> Result<JsonValue> {
        let request = CallToolRequestParam {
            name: Cow::Owned(self.name.clone()),
            arguments: Some(args),
        };
        let result = self.session.call_tool(request).await.map_err(|e| {
            Error::ToolInvocation {
                tool: self.name.clone(),
                reason: e.to_string(),
            }
        })?;
        if result.is_error.unwrap_or(false) {
            let detail = serde_json::to_string(&result.content).unwrap_or_default();
            return Err(Error::ToolInvocation {
                tool: self.name.clone(),
                reason: format!("server reported an error: {detail}"),
            });
        }
        serde_json::to_value(result).map_err(|e| Error::ToolInvocation {
            tool: self.name.clone(),
            reason: format!("unserializable result: {e}"),
        })
    }
}
