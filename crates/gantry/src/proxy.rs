//! Invocable stand-ins for remote tools.
//!
//! Proxies are created while the agent graph is assembled, which in dynamic
//! mode is long before any tool exists, so construction never touches the
//! middleware's cache. Resolution happens on every call, through
//! [`McpToolsLoader::tool`]; for static mode that lookup simply always hits
//! the pre-populated cache. One implementation serves both modes.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::config::ToolFilter;
use crate::context::InvocationContext;
use crate::error::{Error, Result};
use crate::middleware::McpToolsLoader;

/// A named, user-invocable wrapper that defers to the owning middleware.
pub struct ToolProxy {
    name: String,
    middleware: Arc<McpToolsLoader>,
}

impl ToolProxy {
    /// Wrap `name`. Cheap; the remote callable is resolved at call time.
    pub fn new(name: impl Into<String>, middleware: Arc<McpToolsLoader>) -> Self {
        Self {
            name: name.into(),
            middleware,
        }
    }

    /// One proxy per requested tool name across the whole filter.
    pub fn for_filter(filter: &ToolFilter, middleware: &Arc<McpToolsLoader>) -> Vec<Self> {
        filter
            .requested()
            .into_iter()
            .map(|name| Self::new(name, Arc::clone(middleware)))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the remote tool with `args`.
    ///
    /// Checks the invocation context covers the middleware's required
    /// variables (trivially true in static mode), resolves the cached
    /// handle, and wraps any downstream failure with the tool's name.
    pub async fn invoke(
        &self,
        args: JsonMap<String, JsonValue>,
        ctx: &dyn InvocationContext,
    ) -> Result<JsonValue> {
        self.middleware.ensure_credentials(ctx.configurable())?;
        let tool = self.middleware.tool(&self.name).await?;
        tracing::debug!("invoking MCP tool '{}'", self.name);
        tool.call(args).await.map_err(|e| match e {
            already @ Error::ToolInvocation { .. } => already,
            other => Error::ToolInvocation {
                tool: self.name.clone(),
                reason: other.to_string(),
            },
        })
    }
}
