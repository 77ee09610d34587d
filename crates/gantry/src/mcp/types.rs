//! Shared types for remote tool loading.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};
use url::Url;

use crate::config::{ServerConfig, Transport};
use crate::error::Result;

/// Fully resolved connection descriptor for one server: every template
/// placeholder already substituted. Built per load and discarded with it;
/// never stored on the middleware.
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub name: String,
    pub transport: Transport,
    pub url: Url,
    pub headers: HashMap<String, String>,
}

impl ResolvedServer {
    pub fn from_config(name: &str, cfg: ServerConfig) -> Self {
        Self {
            name: name.to_string(),
            transport: cfg.transport,
            url: cfg.url,
            headers: cfg.headers,
        }
    }
}

/// One remotely hosted callable, bound to the session it was discovered on.
#[async_trait]
pub trait RemoteTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Invoke the remote tool. The result is the server's structured reply.
    async fn call(&self, args: JsonMap<String, JsonValue>) -> Result<JsonValue>;
}

impl std::fmt::Debug for dyn RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("name", &self.name())
            .finish()
    }
}

/// Opaque handle cached by the middleware and resolved by tool proxies.
pub type ToolHandle = Arc<dyn RemoteTool>;
