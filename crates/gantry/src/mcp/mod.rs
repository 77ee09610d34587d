//! Remote tool loading: resolved descriptors, the catalog-client seam, and
//! the filtered loader.

pub mod catalog;
pub mod loader;
pub mod types;

pub use catalog::{RmcpCatalog, ToolCatalog};
pub use loader::load_tools;
pub use types::{RemoteTool, ResolvedServer, ToolHandle};

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable in-memory catalog shared by the crate's tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Map as JsonMap, Value as JsonValue, json};

    use crate::error::{Error, Result};
    use crate::mcp::types::{RemoteTool, ResolvedServer, ToolHandle};

    use super::catalog::ToolCatalog;

    pub struct StubTool {
        name: String,
        fail_call: bool,
    }

    #[async_trait]
    impl RemoteTool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }

        async fn call(&self, args: JsonMap<String, JsonValue>) -> Result<JsonValue> {
            if self.fail_call {
                return Err(Error::ToolInvocation {
                    tool: self.name.clone(),
                    reason: "stub failure".to_string(),
                });
            }
            Ok(json!({"tool": self.name, "echo": JsonValue::Object(args)}))
        }
    }

    /// Catalog double: fixed tool names, optional delay or failure, and a
    /// record of every connection attempt for assertions.
    pub struct StubCatalog {
        tools: Vec<String>,
        fail_connect: Option<String>,
        fail_calls: bool,
        delay: Option<Duration>,
        connects: AtomicUsize,
        seen: Mutex<Vec<ResolvedServer>>,
    }

    impl StubCatalog {
        pub fn with_tools(names: &[&str]) -> Self {
            Self {
                tools: names.iter().map(|n| n.to_string()).collect(),
                fail_connect: None,
                fail_calls: false,
                delay: None,
                connects: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            let mut cat = Self::with_tools(&[]);
            cat.fail_connect = Some(message.to_string());
            cat
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn with_failing_calls(mut self) -> Self {
            self.fail_calls = true;
            self
        }

        /// Number of connect attempts observed so far.
        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        /// Headers of the most recently connected server, for asserting
        /// what credentials were actually sent.
        pub fn last_headers(&self) -> Option<HashMap<String, String>> {
            self.seen
                .lock()
                .unwrap()
                .last()
                .map(|s| s.headers.clone())
        }

        pub fn last_url(&self) -> Option<String> {
            self.seen.lock().unwrap().last().map(|s| s.url.to_string())
        }
    }

    #[async_trait]
    impl ToolCatalog for StubCatalog {
        async fn connect(&self, servers: &[ResolvedServer]) -> Result<Vec<ToolHandle>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(servers.iter().cloned());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.fail_connect {
                return Err(Error::ToolLoadFailed(message.clone()));
            }
            Ok(self
                .tools
                .iter()
                .map(|name| {
                    std::sync::Arc::new(StubTool {
                        name: name.clone(),
                        fail_call: self.fail_calls,
                    }) as ToolHandle
                })
                .collect())
        }
    }
}
