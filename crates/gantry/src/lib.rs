//! Declarative agent assembly with MCP tool loading middleware.
//!
//! A caller describes an agent (model name, system prompt, MCP tool
//! servers, and a per-server tool allow-list) and gets back a
//! [`PreparedAgent`]: the model/prompt passed through for the graph
//! compiler, two lifecycle hooks, and one lazily resolving [`ToolProxy`] per
//! requested tool.
//!
//! Server descriptors may embed `{{VAR}}` placeholders anywhere in their
//! string values. A configuration with no placeholders is *static*: tools
//! load once (at construction when possible) and the cache lives as long as
//! the middleware. A configuration with placeholders is *dynamic*: every
//! invocation supplies its own values (typically per-user credentials),
//! tools load inside `before_execution`, and `after_execution` drops the
//! cache so nothing authorized under one invocation leaks into the next.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gantry::{AgentSpec, ConfigurableContext, LoaderOptions, RmcpCatalog, prepare_agent};
//!
//! # async fn run() -> gantry::Result<()> {
//! let mut spec = AgentSpec::new(
//!     "cloud-helper",
//!     "claude-sonnet-4.5",
//!     "You manage cloud resources for the user.",
//! );
//! spec.servers.insert(
//!     "cloud".into(),
//!     serde_json::json!({
//!         "transport": "streamable_http",
//!         "url": "https://mcp.example.com/",
//!         "headers": {"Authorization": "Bearer {{USER_TOKEN}}"}
//!     }),
//! );
//! spec.tools.insert("cloud".into(), vec!["list_organizations".into()]);
//!
//! let agent = prepare_agent(spec, Arc::new(RmcpCatalog::default()), LoaderOptions::default())?;
//! let middleware = agent.middleware.as_ref().expect("mcp configured");
//!
//! // Per invocation: load with this user's credentials, run, tear down.
//! let ctx = ConfigurableContext::from_pairs([("USER_TOKEN", "token-123")]);
//! middleware.before_execution(&ctx).await?;
//! let reply = agent.tools[0].invoke(serde_json::Map::new(), &ctx).await?;
//! middleware.after_execution(&ctx).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod mcp;
pub mod middleware;
pub mod proxy;
pub mod template;

pub use agent::{AgentSpec, PreparedAgent, prepare_agent};
pub use config::{ServerConfig, ToolFilter, Transport, parse_server_config};
pub use context::{ConfigurableContext, InvocationContext};
pub use error::{Error, Result};
pub use mcp::{RemoteTool, ResolvedServer, RmcpCatalog, ToolCatalog, ToolHandle, load_tools};
pub use middleware::{AgentMiddleware, LoadMode, LoaderOptions, McpToolsLoader};
pub use proxy::ToolProxy;
pub use template::{
    extract_template_vars, has_templates, substitute_templates, validate_template_syntax,
};
