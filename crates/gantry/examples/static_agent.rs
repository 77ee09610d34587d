//! Static MCP configuration demo.
//!
//! The server descriptor carries no template placeholders, so the middleware
//! is static: tools load once and the cache lives for the process lifetime.
//! Constructed inside tokio's runtime, the load is deferred to the first
//! `before_execution`, which this example drives by hand.
//!
//! Run against any streamable-HTTP MCP server:
//!     MCP_URL=http://127.0.0.1:8081/mcp MCP_TOOLS=echo cargo run --example static_agent

use std::collections::HashMap;
use std::sync::Arc;

use env_flags::env_flags;
use gantry::{AgentSpec, LoaderOptions, RmcpCatalog, prepare_agent};

fn init_tracing() {
    env_flags! {
        /// Tracing filter, e.g. "info", "debug", or targets format.
        RUST_LOG: &str = "info";
    }

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, prelude::*};

    let filter =
        EnvFilter::try_new((*RUST_LOG).to_string()).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();
    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
    {
        tracing::debug!("tracing already set: {:?}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    env_flags! {
        /// MCP server endpoint to load tools from.
        MCP_URL: &str = "http://127.0.0.1:8081/mcp";
        /// Comma-separated tool names to request.
        MCP_TOOLS: &str = "echo";
    }

    let tool_names: Vec<String> = (*MCP_TOOLS)
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect();

    let mut spec = AgentSpec::new(
        "static-demo",
        "claude-sonnet-4.5",
        "You are a demo assistant with statically configured tools.",
    );
    spec.servers.insert(
        "local".to_string(),
        serde_json::json!({"transport": "streamable_http", "url": *MCP_URL}),
    );
    spec.tools.insert("local".to_string(), tool_names);

    let agent = prepare_agent(spec, Arc::new(RmcpCatalog::default()), LoaderOptions::default())?;
    let middleware = agent.middleware.as_ref().expect("mcp configured");
    tracing::info!(
        "prepared '{}' (mode={:?}, deferred={})",
        agent.name,
        middleware.mode(),
        middleware.deferred()
    );

    // No credentials needed in static mode; the empty context satisfies it.
    let ctx: HashMap<String, String> = HashMap::new();
    middleware.before_execution(&ctx).await?;
    tracing::info!("tools loaded: {:?}", middleware.cached_tool_names().await);

    for proxy in &agent.tools {
        println!("tool available: {}", proxy.name());
    }
    Ok(())
}
