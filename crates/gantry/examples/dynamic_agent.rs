//! Dynamic MCP configuration demo: per-user authentication.
//!
//! The `Authorization` header carries a `{{USER_TOKEN}}` placeholder, so the
//! middleware is dynamic: nothing connects until an invocation supplies the
//! token, and `after_execution` drops the authenticated cache so the next
//! invocation re-authenticates from scratch.
//!
//! Run:
//!     USER_TOKEN=... MCP_URL=https://mcp.example.com/ \
//!         MCP_TOOLS=list_organizations cargo run --example dynamic_agent

use std::sync::Arc;

use env_flags::env_flags;
use gantry::{AgentSpec, ConfigurableContext, LoaderOptions, RmcpCatalog, prepare_agent};

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
        MCP_URL: &str = "https://mcp.example.com/";
        /// Comma-separated tool names to request.
        MCP_TOOLS: &str = "list_organizations";
        /// Per-user bearer token substituted into {{USER_TOKEN}}.
        USER_TOKEN: &str = "";
    }

    if (*USER_TOKEN).is_empty() {
        anyhow::bail!("set USER_TOKEN to the bearer token for this invocation");
    }

    let tool_names: Vec<String> = (*MCP_TOOLS)
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect();

    let mut spec = AgentSpec::new(
        "dynamic-demo",
        "claude-sonnet-4.5",
        "You are a demo assistant with per-user authenticated tools.",
    );
    spec.servers.insert(
        "remote".to_string(),
        serde_json::json!({
            "transport": "streamable_http",
            "url": *MCP_URL,
            "headers": {"Authorization": "Bearer {{USER_TOKEN}}"}
        }),
    );
    spec.tools.insert("remote".to_string(), tool_names);

    let agent = prepare_agent(spec, Arc::new(RmcpCatalog::default()), LoaderOptions::default())?;
    let middleware = agent.middleware.as_ref().expect("mcp configured");
    tracing::info!(
        "prepared '{}' (dynamic, variables: {:?})",
        agent.name,
        middleware.template_vars()
    );

    // One invocation epoch: authenticate, call, tear down.
    let ctx = ConfigurableContext::from_pairs([("USER_TOKEN", *USER_TOKEN)]);
    middleware.before_execution(&ctx).await?;
    tracing::info!("tools loaded: {:?}", middleware.cached_tool_names().await);

    if let Some(proxy) = agent.tools.first() {
        let reply = proxy.invoke(serde_json::Map::new(), &ctx).await?;
        println!("{}", serde_json::to_string_pretty(&reply)?);
    }

    middleware.after_execution(&ctx).await?;
    tracing::info!("cache cleared; next invocation re-authenticates");
    Ok(())
}
