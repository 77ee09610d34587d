//! Tool-loading middleware with static and dynamic authentication modes.
//!
//! The mode is decided once, at construction, from the raw server
//! descriptors: any `{{VAR}}` placeholder makes the configuration dynamic.
//!
//! Static configurations load immediately and keep their cache for the
//! lifetime of the instance, at zero marginal cost per invocation. When the
//! constructor runs on a thread already driven by an async runtime, blocking
//! there would deadlock the scheduler, so the load is deferred to the first
//! `before_execution`, which always runs in async context.
//!
//! Dynamic configurations cannot load before invocation time because the
//! credentials filling the placeholders are not known yet. Each invocation
//! substitutes its own values, loads, and the cache is torn down in
//! `after_execution`: handles authorized under one invocation's credentials
//! never survive into the next.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{ServerConfig, ToolFilter, parse_server_config};
use crate::context::InvocationContext;
use crate::error::{Error, Result};
use crate::mcp::catalog::ToolCatalog;
use crate::mcp::loader::load_tools;
use crate::mcp::types::ToolHandle;
use crate::template::{extract_template_vars, substitute_templates};

/// How this middleware instance acquires its tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// No placeholders: tools load once and persist.
    Static,
    /// Placeholders present: tools load per invocation with that
    /// invocation's credential values.
    Dynamic,
}

/// Tuning for the tool-loading middleware.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Bounded wait for one complete catalog fetch.
    pub load_timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle hooks the graph compiler invokes around each agent execution.
#[async_trait]
pub trait AgentMiddleware: Send + Sync {
    async fn before_execution(&self, ctx: &dyn InvocationContext) -> Result<()>;
    async fn after_execution(&self, ctx: &dyn InvocationContext) -> Result<()>;
}

#[derive(Debug, Default)]
struct LoaderState {
    loaded: bool,
    tools: HashMap<String, ToolHandle>,
}

/// Middleware that loads MCP tools and caches them for one epoch.
///
/// The state is exclusively owned here; proxies read through [`Self::tool`]
/// and nothing else writes it. One instance serves one agent definition;
/// sharing a dynamic instance across concurrent invocations of different
/// users is out of contract (use one instance per invocation).
#[derive(Debug)]
pub struct McpToolsLoader {
    servers_raw: BTreeMap<String, Value>,
    filter: ToolFilter,
    template_vars: BTreeSet<String>,
    mode: LoadMode,
    deferred: bool,
    catalog: Arc<dyn ToolCatalog>,
    options: LoaderOptions,
    state: Mutex<LoaderState>,
}

impl McpToolsLoader {
    /// Build the middleware from raw descriptors and a tool allow-list.
    ///
    /// Static configurations attempt their load here and fail the
    /// constructor on any problem, so misconfiguration surfaces as early as
    /// possible. Inside a running runtime the load is deferred instead (see
    /// module docs). Dynamic configurations defer unconditionally.
    pub fn new(
        servers: BTreeMap<String, Value>,
        tool_filter: &BTreeMap<String, Vec<String>>,
        catalog: Arc<dyn ToolCatalog>,
        options: LoaderOptions,
    ) -> Result<Self> {
        let filter = ToolFilter::parse(tool_filter)?;
        let server_names: BTreeSet<String> = servers.keys().cloned().collect();
        filter.ensure_servers_match(&server_names)?;

        // Extracted from the *raw* descriptors, before any field validation:
        // a templated URL is not a parseable URI until substituted.
        let raw_tree = Value::Object(
            servers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let template_vars = extract_template_vars(&raw_tree);
        let mode = if template_vars.is_empty() {
            LoadMode::Static
        } else {
            LoadMode::Dynamic
        };

        let mut loader = Self {
            servers_raw: servers,
            filter,
            template_vars,
            mode,
            deferred: false,
            catalog,
            options,
            state: Mutex::new(LoaderState::default()),
        };

        match mode {
            LoadMode::Dynamic => {
                tracing::info!(
                    "dynamic MCP configuration (variables: {:?}); tools load at \
                     invocation time",
                    loader.template_vars
                );
            }
            LoadMode::Static => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    // Blocking on the load here would deadlock the scheduler
                    // that is currently driving this thread.
                    loader.deferred = true;
                    tracing::info!(
                        "async runtime already running; deferring static MCP tool \
                         loading to first execution"
                    );
                } else {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| {
                            Error::ToolLoadFailed(format!("build loading runtime: {e}"))
                        })?;
                    let resolved = loader.resolve_static()?;
                    let tools = runtime.block_on(load_tools(
                        &resolved,
                        &loader.filter,
                        loader.catalog.as_ref(),
                        loader.options.load_timeout,
                    ))?;
                    let state = loader.state.get_mut();
                    state.tools = tools;
                    state.loaded = true;
                    tracing::info!("static MCP tools loaded at construction");
                }
            }
        }

        Ok(loader)
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn is_dynamic(&self) -> bool {
        self.mode == LoadMode::Dynamic
    }

    /// True when a static configuration skipped its construction-time load
    /// because a runtime was already running.
    pub fn deferred(&self) -> bool {
        self.deferred
    }

    /// Template variables this configuration requires per invocation.
    pub fn template_vars(&self) -> &BTreeSet<String> {
        &self.template_vars
    }

    /// Sorted names currently in the cache (empty when not loaded).
    pub async fn cached_tool_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check that `values` covers every required template variable.
    pub fn ensure_credentials(&self, values: &HashMap<String, String>) -> Result<()> {
        let missing: Vec<String> = self
            .template_vars
            .iter()
            .filter(|name| !values.contains_key(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingCredentials { missing })
        }
    }

    /// Load tools for the current epoch if they are not loaded yet.
    ///
    /// Idempotent within an epoch: a multi-step reasoning loop may re-enter
    /// this hook and must not refetch. The state lock is held for the whole
    /// hook, so the cache is published all-or-nothing and cancellation
    /// mid-load leaves the instance cleanly unloaded.
    pub async fn before_execution(&self, ctx: &dyn InvocationContext) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.loaded {
            tracing::debug!("MCP tools already loaded for this epoch, skipping");
            return Ok(());
        }

        let resolved = match self.mode {
            LoadMode::Static => {
                tracing::info!("loading static MCP tools (deferred from construction)");
                self.resolve_static()?
            }
            LoadMode::Dynamic => {
                tracing::info!("loading MCP tools with per-invocation credentials");
                self.resolve_dynamic(ctx.configurable())?
            }
        };

        let tools = load_tools(
            &resolved,
            &self.filter,
            self.catalog.as_ref(),
            self.options.load_timeout,
        )
        .await?;
        state.tools = tools;
        state.loaded = true;
        Ok(())
    }

    /// End the current epoch.
    ///
    /// Dynamic mode drops every cached handle so the next invocation
    /// re-authenticates from scratch. Static mode keeps its cache for the
    /// lifetime of the instance.
    pub async fn after_execution(&self, _ctx: &dyn InvocationContext) -> Result<()> {
        if self.mode == LoadMode::Static {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        state.tools.clear();
        state.loaded = false;
        tracing::debug!("cleared MCP tool cache; next invocation re-authenticates");
        Ok(())
    }

    /// Resolve a cached tool handle by name.
    pub async fn tool(&self, name: &str) -> Result<ToolHandle> {
        let state = self.state.lock().await;
        if !state.loaded {
            return Err(Error::NotLoaded { mode: self.mode });
        }
        state.tools.get(name).cloned().ok_or_else(|| {
            let mut available: Vec<String> = state.tools.keys().cloned().collect();
            available.sort();
            Error::UnknownTool {
                name: name.to_string(),
                available,
            }
        })
    }

    fn resolve_static(&self) -> Result<BTreeMap<String, ServerConfig>> {
        self.servers_raw
            .iter()
            .map(|(name, raw)| Ok((name.clone(), parse_server_config(name, raw)?)))
            .collect()
    }

    fn resolve_dynamic(
        &self,
        values: &HashMap<String, String>,
    ) -> Result<BTreeMap<String, ServerConfig>> {
        self.ensure_credentials(values)?;
        self.servers_raw
            .iter()
            .map(|(name, raw)| {
                // Used once for this load, then discarded with `resolved`.
                let substituted = substitute_templates(raw, values)?;
                Ok((name.clone(), parse_server_config(name, &substituted)?))
            })
            .collect()
    }
}

#[async_trait]
impl AgentMiddleware for McpToolsLoader {
    async fn before_execution(&self, ctx: &dyn InvocationContext) -> Result<()> {
        McpToolsLoader::before_execution(self, ctx).await
    }

    async fn after_execution(&self, ctx: &dyn InvocationContext) -> Result<()> {
        McpToolsLoader::after_execution(self, ctx).await
    }
}
