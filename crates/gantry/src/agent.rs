//! Declarative agent specification and preparation.
//!
//! An [`AgentSpec`] describes an agent (model, system prompt, MCP servers,
//! tool allow-list, run limits), either built in code or parsed from a TOML
//! file. [`prepare_agent`] validates it and produces the bundle the graph
//! compiler consumes: the model/prompt passthrough, the middleware's
//! lifecycle hooks, and one lazily resolving proxy per requested tool.
//! Model-name resolution and graph compilation stay with the caller.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use toml::Value as TomlValue;

use crate::config::ToolFilter;
use crate::error::{Error, Result};
use crate::mcp::catalog::ToolCatalog;
use crate::middleware::{LoaderOptions, McpToolsLoader};
use crate::proxy::ToolProxy;

const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Declarative description of one agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    /// Friendly model name, passed through to the model resolver untouched.
    pub model: String,
    pub system_prompt: String,
    /// Raw server descriptors; string values may contain `{{VAR}}`
    /// placeholders.
    pub servers: BTreeMap<String, Value>,
    /// Server name → tool names to load from it.
    pub tools: BTreeMap<String, Vec<String>>,
    pub recursion_limit: u32,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            servers: BTreeMap::new(),
            tools: BTreeMap::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Check everything that does not require touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.system_prompt.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "system_prompt cannot be empty; describe the agent's role and \
                 capabilities"
                    .to_string(),
            ));
        }
        if self.system_prompt.trim().len() < 10 {
            return Err(Error::InvalidConfiguration(format!(
                "system_prompt is too short ({} chars); provide at least 10 \
                 characters describing the agent's purpose",
                self.system_prompt.trim().len()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "model cannot be empty".to_string(),
            ));
        }
        if self.recursion_limit == 0 {
            return Err(Error::InvalidConfiguration(
                "recursion_limit must be positive; recommended range is 10-200"
                    .to_string(),
            ));
        }
        if self.recursion_limit > 500 {
            tracing::warn!(
                "recursion_limit of {} is very high and may cause long \
                 execution times; consider 10-200",
                self.recursion_limit
            );
        }
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(Error::InvalidConfiguration(format!(
                "temperature must be between 0.0 and 2.0, got {t}"
            )));
        }
        match (self.servers.is_empty(), self.tools.is_empty()) {
            (false, true) => {
                return Err(Error::InvalidConfiguration(
                    "servers configured but no tools specified; list which \
                     tools to load from each server"
                        .to_string(),
                ));
            }
            (true, false) => {
                return Err(Error::InvalidConfiguration(
                    "tools specified but no servers configured; add matching \
                     server descriptors"
                        .to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Parse a TOML agent definition. `origin` is used for diagnostics and
    /// for resolving `prompt_file` (and the sibling `<stem>.prompt.md`
    /// fallback) relative to the spec file.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let mut tbl: toml::Table = content.parse().map_err(|e| {
            Error::InvalidConfiguration(format!("invalid TOML in {}: {e}", origin.display()))
        })?;

        let name = take_string(&mut tbl, "name").ok_or_else(|| {
            Error::InvalidConfiguration(format!("missing 'name' in {}", origin.display()))
        })?;
        let model = take_string(&mut tbl, "model").ok_or_else(|| {
            Error::InvalidConfiguration(format!("missing 'model' in {}", origin.display()))
        })?;

        // Prompt: inline, explicit file, or sibling <stem>.prompt.md.
        let mut system_prompt = take_string(&mut tbl, "system_prompt");
        if system_prompt.is_none()
            && let Some(rel) = take_string(&mut tbl, "prompt_file")
        {
            let path = origin.parent().unwrap_or(Path::new(".")).join(rel);
            let text = std::fs::read_to_string(&path).map_err(|e| {
                Error::InvalidConfiguration(format!(
                    "failed to read prompt file {}: {e}",
                    path.display()
                ))
            })?;
            system_prompt = Some(text);
        }
        if system_prompt.is_none() {
            let sibling = origin.with_extension("prompt.md");
            if sibling.exists()
                && let Ok(text) = std::fs::read_to_string(&sibling)
            {
                system_prompt = Some(text);
            }
        }
        let system_prompt = system_prompt.ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "missing 'system_prompt' in {} (or 'prompt_file' / sibling prompt)",
                origin.display()
            ))
        })?;

        let recursion_limit = match tbl.remove("recursion_limit") {
            Some(TomlValue::Integer(n)) if n > 0 && n <= u32::MAX as i64 => n as u32,
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "invalid 'recursion_limit' in {}: {other}",
                    origin.display()
                )));
            }
            None => DEFAULT_RECURSION_LIMIT,
        };
        let temperature = match tbl.remove("temperature") {
            Some(TomlValue::Float(f)) => Some(f),
            Some(TomlValue::Integer(n)) => Some(n as f64),
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "invalid 'temperature' in {}: {other}",
                    origin.display()
                )));
            }
            None => None,
        };
        let max_tokens = match tbl.remove("max_tokens") {
            Some(TomlValue::Integer(n)) if n > 0 && n <= u32::MAX as i64 => Some(n as u32),
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "invalid 'max_tokens' in {}: {other}",
                    origin.display()
                )));
            }
            None => None,
        };

        let servers = match tbl.remove("servers") {
            Some(TomlValue::Table(t)) => t
                .into_iter()
                .map(|(k, v)| {
                    let json = serde_json::to_value(v).map_err(|e| {
                        Error::InvalidConfiguration(format!(
                            "server '{k}' in {}: {e}",
                            origin.display()
                        ))
                    })?;
                    Ok((k, json))
                })
                .collect::<Result<BTreeMap<String, Value>>>()?,
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "[servers] must be a table in {}, found {}",
                    origin.display(),
                    other.type_str()
                )));
            }
            None => BTreeMap::new(),
        };

        let tools = match tbl.remove("tools") {
            Some(TomlValue::Table(t)) => {
                let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for (server, v) in t {
                    let TomlValue::Array(items) = v else {
                        return Err(Error::InvalidConfiguration(format!(
                            "tools for server '{server}' must be an array in {}",
                            origin.display()
                        )));
                    };
                    let names = items
                        .into_iter()
                        .map(|item| {
                            item.as_str().map(|s| s.to_string()).ok_or_else(|| {
                                Error::InvalidConfiguration(format!(
                                    "non-string tool name for server '{server}' in {}",
                                    origin.display()
                                ))
                            })
                        })
                        .collect::<Result<Vec<String>>>()?;
                    out.insert(server, names);
                }
                out
            }
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "[tools] must be a table in {}, found {}",
                    origin.display(),
                    other.type_str()
                )));
            }
            None => BTreeMap::new(),
        };

        if !tbl.is_empty() {
            tracing::debug!(
                "unrecognized keys in {}: {}",
                origin.display(),
                tbl.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(Self {
            name,
            model,
            system_prompt,
            servers,
            tools,
            recursion_limit,
            temperature,
            max_tokens,
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content, path)
    }
}

fn take_string(tbl: &mut toml::Table, key: &str) -> Option<String> {
    match tbl.remove(key) {
        Some(TomlValue::String(s)) => Some(s),
        Some(other) => {
            tracing::warn!("ignoring non-string '{}' (found: {})", key, other.type_str());
            None
        }
        None => None,
    }
}

/// Everything the graph compiler needs: model and prompt passed through,
/// lifecycle hooks, and the tool proxies to expose as invocable actions.
pub struct PreparedAgent {
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub recursion_limit: u32,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Absent when the spec configures no MCP servers.
    pub middleware: Option<Arc<McpToolsLoader>>,
    pub tools: Vec<ToolProxy>,
}

/// Validate `spec` and assemble its runtime bundle.
///
/// Static server configurations load their tools here (construction time);
/// dynamic ones defer to the first `before_execution`. The middleware is
/// built before the proxies so a static misconfiguration fails before any
/// proxy exists.
pub fn prepare_agent(
    spec: AgentSpec,
    catalog: Arc<dyn ToolCatalog>,
    options: LoaderOptions,
) -> Result<PreparedAgent> {
    spec.validate()?;

    let (middleware, tools) = if spec.servers.is_empty() {
        (None, Vec::new())
    } else {
        let middleware = Arc::new(McpToolsLoader::new(
            spec.servers.clone(),
            &spec.tools,
            catalog,
            options,
        )?);
        let filter = ToolFilter::parse(&spec.tools)?;
        let tools = ToolProxy::for_filter(&filter, &middleware);
        (Some(middleware), tools)
    };

    tracing::info!(
        "prepared agent '{}' (model={}, tools={})",
        spec.name,
        spec.model,
        tools.len()
    );
    Ok(PreparedAgent {
        name: spec.name,
        model: spec.model,
        system_prompt: spec.system_prompt,
        recursion_limit: spec.recursion_limit,
        temperature: spec.temperature,
        max_tokens: spec.max_tokens,
        middleware,
        tools,
    })
}
