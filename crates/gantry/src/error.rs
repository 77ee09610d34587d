//! Error types for agent assembly and MCP tool loading.
//!
//! Every variant names the offending server, tool, or variable so a
//! misconfiguration can be fixed without reading source. Several display
//! strings are stable interface: callers match on `Missing required template
//! variables:`, `not found in cache`, `not loaded yet`, and
//! `No tools found matching filter`.

use std::time::Duration;

use thiserror::Error;

use crate::middleware::LoadMode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed server descriptor, tool filter, or agent spec. Detected at
    /// construction/validation time; never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Substitution was asked to resolve placeholders it has no values for.
    #[error("Missing required template variables: {missing:?}")]
    MissingTemplateVariables { missing: Vec<String> },

    /// A dynamic invocation arrived without full credential coverage. The
    /// caller must resupply; nothing is retried automatically.
    #[error(
        "Missing required template variables: {missing:?}. \
         Provide values for them in the invocation context."
    )]
    MissingCredentials { missing: Vec<String> },

    /// Transport or connectivity failure while fetching the remote catalog.
    /// Possibly transient: the next invocation (dynamic) or a fresh
    /// construction (static) retries naturally.
    #[error("MCP tool loading failed: {0}")]
    ToolLoadFailed(String),

    /// The bounded wait for the remote catalog elapsed.
    #[error("MCP tool loading timed out after {timeout:?}")]
    LoadTimedOut { timeout: Duration },

    /// Connected fine, but none of the requested tools exist remotely.
    /// A configuration problem (typo or unauthorized request), not transient.
    #[error(
        "No tools found matching filter. Available tools: {available:?}, \
         Requested tools: {requested:?}"
    )]
    NoToolsMatched {
        requested: Vec<String>,
        available: Vec<String>,
    },

    /// A tool was requested before the cache was populated for the current
    /// epoch. The remediation differs by mode, so the message does too.
    #[error("{}", not_loaded_message(.mode))]
    NotLoaded { mode: LoadMode },

    /// The cache is populated but has no entry under this name.
    #[error("Tool '{name}' not found in cache. Available tools: {available:?}")]
    UnknownTool {
        name: String,
        available: Vec<String>,
    },

    /// A resolved remote tool failed while being invoked.
    #[error("MCP tool '{tool}' invocation failed: {reason}")]
    ToolInvocation { tool: String, reason: String },
}

fn not_loaded_message(mode: &LoadMode) -> String {
    match mode {
        LoadMode::Static => "MCP tools not loaded yet. Static configurations load at \
                             construction; a missing cache indicates an initialization bug."
            .to_string(),
        LoadMode::Dynamic => "MCP tools not loaded yet. Ensure before_execution has run \
                              for this invocation."
            .to_string(),
    }
}
