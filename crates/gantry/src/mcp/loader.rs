//! Filtered loading of remote tools.
//!
//! Resolves server descriptors, fetches the combined catalog under a bounded
//! wait, and narrows it to the requested allow-list. Zero matches is a hard
//! failure; a strict subset loads with a warning so optional tools do not
//! take the whole agent down.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use crate::config::{ServerConfig, ToolFilter};
use crate::error::{Error, Result};
use crate::mcp::catalog::ToolCatalog;
use crate::mcp::types::{ResolvedServer, ToolHandle};

/// Fetch all configured servers' catalogs and keep the requested subset.
///
/// The descriptors in `servers` must already be template-free. Fails with
/// [`Error::LoadTimedOut`] when the catalog fetch exceeds `timeout`, and
/// with [`Error::NoToolsMatched`] when nothing requested exists remotely.
pub async fn load_tools(
    servers: &BTreeMap<String, ServerConfig>,
    filter: &ToolFilter,
    catalog: &dyn ToolCatalog,
    timeout: Duration,
) -> Result<HashMap<String, ToolHandle>> {
    let resolved: Vec<ResolvedServer> = servers
        .iter()
        .map(|(name, cfg)| ResolvedServer::from_config(name, cfg.clone()))
        .collect();
    tracing::info!(
        "connecting to {} MCP server(s): {:?}",
        resolved.len(),
        servers.keys().collect::<Vec<_>>()
    );

    let all = tokio::time::timeout(timeout, catalog.connect(&resolved))
        .await
        .map_err(|_| Error::LoadTimedOut { timeout })??;

    let requested = filter.requested();
    let mut cache: HashMap<String, ToolHandle> = HashMap::new();
    let mut available: BTreeSet<String> = BTreeSet::new();
    for tool in all {
        let name = tool.name().to_string();
        if requested.contains(&name) && cache.contains_key(&name) {
            // Two servers expose the same requested name; first one wins.
            tracing::warn!("tool '{}' offered by more than one server; keeping the first", name);
        } else if requested.contains(&name) {
            cache.insert(name.clone(), tool);
        }
        available.insert(name);
    }

    if cache.is_empty() {
        return Err(Error::NoToolsMatched {
            requested: requested.into_iter().collect(),
            available: available.into_iter().collect(),
        });
    }

    let missing: Vec<&String> = requested.iter().filter(|n| !cache.contains_key(*n)).collect();
    if !missing.is_empty() {
        tracing::warn!("some requested tools were not found: {:?}", missing);
    }

    let mut loaded: Vec<&String> = cache.keys().collect();
    loaded.sort();
    tracing::info!("loaded {} MCP tool(s): {:?}", cache.len(), loaded);
    Ok(cache)
}
