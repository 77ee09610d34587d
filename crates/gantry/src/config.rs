//! Server descriptor and tool filter validation.
//!
//! Descriptors arrive as raw JSON values (Cursor-style `mcp.json` data) and
//! may contain `{{VAR}}` placeholders in any string field, so parsing into
//! the typed form happens only once the placeholders are resolved. Fatal
//! problems become [`Error::InvalidConfiguration`]; suspect-but-workable
//! input is logged as a warning and accepted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Transport protocols this crate can open. Currently streamable HTTP only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    StreamableHttp,
}

impl Transport {
    pub const SUPPORTED: &'static [&'static str] = &["streamable_http"];

    fn parse(token: &str) -> Result<Self> {
        match token {
            "streamable_http" => Ok(Self::StreamableHttp),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported transport '{other}'; currently supported: {:?}. \
                 For local MCP servers, use 'streamable_http' over localhost",
                Self::SUPPORTED
            ))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamableHttp => f.write_str("streamable_http"),
        }
    }
}

/// Validated connection descriptor for one remote tool server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: Transport,
    pub url: Url,
    pub headers: HashMap<String, String>,
    /// A static `Authorization` header was configured. Injected per-user
    /// credentials target the same header, so the static value is suspect.
    pub shadows_injected_auth: bool,
}

#[derive(Deserialize)]
struct RawServer {
    transport: Option<String>,
    url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

/// Parse and validate one server descriptor. `name` is used only for
/// diagnostics. The descriptor must be template-free at this point.
pub fn parse_server_config(name: &str, raw: &Value) -> Result<ServerConfig> {
    let raw: RawServer = serde_json::from_value(raw.clone()).map_err(|e| {
        Error::InvalidConfiguration(format!("server '{name}': malformed descriptor: {e}"))
    })?;

    let transport = match raw.transport.as_deref() {
        // mcp.json files routinely omit the transport field
        None => Transport::StreamableHttp,
        Some(token) => Transport::parse(token).map_err(|e| match e {
            Error::InvalidConfiguration(msg) => {
                Error::InvalidConfiguration(format!("server '{name}': {msg}"))
            }
            other => other,
        })?,
    };

    let url_str = raw
        .url
        .ok_or_else(|| Error::InvalidConfiguration(format!("server '{name}': missing 'url'")))?;
    let url = Url::parse(&url_str).map_err(|e| {
        Error::InvalidConfiguration(format!(
            "server '{name}': 'url' must be an absolute URI, got '{url_str}': {e}"
        ))
    })?;

    if url.scheme() == "http" && !is_loopback_host(&url) {
        tracing::warn!(
            "server '{}' uses insecure HTTP at {}; use HTTPS in production \
             for secure authentication",
            name,
            url
        );
    }

    let shadows_injected_auth = raw.headers.contains_key("Authorization");
    if shadows_injected_auth {
        tracing::warn!(
            "server '{}' configures a static 'Authorization' header; injected \
             per-user credentials target the same header",
            name
        );
    }

    Ok(ServerConfig {
        transport,
        url,
        headers: raw.headers,
        shadows_injected_auth,
    })
}

fn is_loopback_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
    )
}

/// Per-server allow-list of tool names to load.
#[derive(Debug, Clone)]
pub struct ToolFilter {
    entries: BTreeMap<String, Vec<String>>,
}

impl ToolFilter {
    /// Validate the raw server → tool-list mapping.
    pub fn parse(raw: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one MCP server with tools is required, e.g. \
                 {\"my-server\": [\"list_items\"]}"
                    .to_string(),
            ));
        }
        for (server, tools) in raw {
            if tools.is_empty() {
                return Err(Error::InvalidConfiguration(format!(
                    "server '{server}' has an empty tool list; specify at least one tool"
                )));
            }
            let mut seen = BTreeSet::new();
            for tool in tools {
                if tool.is_empty() {
                    return Err(Error::InvalidConfiguration(format!(
                        "empty tool name in server '{server}'"
                    )));
                }
                if !tool
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    return Err(Error::InvalidConfiguration(format!(
                        "invalid tool name '{tool}' in server '{server}'; use \
                         alphanumeric characters, underscores, or hyphens"
                    )));
                }
                if !seen.insert(tool.as_str()) {
                    return Err(Error::InvalidConfiguration(format!(
                        "duplicate tool name '{tool}' in server '{server}'"
                    )));
                }
            }
        }
        Ok(Self {
            entries: raw.clone(),
        })
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<String>> {
        &self.entries
    }

    /// Union of all requested tool names, sorted.
    pub fn requested(&self) -> BTreeSet<String> {
        self.entries.values().flatten().cloned().collect()
    }

    /// Enforce exact two-way coverage between filter keys and configured
    /// server names. Both directions are errors: a server without tools is
    /// dead weight, tools for an unknown server are a typo.
    pub fn ensure_servers_match(&self, servers: &BTreeSet<String>) -> Result<()> {
        let filter_keys: BTreeSet<String> = self.entries.keys().cloned().collect();
        let without_tools: Vec<&String> = servers.difference(&filter_keys).collect();
        if !without_tools.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "server(s) configured but no tools specified: {without_tools:?}; \
                 add entries for them in the tool filter"
            )));
        }
        let undefined: Vec<&String> = filter_keys.difference(servers).collect();
        if !undefined.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "tools specified for undefined server(s): {undefined:?}; \
                 add matching server configurations"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter_of(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(s, ts)| (s.to_string(), ts.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    #[test]
    fn parses_minimal_descriptor_with_default_transport() {
        let cfg = parse_server_config("s", &json!({"url": "https://mcp.example.com/"})).unwrap();
        assert_eq!(cfg.transport, Transport::StreamableHttp);
        assert_eq!(cfg.url.as_str(), "https://mcp.example.com/");
        assert!(cfg.headers.is_empty());
        assert!(!cfg.shadows_injected_auth);
    }

    #[test]
    fn rejects_unsupported_transport() {
        let err = parse_server_config(
            "s",
            &json!({"transport": "websocket", "url": "https://x/"}),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unsupported transport"));
        assert!(msg.contains("streamable_http"));
    }

    #[test]
    fn rejects_missing_or_relative_url() {
        let err = parse_server_config("s", &json!({"transport": "streamable_http"})).unwrap_err();
        assert!(err.to_string().contains("missing 'url'"));

        let err = parse_server_config("s", &json!({"url": "/relative/path"})).unwrap_err();
        assert!(err.to_string().contains("absolute URI"));
    }

    #[test]
    fn flags_static_authorization_header() {
        let cfg = parse_server_config(
            "s",
            &json!({
                "url": "https://mcp.example.com/",
                "headers": {"Authorization": "Bearer fixed"}
            }),
        )
        .unwrap();
        assert!(cfg.shadows_injected_auth);
    }

    #[test]
    fn plain_http_on_loopback_is_accepted() {
        for host in ["http://localhost:8080/", "http://127.0.0.1/"] {
            let cfg = parse_server_config("s", &json!({ "url": host })).unwrap();
            assert_eq!(cfg.transport, Transport::StreamableHttp);
        }
    }

    #[test]
    fn filter_requires_servers_and_tools() {
        let err = ToolFilter::parse(&BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("at least one MCP server"));

        let err = ToolFilter::parse(&filter_of(&[("s", &[])])).unwrap_err();
        assert!(err.to_string().contains("empty tool list"));
    }

    #[test]
    fn filter_validates_tool_names() {
        let err = ToolFilter::parse(&filter_of(&[("s", &["bad name"])])).unwrap_err();
        assert!(err.to_string().contains("invalid tool name"));

        let err = ToolFilter::parse(&filter_of(&[("s", &[""])])).unwrap_err();
        assert!(err.to_string().contains("empty tool name"));

        let err = ToolFilter::parse(&filter_of(&[("s", &["dup", "dup"])])).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));

        let ok = ToolFilter::parse(&filter_of(&[("s", &["list_items", "fetch-data", "t2"])]));
        assert!(ok.is_ok());
    }

    #[test]
    fn requested_is_the_union_across_servers() {
        let filter =
            ToolFilter::parse(&filter_of(&[("a", &["t1", "t2"]), ("b", &["t2", "t3"])])).unwrap();
        let requested: Vec<String> = filter.requested().into_iter().collect();
        assert_eq!(requested, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn server_coverage_is_checked_both_ways() {
        let filter = ToolFilter::parse(&filter_of(&[("a", &["t1"])])).unwrap();

        let servers: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let err = filter.ensure_servers_match(&servers).unwrap_err();
        assert!(err.to_string().contains("no tools specified"));
        assert!(err.to_string().contains('b'));

        let servers: BTreeSet<String> = BTreeSet::new();
        let err = filter.ensure_servers_match(&servers).unwrap_err();
        assert!(err.to_string().contains("undefined server"));

        let servers: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert!(filter.ensure_servers_match(&servers).is_ok());
    }
}
