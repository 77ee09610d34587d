//! Invocation-scoped configuration values.
//!
//! Credential values travel with the invocation, not in process-wide state:
//! the harness hands a context to `before_execution` and to every tool proxy
//! call, and the middleware reads it through this one accessor. Whatever
//! concrete object the harness already has can implement the trait.

use std::collections::HashMap;

/// Read-only view of the per-invocation configurable values (typically
/// credentials filling the server descriptors' template variables).
pub trait InvocationContext: Send + Sync {
    fn configurable(&self) -> &HashMap<String, String>;
}

/// Owned map form of the invocation context.
#[derive(Debug, Default, Clone)]
pub struct ConfigurableContext {
    values: HashMap<String, String>,
}

impl ConfigurableContext {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Convenience for building a context out of string pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl InvocationContext for ConfigurableContext {
    fn configurable(&self) -> &HashMap<String, String> {
        &self.values
    }
}

/// A plain map is already a valid context.
impl InvocationContext for HashMap<String, String> {
    fn configurable(&self) -> &HashMap<String, String> {
        self
    }
}
