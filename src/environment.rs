//! Immutable snapshot of the supervisor's environment.
//!
//! The live process environment is read exactly once, at startup. Every
//! instance then gets its own merged copy, so neither the ambient table nor a
//! sibling instance can observe another instance's `PORT`.

use std::collections::HashMap;
use std::sync::Arc;

/// Read-only view of the environment captured at launch.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: Arc<HashMap<String, String>>,
}

impl EnvSnapshot {
    /// Captures the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Arc::new(
                vars.into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Returns a fresh table with `overrides` layered over the snapshot.
    pub fn merged(&self, overrides: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = HashMap::with_capacity(self.vars.len() + overrides.len() + 2);
        env.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}
