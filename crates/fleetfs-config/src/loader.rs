//! Environment lookup abstraction used to build [`NodeSettings`](crate::NodeSettings).
//!
//! # Design
//! - Settings are read through [`EnvSource`] so tests never mutate the process environment.

use std::collections::HashMap;

/// Source of environment-style key/value configuration.
pub trait EnvSource {
    /// Look up a variable, returning `None` when it is unset.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// In-memory environment, primarily for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    values: HashMap<String, String>,
}

impl MapEnv {
    /// Build an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the updated environment.
    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_env_returns_values() {
        let env = MapEnv::new().with("A", "1");
        assert_eq!(env.get("A").as_deref(), Some("1"));
        assert!(env.get("B").is_none());
    }
}
