//! Typed node settings.
//!
//! # Design
//! - Pure data carriers built once at startup and shared read-only.
//! - Every field has a documented default except the node's own name.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::loader::{EnvSource, ProcessEnv};
use crate::validate::{
    parse_concurrency, parse_host_template, parse_node_list, parse_node_name, parse_u64,
};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// External tool binaries invoked by transfer strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Filesystem synchronization tool.
    pub rsync: PathBuf,
    /// Generic cloud transfer tool.
    pub cloud_tool: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            rsync: PathBuf::from(defaults::RSYNC_BIN),
            cloud_tool: PathBuf::from(defaults::CLOUD_TOOL_BIN),
        }
    }
}

/// Settings describing this node and the fleet around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Name of the node serving requests.
    pub node_name: String,
    /// Elected master node.
    pub master_node: String,
    /// Known fleet members; always contains `node_name` and `master_node`.
    pub nodes: BTreeSet<String>,
    /// Root data-path prefix.
    pub data_root: PathBuf,
    /// Reserved disk-space margin in megabytes.
    pub reserved_space_mb: u64,
    /// Worker pool size.
    pub worker_concurrency: usize,
    /// External tool binaries.
    pub tools: ToolPaths,
    /// Remote-shell host template, `{node}` is substituted.
    pub node_host_template: String,
    /// Log level directive.
    pub log_level: String,
    /// Requested log format, if any.
    pub log_format: Option<String>,
}

impl NodeSettings {
    /// Settings for a single-node fleet with every default applied.
    #[must_use]
    pub fn single_node(node_name: impl Into<String>) -> Self {
        let node_name = node_name.into();
        Self {
            master_node: node_name.clone(),
            nodes: BTreeSet::from([node_name.clone()]),
            node_name,
            data_root: PathBuf::from(defaults::DATA_ROOT),
            reserved_space_mb: defaults::RESERVED_SPACE_MB,
            worker_concurrency: defaults::WORKER_CONCURRENCY,
            tools: ToolPaths::default(),
            node_host_template: defaults::NODE_HOST_TEMPLATE.to_string(),
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }

    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the node name is missing or any value fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Load settings from an arbitrary environment source.
    ///
    /// # Errors
    ///
    /// Returns an error when the node name is missing or any value fails validation.
    pub fn from_source(env: &impl EnvSource) -> ConfigResult<Self> {
        let raw_node = env.get(defaults::ENV_NODE_NAME).ok_or(ConfigError::Missing {
            name: defaults::ENV_NODE_NAME,
        })?;
        let mut settings = Self::single_node(parse_node_name("node_name", &raw_node)?);

        if let Some(raw) = env.get(defaults::ENV_MASTER_NODE) {
            settings.master_node = parse_node_name("master_node", &raw)?;
        }
        if let Some(raw) = env.get(defaults::ENV_NODES) {
            settings.nodes = parse_node_list("nodes", &raw)?;
        }
        settings.nodes.insert(settings.node_name.clone());
        settings.nodes.insert(settings.master_node.clone());

        if let Some(raw) = env.get(defaults::ENV_DATA_ROOT) {
            let trimmed = raw.trim();
            if !trimmed.starts_with('/') {
                return Err(ConfigError::InvalidField {
                    field: "data_root",
                    value: Some(raw),
                    reason: "not_absolute",
                });
            }
            settings.data_root = PathBuf::from(trimmed);
        }
        if let Some(raw) = env.get(defaults::ENV_RESERVED_SPACE_MB) {
            settings.reserved_space_mb = parse_u64("reserved_space_mb", &raw)?;
        }
        if let Some(raw) = env.get(defaults::ENV_WORKER_CONCURRENCY) {
            settings.worker_concurrency = parse_concurrency("worker_concurrency", &raw)?;
        }
        if settings.worker_concurrency == 1 {
            warn!(
                worker_concurrency = 1,
                "single worker slot serializes every transfer on this node"
            );
        }
        if let Some(raw) = env.get(defaults::ENV_RSYNC_BIN) {
            settings.tools.rsync = PathBuf::from(raw.trim());
        }
        if let Some(raw) = env.get(defaults::ENV_CLOUD_TOOL_BIN) {
            settings.tools.cloud_tool = PathBuf::from(raw.trim());
        }
        if let Some(raw) = env.get(defaults::ENV_NODE_HOST_TEMPLATE) {
            settings.node_host_template = parse_host_template("node_host_template", &raw)?;
        }
        if let Some(raw) = env.get(defaults::ENV_LOG_LEVEL) {
            settings.log_level = raw.trim().to_string();
        }
        settings.log_format = env.get(defaults::ENV_LOG_FORMAT);

        Ok(settings)
    }

    /// Reserved disk-space margin in bytes.
    #[must_use]
    pub const fn reserved_space_bytes(&self) -> u64 {
        self.reserved_space_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Whether this node is the elected master.
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.node_name == self.master_node
    }

    /// Remote-shell host used to reach `node`.
    #[must_use]
    pub fn host_for(&self, node: &str) -> String {
        self.node_host_template.replace("{node}", node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MapEnv;

    #[test]
    fn defaults_apply_when_only_node_name_is_set() -> anyhow::Result<()> {
        let env = MapEnv::new().with(defaults::ENV_NODE_NAME, "nodeA");
        let settings = NodeSettings::from_source(&env)?;
        assert_eq!(settings.node_name, "nodeA");
        assert_eq!(settings.master_node, "nodeA");
        assert!(settings.is_master());
        assert_eq!(settings.data_root, PathBuf::from("/data"));
        assert_eq!(settings.reserved_space_mb, 10_000);
        assert_eq!(settings.reserved_space_bytes(), 10_000 * 1024 * 1024);
        assert_eq!(settings.worker_concurrency, 4);
        assert_eq!(settings.tools, ToolPaths::default());
        Ok(())
    }

    #[test]
    fn missing_node_name_is_reported() {
        let err = NodeSettings::from_source(&MapEnv::new()).expect_err("node name required");
        assert_eq!(
            err,
            ConfigError::Missing {
                name: defaults::ENV_NODE_NAME
            }
        );
    }

    #[test]
    fn fleet_membership_includes_self_and_master() -> anyhow::Result<()> {
        let env = MapEnv::new()
            .with(defaults::ENV_NODE_NAME, "nodeB")
            .with(defaults::ENV_MASTER_NODE, "nodeX")
            .with(defaults::ENV_NODES, "nodeA");
        let settings = NodeSettings::from_source(&env)?;
        assert!(!settings.is_master());
        let members: Vec<_> = settings.nodes.iter().map(String::as_str).collect();
        assert_eq!(members, vec!["nodeA", "nodeB", "nodeX"]);
        Ok(())
    }

    #[test]
    fn overrides_are_validated() {
        let env = MapEnv::new()
            .with(defaults::ENV_NODE_NAME, "nodeA")
            .with(defaults::ENV_DATA_ROOT, "relative/path");
        assert!(matches!(
            NodeSettings::from_source(&env),
            Err(ConfigError::InvalidField {
                field: "data_root",
                reason: "not_absolute",
                ..
            })
        ));

        let env = MapEnv::new()
            .with(defaults::ENV_NODE_NAME, "nodeA")
            .with(defaults::ENV_WORKER_CONCURRENCY, "0");
        assert!(matches!(
            NodeSettings::from_source(&env),
            Err(ConfigError::InvalidField {
                field: "worker_concurrency",
                ..
            })
        ));
    }

    #[test]
    fn host_template_substitutes_node() -> anyhow::Result<()> {
        let env = MapEnv::new()
            .with(defaults::ENV_NODE_NAME, "nodeA")
            .with(defaults::ENV_NODE_HOST_TEMPLATE, "files@{node}.fleet");
        let settings = NodeSettings::from_source(&env)?;
        assert_eq!(settings.host_for("nodeB"), "files@nodeB.fleet");
        Ok(())
    }
}
