//! Validation helpers and parsing utilities for configuration values.

use std::collections::BTreeSet;

use crate::error::{ConfigError, ConfigResult};

/// Parse a non-negative integer value.
pub(crate) fn parse_u64(field: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "not_a_number",
        })
}

/// Parse the worker pool size, which must be at least one.
pub(crate) fn parse_concurrency(field: &'static str, raw: &str) -> ConfigResult<usize> {
    let value = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "not_a_number",
        })?;
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "must_be_positive",
        });
    }
    Ok(value)
}

/// Validate a node name: non-empty, no whitespace, no path separators.
pub(crate) fn parse_node_name(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "empty",
        });
    }
    if trimmed.chars().any(|ch| ch.is_whitespace() || ch == '/') {
        return Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "invalid_character",
        });
    }
    Ok(trimmed.to_string())
}

/// Parse a comma-separated node list, skipping empty entries.
pub(crate) fn parse_node_list(field: &'static str, raw: &str) -> ConfigResult<BTreeSet<String>> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| parse_node_name(field, entry))
        .collect()
}

/// Validate a host template; it must mention the `{node}` placeholder.
pub(crate) fn parse_host_template(field: &'static str, raw: &str) -> ConfigResult<String> {
    if raw.contains("{node}") {
        Ok(raw.trim().to_string())
    } else {
        Err(ConfigError::InvalidField {
            field,
            value: Some(raw.to_string()),
            reason: "missing_node_placeholder",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_rejects_garbage() {
        assert_eq!(parse_u64("reserved", " 42 "), Ok(42));
        assert!(matches!(
            parse_u64("reserved", "-1"),
            Err(ConfigError::InvalidField {
                reason: "not_a_number",
                ..
            })
        ));
    }

    #[test]
    fn parse_concurrency_requires_positive_value() {
        assert_eq!(parse_concurrency("workers", "8"), Ok(8));
        assert!(matches!(
            parse_concurrency("workers", "0"),
            Err(ConfigError::InvalidField {
                reason: "must_be_positive",
                ..
            })
        ));
    }

    #[test]
    fn parse_node_list_trims_and_dedupes() {
        let nodes = parse_node_list("nodes", " nodeA, nodeB,,nodeA ").expect("valid list");
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains("nodeA"));
        assert!(nodes.contains("nodeB"));
        assert!(parse_node_list("nodes", "node A").is_err());
    }

    #[test]
    fn host_template_requires_placeholder() {
        assert!(parse_host_template("tpl", "{node}.fleet.local").is_ok());
        assert!(parse_host_template("tpl", "static-host").is_err());
    }
}
