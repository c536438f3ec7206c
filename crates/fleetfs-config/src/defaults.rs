//! Default values and environment variable names for node configuration.
//!
//! # Design
//! - Keep every tunable's name and fallback in one place so operators can audit them.

/// Name of the node serving requests (required).
pub const ENV_NODE_NAME: &str = "FLEETFS_NODE_NAME";
/// Elected master node.
pub const ENV_MASTER_NODE: &str = "FLEETFS_MASTER_NODE";
/// Comma-separated fleet membership.
pub const ENV_NODES: &str = "FLEETFS_NODES";
/// Root data-path prefix.
pub const ENV_DATA_ROOT: &str = "FLEETFS_DATA_ROOT";
/// Reserved disk-space margin in megabytes.
pub const ENV_RESERVED_SPACE_MB: &str = "FLEETFS_RESERVED_SPACE_MB";
/// Worker pool size.
pub const ENV_WORKER_CONCURRENCY: &str = "FLEETFS_WORKER_CONCURRENCY";
/// Synchronization tool binary.
pub const ENV_RSYNC_BIN: &str = "FLEETFS_RSYNC_BIN";
/// Cloud transfer tool binary.
pub const ENV_CLOUD_TOOL_BIN: &str = "FLEETFS_CLOUD_TOOL_BIN";
/// Remote-shell host template for node-to-node pulls.
pub const ENV_NODE_HOST_TEMPLATE: &str = "FLEETFS_NODE_HOST_TEMPLATE";
/// Log level.
pub const ENV_LOG_LEVEL: &str = "FLEETFS_LOG_LEVEL";
/// Log format (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "FLEETFS_LOG_FORMAT";

/// Default root data-path prefix.
pub const DATA_ROOT: &str = "/data";
/// Default reserved disk-space margin in megabytes.
pub const RESERVED_SPACE_MB: u64 = 10_000;
/// Default worker pool size.
pub const WORKER_CONCURRENCY: usize = 4;
/// Default synchronization tool binary.
pub const RSYNC_BIN: &str = "rsync";
/// Default cloud transfer tool binary.
pub const CLOUD_TOOL_BIN: &str = "rclone";
/// Default remote-shell host template; `{node}` is replaced with the node name.
pub const NODE_HOST_TEMPLATE: &str = "{node}";
/// Default log level.
pub const LOG_LEVEL: &str = "info";
