//! Prometheus registry for transfer activity.
//!
//! # Design
//! - Each `Metrics` owns its own registry so tests and embedded nodes never collide.
//! - Label values are the stable `as_str` labels of strategies, states and placement reasons.

use std::sync::Arc;

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, core::Collector,
};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Transfer metrics shared by the planner and the worker pool.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    tasks_total: IntCounterVec,
    placement_rejections_total: IntCounterVec,
    active_tasks: IntGauge,
    queue_depth: IntGauge,
    bytes_total: IntCounter,
    preflight_rejections_total: IntCounter,
}

/// Point-in-time view of the gauges and counters used in health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Tasks currently executing on a worker.
    pub active_tasks: i64,
    /// Tasks submitted but still waiting for a worker slot.
    pub queue_depth: i64,
    /// Total bytes reported by completed transfers.
    pub bytes_total: u64,
    /// Transfers refused by the disk space preflight.
    pub preflight_rejections_total: u64,
}

impl Metrics {
    /// Build a fresh registry with every transfer collector registered.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Collector`] if a collector cannot be built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();
        let inner = MetricsInner {
            tasks_total: counter_vec(
                &registry,
                "transfer_tasks_total",
                "Transfer tasks reaching a state, by strategy",
                &["strategy", "state"],
            )?,
            placement_rejections_total: counter_vec(
                &registry,
                "placement_rejections_total",
                "Transfer requests refused by placement, by reason",
                &["reason"],
            )?,
            active_tasks: collector(
                &registry,
                "transfer_tasks_active",
                IntGauge::with_opts(Opts::new(
                    "transfer_tasks_active",
                    "Transfer tasks currently executing",
                )),
            )?,
            queue_depth: collector(
                &registry,
                "transfer_queue_depth",
                IntGauge::with_opts(Opts::new(
                    "transfer_queue_depth",
                    "Transfer tasks waiting for a worker slot",
                )),
            )?,
            bytes_total: collector(
                &registry,
                "transfer_bytes_total",
                IntCounter::with_opts(Opts::new(
                    "transfer_bytes_total",
                    "Bytes moved by completed transfers",
                )),
            )?,
            preflight_rejections_total: collector(
                &registry,
                "preflight_rejections_total",
                IntCounter::with_opts(Opts::new(
                    "preflight_rejections_total",
                    "Transfers refused by the disk space preflight",
                )),
            )?,
            registry,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Count a task reaching `state` under `strategy`.
    pub fn inc_task(&self, strategy: &str, state: &str) {
        self.inner
            .tasks_total
            .with_label_values(&[strategy, state])
            .inc();
    }

    /// Count a placement refusal.
    pub fn inc_placement_rejection(&self, reason: &str) {
        self.inner
            .placement_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Adjust the active task gauge by `delta`.
    pub fn add_active_tasks(&self, delta: i64) {
        self.inner.active_tasks.add(delta);
    }

    /// Adjust the queue depth gauge by `delta`.
    pub fn add_queue_depth(&self, delta: i64) {
        self.inner.queue_depth.add(delta);
    }

    /// Add bytes moved by a completed transfer.
    pub fn add_bytes(&self, bytes: u64) {
        self.inner.bytes_total.inc_by(bytes);
    }

    /// Count a disk space preflight refusal.
    pub fn inc_preflight_rejection(&self) {
        self.inner.preflight_rejections_total.inc();
    }

    /// Prometheus text exposition of the whole registry.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Current gauge and counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_tasks: self.inner.active_tasks.get(),
            queue_depth: self.inner.queue_depth.get(),
            bytes_total: self.inner.bytes_total.get(),
            preflight_rejections_total: self.inner.preflight_rejections_total.get(),
        }
    }
}

fn counter_vec(
    registry: &Registry,
    metric: &'static str,
    help: &str,
    labels: &[&str],
) -> TelemetryResult<IntCounterVec> {
    collector(
        registry,
        metric,
        IntCounterVec::new(Opts::new(metric, help), labels),
    )
}

/// Register a freshly built collector, tagging failures with the metric name.
fn collector<C>(
    registry: &Registry,
    metric: &'static str,
    built: prometheus::Result<C>,
) -> TelemetryResult<C>
where
    C: Collector + Clone + 'static,
{
    let built = built.map_err(|source| TelemetryError::collector("build", metric, source))?;
    registry
        .register(Box::new(built.clone()))
        .map_err(|source| TelemetryError::collector("register", metric, source))?;
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_gauges_and_counters() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.add_queue_depth(2);
        metrics.add_queue_depth(-1);
        metrics.add_active_tasks(1);
        metrics.add_bytes(4_096);
        metrics.add_bytes(1_024);
        metrics.inc_preflight_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 1);
        assert_eq!(snapshot.active_tasks, 1);
        assert_eq!(snapshot.bytes_total, 5_120);
        assert_eq!(snapshot.preflight_rejections_total, 1);
        Ok(())
    }

    #[test]
    fn render_includes_labelled_series() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.inc_task("local_sync", "completed");
        metrics.inc_placement_rejection("wrong_node");

        let rendered = metrics.render()?;
        let task_line = rendered
            .lines()
            .find(|line| line.starts_with("transfer_tasks_total{"))
            .unwrap_or_default();
        assert!(task_line.contains(r#"strategy="local_sync""#), "{rendered}");
        assert!(task_line.contains(r#"state="completed""#), "{rendered}");
        assert!(rendered.contains(r#"placement_rejections_total{reason="wrong_node"} 1"#));
        assert!(rendered.contains("transfer_bytes_total 0"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> TelemetryResult<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.add_bytes(10);
        assert_eq!(second.snapshot().bytes_total, 0);
        Ok(())
    }

    #[test]
    fn duplicate_registration_names_the_metric() {
        let registry = Registry::new();
        let first = collector(
            &registry,
            "transfer_bytes_total",
            IntCounter::with_opts(Opts::new("transfer_bytes_total", "bytes")),
        );
        assert!(first.is_ok());
        let second = collector(
            &registry,
            "transfer_bytes_total",
            IntCounter::with_opts(Opts::new("transfer_bytes_total", "bytes")),
        );
        assert!(matches!(
            second,
            Err(TelemetryError::Collector {
                stage: "register",
                metric: "transfer_bytes_total",
                ..
            })
        ));
    }
}
