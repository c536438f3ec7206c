//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised while wiring logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("tracing subscriber already installed")]
    Subscriber {
        /// Underlying initialisation error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be built or registered.
    #[error("metrics collector setup failed")]
    Collector {
        /// Stage that failed (`build` or `register`).
        stage: &'static str,
        /// Metric name.
        metric: &'static str,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The registry could not be rendered as exposition text.
    #[error("metrics rendering failed")]
    Render {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// Rendered exposition text was not UTF-8.
    #[error("metrics output was not utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn collector(
        stage: &'static str,
        metric: &'static str,
        source: prometheus::Error,
    ) -> Self {
        Self::Collector {
            stage,
            metric,
            source,
        }
    }
}
