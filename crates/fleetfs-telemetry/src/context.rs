//! Span helpers for the application and for individual transfer tasks.
//!
//! # Design
//! - Provides an application-level span guard so top-level spans carry mode/build info.
//! - Task spans carry the identifiers every worker log line needs.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Build the span a worker enters while executing a task.
#[must_use]
pub fn task_span(task_id: &str, owner: &str, strategy: &str) -> Span {
    tracing::info_span!("task", task_id = %task_id, owner = %owner, strategy = %strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_guard_enters_for_its_lifetime() {
        let guard = GlobalContextGuard::new("test");
        tracing::info!("inside app span");
        drop(guard);
    }

    #[test]
    fn task_span_can_be_entered() {
        let span = task_span("t-1", "alice", "local_sync");
        let _entered = span.enter();
        tracing::info!("inside task span");
    }
}
