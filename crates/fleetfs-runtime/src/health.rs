//! Degradation tracking for the transfer worker pool.

use std::sync::{Mutex, MutexGuard};

use fleetfs_events::{Event, EventBus};
use tracing::{info, warn};

const HEALTH_COMPONENT: &str = "transfers";

/// Publishes `HealthChanged` only when the degraded flag flips.
pub(crate) struct HealthTracker {
    degraded: Mutex<bool>,
    events: EventBus,
}

impl HealthTracker {
    pub(crate) const fn new(events: EventBus) -> Self {
        Self {
            degraded: Mutex::new(false),
            events,
        }
    }

    pub(crate) fn mark_degraded(&self, detail: &str) {
        let mut guard = self.lock();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "transfer pool still degraded"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "transfer pool degraded"
            );
            self.events.publish(Event::HealthChanged {
                degraded: vec![HEALTH_COMPONENT.to_string()],
            });
        }
    }

    pub(crate) fn mark_recovered(&self) {
        let mut guard = self.lock();
        if std::mem::take(&mut *guard) {
            drop(guard);
            self.events.publish(Event::HealthChanged { degraded: vec![] });
            info!(component = HEALTH_COMPONENT, "transfer pool recovered");
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.degraded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
