//! Broadcast bus with a bounded replay ring.
//!
//! # Design
//! - Id assignment, ring insertion and broadcast happen under one lock, so ids are
//!   observed in order by every subscriber and by `backlog_since`.
//! - A subscriber resuming from an id receives the retained backlog first, then the
//!   live stream, with no gap and no duplicate.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Item yielded to subscribers; `Err` reports how many events a slow subscriber missed.
pub type StreamItem = Result<EventEnvelope, BroadcastStreamRecvError>;

/// Stream handed to subscribers.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamItem> + Send>>;

struct Ring {
    next_id: EventId,
    retained: VecDeque<EventEnvelope>,
}

/// Cloneable handle to the node's event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    ring: Arc<Mutex<Ring>>,
    capacity: usize,
}

impl EventBus {
    /// Bus retaining up to `capacity` events for replay (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            ring: Arc::new(Mutex::new(Ring {
                next_id: 1,
                retained: VecDeque::with_capacity(capacity),
            })),
            capacity,
        }
    }

    /// Bus with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Stamp `event`, retain it and broadcast it. Publishing never blocks on subscribers.
    pub fn publish(&self, event: Event) -> EventId {
        let mut ring = self.lock();
        let id = ring.next_id;
        ring.next_id = id.saturating_add(1);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        if ring.retained.len() == self.capacity {
            ring.retained.pop_front();
        }
        ring.retained.push_back(envelope.clone());
        // No receivers is not an error: the ring still serves late subscribers.
        let _ = self.sender.send(envelope);
        id
    }

    /// Live events, preceded by retained events newer than `last_event_id` when given.
    #[must_use]
    pub fn subscribe(&self, last_event_id: Option<EventId>) -> EventStream {
        let ring = self.lock();
        let live = BroadcastStream::new(self.sender.subscribe());
        let backlog: Vec<StreamItem> = last_event_id.map_or_else(Vec::new, |last| {
            Self::newer_than(&ring, last).map(Ok).collect()
        });
        drop(ring);
        Box::pin(tokio_stream::iter(backlog).chain(live))
    }

    /// Id of the newest retained event.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock().retained.back().map(|envelope| envelope.id)
    }

    /// Retained events with an id greater than `id`, oldest first.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        Self::newer_than(&self.lock(), id).collect()
    }

    fn newer_than(ring: &Ring, id: EventId) -> impl Iterator<Item = EventEnvelope> + '_ {
        ring.retained
            .iter()
            .skip_while(move |envelope| envelope.id <= id)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn completed(task_id: &str) -> Event {
        Event::TaskCompleted {
            task_id: task_id.into(),
        }
    }

    async fn next_id(stream: &mut EventStream) -> Option<EventId> {
        match timeout(Duration::from_secs(1), stream.next()).await {
            Ok(Some(Ok(envelope))) => Some(envelope.id),
            _ => None,
        }
    }

    #[test]
    fn ids_are_sequential_and_backlog_is_ordered() {
        let bus = EventBus::with_capacity(8);
        assert_eq!(bus.last_event_id(), None);
        let first = bus.publish(completed("a"));
        let second = bus.publish(Event::HealthChanged {
            degraded: vec!["transfers".into()],
        });
        assert_eq!((first, second), (1, 2));
        assert_eq!(bus.last_event_id(), Some(2));

        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);
        assert!(bus.backlog_since(second).is_empty());
    }

    #[test]
    fn ring_evicts_oldest_when_full() {
        let bus = EventBus::with_capacity(2);
        for idx in 0..3 {
            bus.publish(completed(&format!("t-{idx}")));
        }
        let ids: Vec<EventId> = bus.backlog_since(0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn live_subscribers_see_new_events_only() {
        let bus = EventBus::new();
        bus.publish(completed("before"));
        let mut stream = bus.subscribe(None);
        let id = bus.publish(completed("after"));
        assert_eq!(next_id(&mut stream).await, Some(id));
    }

    #[tokio::test]
    async fn resuming_subscribers_get_backlog_then_live() {
        let bus = EventBus::new();
        let first = bus.publish(completed("a"));
        let second = bus.publish(completed("b"));
        let mut stream = bus.subscribe(Some(first));
        let third = bus.publish(completed("c"));

        assert_eq!(next_id(&mut stream).await, Some(second));
        assert_eq!(next_id(&mut stream).await, Some(third));
        assert_eq!(next_id(&mut stream).await, None);
    }
}
