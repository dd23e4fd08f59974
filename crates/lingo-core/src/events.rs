use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;
use serde::Serialize;
use smol_str::SmolStr;

/// Notifications about how a key was resolved.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverEvent {
    /// The key was found in a locale other than the requested one.
    FallbackUsed {
        key: String,
        requested: SmolStr,
        used: SmolStr,
    },
    Missing {
        key: String,
        locale: SmolStr,
    },
    CompileFailed {
        key: String,
        locale: SmolStr,
        code: u16,
        message: String,
    },
}

impl ResolverEvent {
    pub fn key(&self) -> &str {
        match self {
            ResolverEvent::FallbackUsed { key, .. }
            | ResolverEvent::Missing { key, .. }
            | ResolverEvent::CompileFailed { key, .. } => key,
        }
    }
}

/// Fans events out to subscribers without ever blocking the resolver.
///
/// A full bounded subscriber misses the event; a dropped receiver is unsubscribed.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: DashMap<usize, Sender<ResolverEvent>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ResolverEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.add(sender);
        receiver
    }

    pub fn subscribe_bounded(&self, capacity: usize) -> Receiver<ResolverEvent> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        self.add(sender);
        receiver
    }

    fn add(&self, sender: Sender<ResolverEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, sender);
    }

    pub fn emit(&self, event: ResolverEvent) {
        if self.subscribers.is_empty() {
            return;
        }

        self.subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(subscriber = id, "event subscriber is full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
