//! Event bus: typed, synchronous notifications the task worker and sync
//! engine emit as they run, so callers can observe progress without polling
//! [`crate::queue::Statistics`].
//!
//! Delivery is synchronous and runs on the worker thread, preserving the
//! causal ordering guarantee from the concurrency model (a `change` event
//! for a commit is always delivered before the task's result reaches its
//! waiter). Subscribers that need to hop threads are expected to do their
//! own hand-off.

use std::sync::{Arc, Mutex};

use gitddb_git::GitOid;

use crate::error::GitDdbError;
use crate::queue::TaskMeta;

/// One occurrence the bus delivers to subscribers.
#[derive(Clone, Debug)]
pub enum Event {
    /// A task began executing on the worker thread.
    Start {
        /// The task's metadata.
        meta: TaskMeta,
    },
    /// A task finished successfully.
    Complete {
        /// The task's metadata.
        meta: TaskMeta,
    },
    /// A task failed.
    Error {
        /// The task's metadata.
        meta: TaskMeta,
        /// A rendering of the failure (errors aren't `Clone`, so events carry
        /// their display form rather than the error itself).
        message: String,
    },
    /// HEAD moved due to a local commit (put/insert/update/delete/merge).
    LocalChange {
        /// The affected path, relative to the repository root.
        path: String,
        /// HEAD's new commit.
        commit: GitOid,
    },
    /// The remote-tracking branch moved due to a fetch.
    RemoteChange {
        /// The remote name.
        remote: String,
        /// The remote-tracking branch's new commit.
        commit: GitOid,
    },
    /// A document changed as a result of any of the above (local or remote),
    /// fired once change classification has run.
    Change {
        /// The affected document path.
        path: String,
    },
}

type Listener = Box<dyn Fn(&Event) + Send + 'static>;

/// A synchronous, in-process fan-out point for [`Event`]s.
///
/// Cloning shares the same subscriber list (it's an `Arc` underneath),
/// matching how a `Database` hands the same bus down to every `Collection`.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<(u64, Listener)>>>,
}

/// A handle returned by [`EventBus::subscribe`], passed back to
/// [`EventBus::unsubscribe`] to remove that specific listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl EventBus {
    /// Create an empty bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`, invoked synchronously for every event emitted
    /// after this call returns.
    pub fn subscribe(&self, listener: impl Fn(&Event) + Send + 'static) -> SubscriptionId {
        let mut listeners = self.listeners.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let id = listeners.len() as u64 + listeners.iter().map(|(id, _)| *id).max().map_or(0, |m| m + 1);
        listeners.push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    /// Remove a previously registered listener. No-op if already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        listeners.retain(|(existing, _)| *existing != id.0);
    }

    /// Deliver `event` to every current subscriber, in registration order.
    pub fn emit(&self, event: Event) {
        let listeners = self.listeners.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, listener) in listeners.iter() {
            listener(&event);
        }
    }

    /// Convenience for emitting an [`Event::Error`] from a [`GitDdbError`].
    pub fn emit_error(&self, meta: TaskMeta, error: &GitDdbError) {
        self.emit(Event::Error { meta, message: error.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskLabel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_all_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = Arc::clone(&order);
        let order_b = Arc::clone(&order);
        bus.subscribe(move |_| order_a.lock().unwrap().push('a'));
        bus.subscribe(move |_| order_b.lock().unwrap().push('b'));
        bus.emit(Event::Change { path: "x.json".to_owned() });
        assert_eq!(*order.lock().unwrap(), vec!['a', 'b']);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let id = bus.subscribe(move |_| { count2.fetch_add(1, Ordering::SeqCst); });
        bus.emit(Event::Change { path: "x.json".to_owned() });
        bus.unsubscribe(id);
        bus.emit(Event::Change { path: "x.json".to_owned() });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_error_renders_message() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let seen2 = Arc::clone(&seen);
        bus.subscribe(move |event| {
            if let Event::Error { message, .. } = event {
                *seen2.lock().unwrap() = Some(message.clone());
            }
        });
        bus.emit_error(TaskMeta::new(TaskLabel::Put), &GitDdbError::DatabaseClosing);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("database is closing"));
    }
}
