//! Listener registry: fan-out of "headers changed" notifications.
//!
//! The store calls [`ListenerRegistry::notify`] after every committed
//! ingestion batch. Delivery is at-least-once to listeners attached at that
//! moment; a listener attaching later must catch up through
//! [`DocumentStore::get_headers`](crate::DocumentStore::get_headers).

use crate::header::Header;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Handle returned by [`ListenerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Why a listener could not take a notification.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener has shut down.
    #[error("listener closed")]
    Closed,

    /// Delivery to the listener's peer failed.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Something that wants to hear about newly committed headers.
pub trait HeaderListener: Send + Sync {
    /// Called with the headers of one committed batch, in revision order.
    ///
    /// Must not block on the network; the writer is waiting.
    fn update_headers(&self, headers: &[Header]) -> Result<(), ListenerError>;

    /// Short label used in logs.
    fn describe(&self) -> String {
        String::from("listener")
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Listeners that accepted the headers.
    pub delivered: usize,
    /// Listeners that returned an error.
    pub failed: usize,
    /// Registered listeners already dropped by their owner.
    pub stale: usize,
}

/// The set of attached listeners.
///
/// Entries are held weakly: the registry never keeps a session alive, and a
/// session dropped without unregistering is skipped.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<BTreeMap<ListenerId, Weak<dyn HeaderListener>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener.
    pub fn register(&self, listener: &Arc<dyn HeaderListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write();
        listeners.retain(|_, weak| weak.strong_count() > 0);
        listeners.insert(id, Arc::downgrade(listener));
        id
    }

    /// Detaches a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Delivers `headers` to every registered listener.
    ///
    /// Iterates a snapshot taken under the read lock, so listeners may
    /// register or unregister concurrently. A failing listener is logged and
    /// counted; it never affects the others or the caller.
    pub fn notify(&self, headers: &[Header]) -> NotifyReport {
        let mut report = NotifyReport::default();
        if headers.is_empty() {
            return report;
        }

        let snapshot: Vec<(ListenerId, Weak<dyn HeaderListener>)> = self
            .listeners
            .read()
            .iter()
            .map(|(id, weak)| (*id, Weak::clone(weak)))
            .collect();

        for (id, weak) in snapshot {
            let Some(listener) = weak.upgrade() else {
                report.stale += 1;
                continue;
            };
            match listener.update_headers(headers) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        listener = id.as_u64(),
                        peer = %listener.describe(),
                        error = %e,
                        "header notification failed"
                    );
                }
            }
        }

        if report.stale > 0 {
            self.listeners
                .write()
                .retain(|_, weak| weak.strong_count() > 0);
        }
        report
    }
}
