//! Subscriber registry for node notifications.
//!
//! Every node keeps a list of external listeners. Listeners are plain
//! callbacks that receive the notification payload; they have no access to
//! the graph, so a listener cannot re-enter propagation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::change::Notification;

/// Unique identifier for a subscription.
///
/// Returned from `subscribe` and passed back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Box<dyn FnMut(&Notification)>;

/// The listeners attached to one node, in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(SubscriptionId, Callback)>,
}

impl Listeners {
    pub(crate) fn add<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + 'static,
    {
        let id = SubscriptionId::new();
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&mut self, notification: &Notification) {
        for (_, callback) in self.entries.iter_mut() {
            callback(notification);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
