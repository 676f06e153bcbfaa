//! A single configuration cell: current snapshot plus subscribers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use tracing::error;

use crate::core::Snapshot;

type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct SubscriberList {
    entries: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Handle for a subscription that can be dropped to unsubscribe.
pub struct SubscriptionHandle {
    id: usize,
    subscribers: Arc<Mutex<SubscriberList>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.entries.retain(|(id, _)| *id != self.id);
    }
}

/// A named mutable cell holding the current [`Snapshot`] and a list of
/// subscribers.
///
/// Reads are lock-free via `arc-swap`; mutations go through [`apply`],
/// which only replaces the snapshot (and notifies) when the new value
/// actually differs from the current one.
///
/// [`apply`]: ConfigCell::apply
pub struct ConfigCell {
    current: ArcSwapOption<Snapshot>,
    subscribers: Arc<Mutex<SubscriberList>>,
    generation: AtomicU64,
}

impl ConfigCell {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::const_empty(),
            subscribers: Arc::new(Mutex::new(SubscriberList {
                entries: Vec::new(),
                next_id: 0,
            })),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot, or `None` before the first load.
    ///
    /// Lock-free; never blocks appliers or other readers.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Apply a new snapshot, returning whether it replaced the current one.
    ///
    /// If the snapshot equals the current one this is a no-op and no
    /// subscriber is notified. Otherwise the snapshot is stored and every
    /// subscriber is invoked synchronously, in subscription order, with the
    /// new value. A panicking subscriber is logged and isolated: delivery
    /// continues to the remaining subscribers and the stored snapshot is
    /// unaffected.
    pub fn apply(&self, snapshot: Snapshot) -> bool {
        let snapshot = Arc::new(snapshot);

        // The subscriber mutex doubles as the cell mutex: compare-and-store
        // and the subscriber list walk are atomic with respect to subscribe().
        let callbacks: Vec<Callback> = {
            let subscribers = self.subscribers.lock().unwrap();

            if let Some(current) = self.current.load_full() {
                if *current == *snapshot {
                    return false;
                }
            }

            self.current.store(Some(Arc::clone(&snapshot)));
            self.generation.fetch_add(1, Ordering::AcqRel);
            subscribers.entries.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        // Fan-out happens outside the lock so arbitrary subscriber code
        // cannot block subscribe() or a concurrent apply().
        for callback in callbacks {
            Self::invoke(&callback, &snapshot);
        }

        true
    }

    /// Register a callback for snapshot changes.
    ///
    /// The callback is immediately invoked once with the current snapshot
    /// (empty before the first load), so a late subscriber is never left
    /// without an initial value. Returns a handle; dropping it removes the
    /// subscription. The replay runs under the cell lock, so the callback
    /// must not subscribe to the same cell from within itself.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);

        let mut subscribers = self.subscribers.lock().unwrap();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::clone(&callback)));

        let replay = self
            .current
            .load_full()
            .unwrap_or_else(|| Arc::new(Snapshot::empty()));
        Self::invoke(&callback, &replay);

        SubscriptionHandle {
            id,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().entries.len()
    }

    fn invoke(callback: &Callback, snapshot: &Snapshot) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%message, "Configuration subscriber panicked during notification");
        }
    }
}
