//! Propagation loop: drives a backing source and feeds its snapshots into
//! a configuration cell, with retry on transient failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::flatten;
use crate::error::{Result, SyncError};
use crate::sources::BackingStore;
use crate::store::ConfigCell;

/// Strategy for detecting upstream changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Push-based: subscribe to the store's change stream. Every
    /// (re)connect is preceded by a full fetch, since watch streams only
    /// deliver changes. A source without watch support demotes the loop
    /// to [`Poll`](SyncMode::Poll) after the initial load.
    Watch,
    /// Pull-based: fetch on a fixed interval, firing immediately on start.
    Poll,
}

/// Retry and polling timing, injectable so tests can run under virtual
/// time.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Interval between fetches in [`SyncMode::Poll`].
    pub poll_interval: Duration,
    /// Delay before returning to the loading state after any failure.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            backoff: Duration::from_millis(500),
        }
    }
}

/// A long-lived task keeping one cell in sync with one logical document.
///
/// The loop is self-healing: any transient failure is logged, waited out
/// for the configured backoff, and followed by a fresh full load. It only
/// terminates through [`PropagationHandle::shutdown`]. Consumers of the
/// cell always see the last successfully applied snapshot, never a
/// partial or error state.
///
/// # Examples
///
/// ```rust,no_run
/// use driftsync::propagation::{PropagationLoop, RetryPolicy, SyncMode};
/// use driftsync::sources::MemoryStore;
/// use driftsync::store::SnapshotStore;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let store = SnapshotStore::new();
/// let source = Arc::new(MemoryStore::new());
///
/// let handle = PropagationLoop::new(source, store.cell("app-settings"), "app-settings")
///     .with_mode(SyncMode::Watch)
///     .spawn();
///
/// // ... later
/// handle.shutdown().await;
/// # }
/// ```
pub struct PropagationLoop {
    source: Arc<dyn BackingStore>,
    cell: Arc<ConfigCell>,
    document_id: String,
    mode: SyncMode,
    policy: RetryPolicy,
}

impl PropagationLoop {
    /// Create a loop governing one document id. Defaults to
    /// [`SyncMode::Watch`] with the default [`RetryPolicy`].
    pub fn new(
        source: Arc<dyn BackingStore>,
        cell: Arc<ConfigCell>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cell,
            document_id: document_id.into(),
            mode: SyncMode::Watch,
            policy: RetryPolicy::default(),
        }
    }

    /// Set the synchronization strategy.
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the retry/polling timing.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Spawn the loop as an independent tokio task.
    pub fn spawn(self) -> PropagationHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        PropagationHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.cycle() => outcome,
            };

            match outcome {
                Ok(()) => debug!(
                    source = %self.source.name(),
                    document_id = %self.document_id,
                    "Watch stream ended; reconnecting"
                ),
                Err(SyncError::WatchNotSupported) => {
                    // Not transient; spinning on the backoff would warn
                    // every cycle and poll at the wrong rate.
                    warn!(
                        source = %self.source.name(),
                        document_id = %self.document_id,
                        "Source does not support watching; falling back to polling"
                    );
                    self.mode = SyncMode::Poll;
                    continue;
                }
                Err(error) => warn!(
                    source = %self.source.name(),
                    document_id = %self.document_id,
                    %error,
                    "Propagation failed; retrying after backoff"
                ),
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = time::sleep(self.policy.backoff) => {}
            }
        }
        debug!(document_id = %self.document_id, "Propagation loop stopped");
    }

    /// One pass through the state machine. Returns only when the watch
    /// stream ends (`Ok`) or a transient failure occurs (`Err`); polling
    /// never returns on its own.
    async fn cycle(&self) -> Result<()> {
        match self.mode {
            SyncMode::Watch => {
                self.load_current().await?;
                self.watch_changes().await
            }
            SyncMode::Poll => self.poll_changes().await,
        }
    }

    async fn load_current(&self) -> Result<()> {
        info!(
            source = %self.source.name(),
            document_id = %self.document_id,
            "Loading current configuration"
        );

        if let Some(document) = self.source.fetch_current(&self.document_id).await? {
            self.cell.apply(flatten(&document));
        }
        Ok(())
    }

    async fn watch_changes(&self) -> Result<()> {
        info!(
            source = %self.source.name(),
            document_id = %self.document_id,
            "Watching for changes"
        );

        let mut stream = self.source.open_watch().await?;
        while let Some(event) = stream.next_event().await? {
            // The store may hold many logical documents; only ours applies.
            if event.document_id != self.document_id {
                debug!(
                    document_id = %event.document_id,
                    "Ignoring change for foreign document"
                );
                continue;
            }

            if self.cell.apply(flatten(&event.document)) {
                info!(
                    document_id = %self.document_id,
                    "Document changed; pushed to configuration store"
                );
            }
        }
        Ok(())
    }

    async fn poll_changes(&self) -> Result<()> {
        let mut ticks = time::interval(self.policy.poll_interval);
        // A slow fetch must delay the next one, not stack behind it.
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            debug!(
                source = %self.source.name(),
                document_id = %self.document_id,
                "Polling configuration"
            );

            if let Some(document) = self.source.fetch_current(&self.document_id).await? {
                if self.cell.apply(flatten(&document)) {
                    info!(
                        document_id = %self.document_id,
                        "New configuration found by polling"
                    );
                }
            }
        }
    }
}

/// Handle to a running propagation loop.
pub struct PropagationHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl PropagationHandle {
    /// Stop the loop and wait for the task to finish.
    ///
    /// Cancellation is prompt: the retry delay, fetches and the watch
    /// subscription are all raced against the shutdown signal, and the
    /// subscription is released when its future is dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }

    /// Whether the loop task has terminated.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemoryStore;
    use crate::store::SnapshotStore;
    use serde_json::json;
    use tokio::time::{advance, sleep};

    // Under start_paused, sleeps resolve instantly once every task is
    // otherwise idle, so these tests run in virtual time.

    async fn settle() {
        sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_mode_loads_initial_state() {
        let source = Arc::new(MemoryStore::new());
        source.put("settings", json!({"port": 8080}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle = PropagationLoop::new(source, Arc::clone(&cell), "settings").spawn();

        settle().await;
        assert_eq!(cell.get().unwrap().get("port"), Some("8080"));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_mode_applies_changes() {
        let source = Arc::new(MemoryStore::new());
        source.put("settings", json!({"port": 8080}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "settings")
                .spawn();
        settle().await;

        source.put("settings", json!({"port": 9090}));
        settle().await;

        assert_eq!(cell.get().unwrap().get("port"), Some("9090"));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_mode_filters_foreign_documents() {
        let source = Arc::new(MemoryStore::new());
        source.put("mine", json!({"value": 1}));

        let store = SnapshotStore::new();
        let cell = store.cell("mine");
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "mine")
                .spawn();
        settle().await;
        assert_eq!(cell.generation(), 1);

        source.put("other", json!({"value": 99}));
        settle().await;

        assert_eq!(cell.generation(), 1);
        assert_eq!(cell.get().unwrap().get("value"), Some("1"));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_mode_fires_immediately_then_periodically() {
        let source = Arc::new(MemoryStore::new());
        source.put("settings", json!({"value": 1}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let policy = RetryPolicy {
            poll_interval: Duration::from_secs(2),
            backoff: Duration::from_millis(500),
        };
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "settings")
                .with_mode(SyncMode::Poll)
                .with_policy(policy)
                .spawn();

        // First fetch is not delayed.
        settle().await;
        assert_eq!(cell.get().unwrap().get("value"), Some("1"));

        source.put("settings", json!({"value": 2}));
        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(cell.get().unwrap().get("value"), Some("2"));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_mode_suppresses_unchanged_cycles() {
        let source = Arc::new(MemoryStore::new());
        source.put("settings", json!({"value": 1}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "settings")
                .with_mode(SyncMode::Poll)
                .spawn();

        settle().await;
        advance(Duration::from_secs(10)).await;
        settle().await;

        // Many polls, one applied generation.
        assert_eq!(cell.generation(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_document_keeps_waiting() {
        let source = Arc::new(MemoryStore::new());
        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "settings")
                .spawn();

        settle().await;
        assert!(cell.get().is_none());

        // The document appears later and is picked up from the stream.
        source.put("settings", json!({"late": true}));
        settle().await;
        assert_eq!(cell.get().unwrap().get("late"), Some("true"));

        handle.shutdown().await;
    }

    struct FetchOnly(MemoryStore);

    #[async_trait::async_trait]
    impl BackingStore for FetchOnly {
        async fn fetch_current(&self, document_id: &str) -> Result<Option<serde_json::Value>> {
            self.0.fetch_current(document_id).await
        }

        fn name(&self) -> String {
            "fetch-only".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_mode_demotes_to_polling_without_watch_support() {
        let source = Arc::new(FetchOnly(MemoryStore::new()));
        source.0.put("settings", json!({"value": 1}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle = PropagationLoop::new(
            Arc::clone(&source) as Arc<dyn BackingStore>,
            Arc::clone(&cell),
            "settings",
        )
        .spawn();

        settle().await;
        assert_eq!(cell.get().unwrap().get("value"), Some("1"));

        // The demoted loop picks up changes on the poll interval, not the
        // backoff interval.
        source.0.put("settings", json!({"value": 2}));
        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(cell.get().unwrap().get("value"), Some("2"));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_prompt() {
        let source = Arc::new(MemoryStore::new());
        let store = SnapshotStore::new();
        let handle = PropagationLoop::new(source, store.cell("settings"), "settings").spawn();

        settle().await;
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_loop_ignores_later_changes() {
        let source = Arc::new(MemoryStore::new());
        source.put("settings", json!({"value": 1}));

        let store = SnapshotStore::new();
        let cell = store.cell("settings");
        let handle =
            PropagationLoop::new(Arc::clone(&source) as Arc<dyn BackingStore>, Arc::clone(&cell), "settings")
                .spawn();
        settle().await;
        handle.shutdown().await;

        source.put("settings", json!({"value": 2}));
        settle().await;
        assert_eq!(cell.get().unwrap().get("value"), Some("1"));
    }
}
