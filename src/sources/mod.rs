//! Backing-store sources that feed the propagation loop.

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::{HttpSource, HttpSourceBuilder};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SyncError};

/// A change observed on the backing store.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Id of the logical document that changed
    pub document_id: String,
    /// The full document after the change
    pub document: Value,
}

/// Contract every backing store must satisfy.
///
/// A backing store holds logical configuration documents keyed by id and
/// exposes two capabilities: a point-in-time fetch and, optionally, a
/// long-lived watch subscription yielding change events.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetch the current state of a document, or `None` if it does not
    /// exist yet.
    async fn fetch_current(&self, document_id: &str) -> Result<Option<Value>>;

    /// Open a watch subscription over the whole store.
    ///
    /// Watch streams deliver *changes* only, never the current state, so
    /// consumers must pair every (re)open with a [`fetch_current`] call.
    /// Stores without push support keep the default implementation.
    ///
    /// [`fetch_current`]: BackingStore::fetch_current
    async fn open_watch(&self) -> Result<Box<dyn WatchStream>> {
        Err(SyncError::WatchNotSupported)
    }

    /// Human-readable name for log messages.
    fn name(&self) -> String;
}

/// An open watch subscription.
#[async_trait]
pub trait WatchStream: Send {
    /// Wait for the next change event.
    ///
    /// Returns `Ok(None)` when the stream ends gracefully; any `Err` is a
    /// transient failure the consumer recovers from by reopening.
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>>;
}
