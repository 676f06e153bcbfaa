//! In-process backing store with watch support.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{BackingStore, ChangeEvent, WatchStream};
use crate::error::{Result, SyncError};

const EVENT_BUFFER: usize = 64;

/// An in-memory document store.
///
/// Holds documents keyed by id and emits a [`ChangeEvent`] on every put,
/// which makes it a full watch-capable [`BackingStore`]. Useful as an
/// embedded store and as the store half of integration tests.
///
/// # Examples
///
/// ```rust
/// use driftsync::sources::MemoryStore;
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.put("app-settings", json!({"port": 8080}));
/// ```
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<String, Value>>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Store a document and notify watchers.
    pub fn put(&self, document_id: &str, document: Value) {
        {
            let mut documents = self.documents.lock().unwrap();
            documents.insert(document_id.to_string(), document.clone());
        }
        // No receivers is fine; watchers may come and go.
        let _ = self.events.send(ChangeEvent {
            document_id: document_id.to_string(),
            document,
        });
    }

    /// Remove a document, returning whether it existed.
    pub fn remove(&self, document_id: &str) -> bool {
        let mut documents = self.documents.lock().unwrap();
        documents.remove(document_id).is_some()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            events: self.events.clone(),
        }
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn fetch_current(&self, document_id: &str) -> Result<Option<Value>> {
        let documents = self.documents.lock().unwrap();
        Ok(documents.get(document_id).cloned())
    }

    async fn open_watch(&self) -> Result<Box<dyn WatchStream>> {
        Ok(Box::new(MemoryWatch {
            receiver: self.events.subscribe(),
        }))
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryWatch {
    receiver: broadcast::Receiver<ChangeEvent>,
}

#[async_trait]
impl WatchStream for MemoryWatch {
    async fn next_event(&mut self) -> Result<Option<ChangeEvent>> {
        match self.receiver.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            // Missed events mean the current state is unknown; fail so the
            // consumer reopens with a fresh fetch.
            Err(broadcast::error::RecvError::Lagged(missed)) => Err(SyncError::Fetch(format!(
                "watch stream lagged behind by {missed} events"
            ))),
        }
    }
}
