//! Change-detecting store: named configuration cells with subscriber
//! notification and value-level diffing.

mod cell;

pub use cell::{ConfigCell, SubscriptionHandle};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-wide registry of named configuration cells.
///
/// Each key (a document id or logical source name) owns exactly one
/// [`ConfigCell`]. The store is an explicit object created by the
/// application's composition root and passed by handle to every consumer;
/// cells live as long as the store.
///
/// # Examples
///
/// ```rust
/// use driftsync::store::SnapshotStore;
///
/// let store = SnapshotStore::new();
/// let cell = store.cell("app-settings");
/// assert!(cell.get().is_none());
/// ```
pub struct SnapshotStore {
    cells: Arc<Mutex<HashMap<String, Arc<ConfigCell>>>>,
}

impl SnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            cells: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or create the cell for a key.
    ///
    /// Idempotent: the first call for a key allocates the cell, every
    /// subsequent call returns the same one.
    pub fn cell(&self, key: &str) -> Arc<ConfigCell> {
        let mut cells = self.cells.lock().unwrap();
        Arc::clone(
            cells
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(ConfigCell::new())),
        )
    }

    /// Keys of all cells allocated so far.
    pub fn keys(&self) -> Vec<String> {
        let cells = self.cells.lock().unwrap();
        let mut keys: Vec<String> = cells.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SnapshotStore {
    fn clone(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
        }
    }
}
