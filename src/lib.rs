//! # driftsync
//!
//! Configuration propagation with watch/poll synchronization and
//! fleet-wide drift detection.
//!
//! ## Overview
//!
//! `driftsync` keeps a live, in-memory snapshot of key/value configuration
//! in sync with a remote backing store, and lets running nodes register
//! their observed configuration with a central registry so drift across a
//! fleet can be detected:
//!
//! - A [`propagation::PropagationLoop`] drives a [`sources::BackingStore`]
//!   (push-based watch or pull-based polling, with backoff-and-retry) and
//!   feeds flattened snapshots into a [`store::SnapshotStore`] cell, which
//!   diffs values and notifies subscribers only on real change.
//! - A [`registry::Registry`] accepts self-declared (schema,
//!   configuration, version) tuples, maintains one canonical schema
//!   (newest-or-equal version wins) and one canonical configuration
//!   (first writer wins) per application, and computes each node's sync
//!   status by structural comparison.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use driftsync::propagation::{PropagationLoop, SyncMode};
//! use driftsync::sources::MemoryStore;
//! use driftsync::store::SnapshotStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = SnapshotStore::new();
//! let source = Arc::new(MemoryStore::new());
//! source.put("app-settings", json!({"server": {"port": 8080}}));
//!
//! let cell = store.cell("app-settings");
//! let handle = PropagationLoop::new(source, Arc::clone(&cell), "app-settings")
//!     .with_mode(SyncMode::Watch)
//!     .spawn();
//!
//! let _subscription = cell.subscribe(|snapshot| {
//!     println!("port = {:?}", snapshot.get("server:port"));
//! });
//!
//! // ... on shutdown
//! handle.shutdown().await;
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` (default): HTTP backing source and registry client via
//!   `reqwest`.

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod declare;
pub mod error;
pub mod propagation;
pub mod registry;
pub mod sources;
pub mod store;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Schema, Snapshot, flatten};
    pub use crate::declare::SelfDeclaration;
    pub use crate::error::{Result, SyncError};
    pub use crate::propagation::{PropagationLoop, RetryPolicy, SyncMode};
    pub use crate::registry::{NodeCandidate, NodeStatus, Registry, RegistryApi};
    pub use crate::sources::{BackingStore, MemoryStore};
    pub use crate::store::SnapshotStore;
}
