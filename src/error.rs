//! Error types for driftsync.

use std::fmt;

/// Result type alias for driftsync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur when propagating or registering configuration.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No canonical record exists for the requested application.
    #[error("Application '{app_id}' not found")]
    AppNotFound {
        /// The application id that was requested
        app_id: String,
    },

    /// No record exists for the requested node.
    #[error("Node '{node_id}' not found in application '{app_id}'")]
    NodeNotFound {
        /// The application id that was requested
        app_id: String,
        /// The node id that was requested
        node_id: String,
    },

    /// A configuration value could not be projected through a schema.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Failed to reach or read from the backing store. Transient; the
    /// propagation loop recovers with backoff, so this never reaches
    /// configuration consumers.
    #[error("Failed to fetch from backing store: {0}")]
    Fetch(String),

    /// Backing source does not support watch subscriptions.
    #[error("Backing source does not support watching")]
    WatchNotSupported,

    /// Failed to parse a document or schema.
    #[error("Failed to parse: {0}")]
    Parse(String),

    /// Registry transport returned an unexpected response.
    #[error("Registry error: {0}")]
    Registry(String),
}

/// Error raised when a flat configuration cannot be re-assembled into the
/// document its schema describes.
///
/// These indicate a caller-side data problem and are surfaced immediately,
/// never retried.
#[derive(Debug)]
pub enum ProjectionError {
    /// A required scalar value is absent.
    Missing {
        /// The flat path that had no value
        path: String,
    },

    /// A value is present but does not coerce to its declared type.
    Invalid {
        /// The flat path of the offending value
        path: String,
        /// The schema type that was expected
        expected: &'static str,
        /// The raw value that failed to coerce
        value: String,
    },

    /// The schema declares a type the projector does not understand.
    UnsupportedType {
        /// Path of the schema node
        path: String,
        /// The unrecognized type discriminator
        ty: String,
    },

    /// The schema node has no usable `type` discriminator.
    MissingType {
        /// Path of the schema node
        path: String,
    },
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(f, "Missing value at '{}'", path),
            Self::Invalid {
                path,
                expected,
                value,
            } => write!(f, "Invalid {} at '{}': {}", expected, path, value),
            Self::UnsupportedType { path, ty } => {
                write!(f, "Unsupported schema type '{}' at '{}'", ty, path)
            }
            Self::MissingType { path } => {
                write!(f, "Schema at '{}' does not declare a valid 'type'", path)
            }
        }
    }
}

impl std::error::Error for ProjectionError {}
