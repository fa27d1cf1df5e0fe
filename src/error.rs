//! Error types for atlasbind
//!
//! Two layers of errors live here:
//! - [`Error`]: what callers of the binding see. Either the handle is closed,
//!   or the engine reported a failure whose message is carried verbatim.
//! - [`StoreError`]: the bundled engine's internal error. It never crosses the
//!   native boundary as a type; it is rendered to its message string there.

use thiserror::Error;

/// Result type alias for binding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for engine internals
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error returned by every fallible binding operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    /// The handle was closed before this operation acquired access
    #[error("db engine closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    /// The engine rejected an otherwise well-formed call
    #[error("{0}")]
    Engine(String),
}

impl Error {
    /// True if this is the closed-handle error
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// The engine's message, if this error came from the engine
    pub fn engine_message(&self) -> Option<&str> {
        match self {
            Error::Engine(msg) => Some(msg),
            Error::Closed => None,
        }
    }
}

/// Internal error type for the bundled storage engine
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Corruption: serialization failed: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Shutdown in progress: {0}")]
    ShutdownInProgress(String),
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Fail fast on a programming error that makes continuing unsafe.
///
/// Out-of-range callback indices and mismatched column family arguments end
/// up here.
#[track_caller]
pub fn invariant_violation(msg: impl AsRef<str>) -> ! {
    let msg = msg.as_ref();
    tracing::error!("invariant violation: {}", msg);
    panic!("invariant violation: {}", msg);
}
