//! Error types for the tag registry and in-memory backplane.

use thiserror::Error;

/// Errors raised by [`crate::registry::TagRegistry`].
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// No tag is registered at the given handle.
    #[error("no tag registered at handle {0}")]
    NotRegistered(u32),

    /// No tag is registered at the given path.
    #[error("no tag registered at path '{0}'")]
    PathNotFound(String),

    /// The path already belongs to a different owner/role than requested.
    #[error("tag path '{path}' is already registered with a conflicting role or owner")]
    Conflict { path: String },
}

/// Errors raised by [`crate::backplane::InMemoryBackplane`].
#[derive(Debug, Clone, Error)]
pub enum BackplaneError {
    /// The backplane has been disposed and can no longer be used.
    #[error("backplane has been disposed")]
    Disposed,

    /// A remote backplane implementation (gRPC) failed at the transport
    /// level - connection refused, RPC error, stream closed unexpectedly.
    #[error("backplane transport error: {0}")]
    Transport(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type BackplaneResult<T> = Result<T, BackplaneError>;
