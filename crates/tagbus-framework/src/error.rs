//! Error types for the tag service facade and the plugin host.

use thiserror::Error;
use tagbus_core::{BackplaneError, RegistryError};

/// Errors surfaced by [`crate::tag_service::TagService`].
#[derive(Debug, Clone, Error)]
pub enum TagServiceError {
    /// `SetTag` was called against a path with no registered handle.
    #[error("tag '{0}' is not registered")]
    NotRegistered(String),

    #[error(transparent)]
    Backplane(#[from] BackplaneError),
}

impl From<RegistryError> for TagServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::PathNotFound(path) => TagServiceError::NotRegistered(path),
            RegistryError::NotRegistered(handle) => {
                TagServiceError::NotRegistered(format!("handle {handle}"))
            }
            RegistryError::Conflict { path } => TagServiceError::NotRegistered(path),
        }
    }
}

/// Errors surfaced by [`crate::host::PluginHost`] lifecycle and placement
/// operations.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("rack '{0}' does not exist")]
    RackNotFound(String),

    #[error("slot {slot} does not exist in rack '{rack}'")]
    SlotNotFound { rack: String, slot: i32 },

    #[error("slot {slot} in rack '{rack}' is already occupied by '{occupant}'")]
    SlotOccupied {
        rack: String,
        slot: i32,
        occupant: String,
    },

    #[error("plugin '{0}' is not a known instance")]
    UnknownInstance(String),

    #[error("plugin '{0}' failed to load: {1}")]
    LoadFailure(String, String),

    /// A `RegisterTags` call failed - either the local registry (never, in
    /// practice) or a remote backplane's `RegisterTags` RPC.
    #[error("RegisterTags failed: {0}")]
    RegistrationFailed(String),

    #[error("service '{0}' was not found in the service registry")]
    ServiceNotFound(String),

    #[error(transparent)]
    TagService(#[from] TagServiceError),
}
