//! Runtime error types and the exit-code mapping used by the process entry
//! point.

use thiserror::Error;

use crate::config::ConfigError;
use tagbus_framework::HostError;

/// Errors that can occur while building or driving a [`crate::runtime::TagbusRuntime`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gRPC server could not bind `messaging.host:messaging.port`.
    #[error("failed to bind remote backplane listener on {addr}: {source}")]
    BindFailure {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to a remote backplane as a client failed.
    #[error("failed to connect to remote backplane at {addr}: {source}")]
    ConnectFailure {
        addr: String,
        #[source]
        source: tagbus_transport::TransportError,
    },

    /// A plugin or rack registration failed during startup.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The plugin host panicked during startup and could not be recovered.
    #[error("plugin host panicked during startup: {0}")]
    StartupPanic(String),
}

impl RuntimeError {
    /// Maps this error to the process exit code documented in §6:
    /// `1` config failure, `2` remote backplane bind failure, `3`
    /// unrecoverable plugin-host startup panic. Errors with no dedicated
    /// code (host/connect failures surfaced after startup) map to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::BindFailure { .. } => 2,
            Self::StartupPanic(_) => 3,
            Self::ConnectFailure { .. } | Self::Host(_) => 1,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_documented_mapping() {
        assert_eq!(RuntimeError::Config(ConfigError::missing_field("x")).exit_code(), 1);
        assert_eq!(RuntimeError::StartupPanic("boom".into()).exit_code(), 3);
        assert_eq!(
            RuntimeError::BindFailure {
                addr: "127.0.0.1:4000".into(),
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
            }
            .exit_code(),
            2
        );
        assert_eq!(
            RuntimeError::Host(HostError::UnknownInstance("x".into())).exit_code(),
            1
        );
    }
}
