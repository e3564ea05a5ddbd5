//! Error types for the gRPC remote backplane transport.

use tagbus_core::BackplaneError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gRPC call failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("failed to connect to remote backplane: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("malformed response: missing field '{0}'")]
    MissingField(&'static str),
}

impl From<TransportError> for BackplaneError {
    fn from(err: TransportError) -> Self {
        BackplaneError::Transport(err.to_string())
    }
}
