//! Error types for the transport layer.

use thiserror::Error;

/// Errors that can occur in the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The gRPC stack failed to serve.
    #[error("gRPC transport error: {0}")]
    GrpcTransport(#[from] tonic::transport::Error),

    /// The listener socket could not be opened or inspected.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was called on a server that is already running.
    #[error("transport server already started")]
    AlreadyStarted,

    /// `set_membership_service` was called more than once.
    #[error("membership service already bound")]
    AlreadyBound,

    /// A wire message could not be mapped to a domain type.
    #[error("message conversion error: {0}")]
    Conversion(String),
}
