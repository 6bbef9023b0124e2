//! Error types for cohort-common.

use thiserror::Error;

/// Error returned when parsing an [`Endpoint`](crate::Endpoint) from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointParseError {
    /// The input has no `:` separating host and port.
    #[error("endpoint must be of the form host:port, got {0:?}")]
    MissingPort(String),

    /// The host part before the `:` is empty.
    #[error("endpoint host cannot be empty in {0:?}")]
    EmptyHost(String),

    /// The port part is not a valid 16-bit unsigned integer.
    #[error("invalid port in endpoint {input:?}: {reason}")]
    InvalidPort {
        /// The full input that failed to parse.
        input: String,
        /// Why the port did not parse.
        reason: String,
    },
}
