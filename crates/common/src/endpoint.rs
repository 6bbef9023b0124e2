//! Network identity of a cluster node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EndpointParseError;

/// Stable network identity of a cluster node: a host and port pair.
///
/// An `Endpoint` is opaque to the protocol beyond equality and hashing.
/// Monitors report about edges between endpoints, the watermark buffer
/// keys its report sets by endpoint, and proposals carry endpoints.
///
/// # Examples
///
/// ```
/// use cohort_common::Endpoint;
///
/// let endpoint = Endpoint::new("10.0.4.12", 5872);
/// assert_eq!(endpoint.to_string(), "10.0.4.12:5872");
///
/// let parsed: Endpoint = "10.0.4.12:5872".parse().unwrap();
/// assert_eq!(parsed, endpoint);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host part of the identity.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port part of the identity.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parses `host:port`. The split is on the last `:` so IPv6 hosts
    /// written without brackets still parse as long as the port is present.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| EndpointParseError::InvalidPort {
                input: s.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Endpoint::new(host, port))
    }
}
