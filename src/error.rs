//! Error types for proxy probing

use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Everything that can stop a probe or identity lookup from producing a usable address.
///
/// None of these escape `ProxyValidator::validate`; they are folded into a
/// `ProbeOutcome` at the probe boundary.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to build client for {target}: {source}")]
    ClientBuild {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("No IPv4 address in response body")]
    MalformedResponse,

    #[error("Proxy exposed the host's own address {0}")]
    SelfRouting(Ipv4Addr),

    #[error("Host identity could not be resolved")]
    IdentityUnresolved,
}

impl ProbeError {
    /// Whether this error happened before any response was obtained
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProbeError::ClientBuild { .. }
                | ProbeError::Connect(_)
                | ProbeError::Request(_)
                | ProbeError::Timeout(_)
        )
    }
}
