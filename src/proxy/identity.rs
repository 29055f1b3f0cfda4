//! Host identity resolution
//!
//! The host's own public address is the negative reference for every probe in
//! a run: a proxy whose probe reports this address did not forward traffic.

use crate::error::ProbeError;
use crate::proxy::ip::find_ipv4;
use crate::proxy::transport::{Route, Transport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// The caller's public-facing address for one validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "address", rename_all = "snake_case")]
pub enum HostIdentity {
    Known(Ipv4Addr),
    /// Resolution failed; never equal to any probe result.
    Unknown,
}

impl HostIdentity {
    pub fn address(&self) -> Option<Ipv4Addr> {
        match self {
            HostIdentity::Known(ip) => Some(*ip),
            HostIdentity::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, HostIdentity::Known(_))
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostIdentity::Known(ip) => write!(f, "{}", ip),
            HostIdentity::Unknown => write!(f, "unknown"),
        }
    }
}

/// Looks up the host identity through an unproxied request to an echo endpoint
pub struct IdentityResolver<'a> {
    transport: &'a dyn Transport,
    url: &'a str,
    timeout: Duration,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(transport: &'a dyn Transport, url: &'a str, timeout: Duration) -> Self {
        Self {
            transport,
            url,
            timeout,
        }
    }

    /// Resolve the host identity, degrading to `Unknown` on any failure
    pub async fn resolve(&self) -> HostIdentity {
        match self.lookup().await {
            Ok(ip) => {
                debug!(identity = %ip, url = self.url, "Resolved host identity");
                HostIdentity::Known(ip)
            }
            Err(e) => {
                warn!(url = self.url, error = %e, "{}", ProbeError::IdentityUnresolved);
                HostIdentity::Unknown
            }
        }
    }

    async fn lookup(&self) -> Result<Ipv4Addr, ProbeError> {
        let body = tokio::time::timeout(
            self.timeout,
            self.transport.get_text(self.url, Route::Direct),
        )
        .await
        .map_err(|_| ProbeError::Timeout(self.timeout))??;

        find_ipv4(&body).ok_or(ProbeError::MalformedResponse)
    }
}
