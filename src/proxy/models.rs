//! Proxy data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Transport protocol a candidate proxy speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
    Socks5,
}

impl Protocol {
    /// URL scheme used when dialing a proxy of this protocol
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "socks5" => Ok(Protocol::Socks5),
            other => Err(format!(
                "Invalid protocol: {}. Use: http, https, socks5",
                other
            )),
        }
    }
}

/// A candidate proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy {
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Proxy {
    pub fn new(address: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            address: address.into(),
            port,
            protocol,
        }
    }

    /// Dial target in `protocol://address:port` form
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.address, self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Classified result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Traffic left through the proxy; carries the exit address the oracle saw.
    Verified(Ipv4Addr),
    /// The oracle saw the host's own address.
    SelfRouted,
    /// A response arrived but no address could be confirmed from it.
    Unreadable,
    /// No response within budget.
    Failed(String),
}

impl ProbeOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, ProbeOutcome::Verified(_))
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Verified(ip) => write!(f, "verified (exit {})", ip),
            ProbeOutcome::SelfRouted => write!(f, "self-routed"),
            ProbeOutcome::Unreadable => write!(f, "unreadable"),
            ProbeOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of a probe together with the candidate it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub proxy: Proxy,
    pub outcome: ProbeOutcome,
    /// Time until the full body arrived, when one did
    pub response_time_ms: Option<u64>,
}

impl ProbeResult {
    pub fn new(proxy: Proxy, outcome: ProbeOutcome, response_time_ms: Option<u64>) -> Self {
        Self {
            proxy,
            outcome,
            response_time_ms,
        }
    }

    pub fn failed(proxy: Proxy, reason: impl Into<String>) -> Self {
        Self::new(proxy, ProbeOutcome::Failed(reason.into()), None)
    }

    pub fn is_verified(&self) -> bool {
        self.outcome.is_verified()
    }
}
