//! Proxy module for parsing and validating proxies
//!
//! This module provides functionality for:
//! - Parsing candidate lists (IP:PORT, scheme://IP:PORT)
//! - Resolving the host's own public address
//! - Probing candidates concurrently over HTTP forward proxies or SOCKS5 tunnels
//! - Reducing probe outcomes to the proxies that demonstrably forward traffic

pub mod executor;
pub mod identity;
pub mod ip;
pub mod models;
pub mod parser;
pub mod transport;
pub mod validator;

#[cfg(test)]
pub(crate) mod mock;

pub use executor::{ProbeExecutor, UnknownIdentityPolicy};
pub use identity::{HostIdentity, IdentityResolver};
pub use ip::find_ipv4;
pub use models::{ProbeOutcome, ProbeResult, Protocol, Proxy};
pub use parser::ProxyParser;
pub use transport::{HttpTransport, Route, Transport};
pub use validator::{ProxyValidator, ValidationReport, ValidatorConfig};
