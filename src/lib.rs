//! Proxy Validator
//!
//! Validates candidate proxies concurrently and keeps only those proven to
//! forward traffic: the address a probe reports through a proxy must differ
//! from the host's own public address.

pub mod error;
pub mod proxy;

pub use error::ProbeError;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
