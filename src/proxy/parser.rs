//! Candidate list parsing
//!
//! Lists hold one candidate per line, either `IP:PORT` (tagged with a
//! default protocol) or `scheme://IP:PORT`.

use crate::proxy::models::{Protocol, Proxy};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::debug;

static URL_FORMAT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9]+)://([^:/]+):(\d+)/?$").expect("Invalid proxy URL regex")
});

/// Parser for candidate proxy lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single line, returning `None` for blanks, comments and malformed entries
    pub fn parse_line(line: &str, default_protocol: Protocol) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if line.contains("://") {
            return Self::parse_url_format(line);
        }

        let (address, port) = line.split_once(':')?;
        Self::build(address, port, default_protocol)
    }

    /// Parse URL format proxy (e.g., http://ip:port or socks5://ip:port)
    fn parse_url_format(line: &str) -> Option<Proxy> {
        let caps = URL_FORMAT_REGEX.captures(line)?;
        let protocol = caps[1].parse().ok()?;
        Self::build(&caps[2], &caps[3], protocol)
    }

    fn build(address: &str, port: &str, protocol: Protocol) -> Option<Proxy> {
        let address: Ipv4Addr = address.trim().parse().ok()?;
        let port: u16 = port.trim().parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Proxy::new(address.to_string(), port, protocol))
    }

    /// Parse candidates from a string (multiple lines)
    pub fn parse_string(content: &str, default_protocol: Protocol) -> Vec<Proxy> {
        let proxies: Vec<Proxy> = content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_protocol))
            .collect();
        debug!(parsed = proxies.len(), "Parsed candidate list");
        proxies
    }

    /// Parse candidates from a file
    pub fn parse_file<P: AsRef<Path>>(path: P, default_protocol: Protocol) -> Result<Vec<Proxy>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content, default_protocol))
    }

    /// Save candidates to a file, one per line
    pub fn save_to_file<P: AsRef<Path>>(proxies: &[Proxy], path: P, with_scheme: bool) -> Result<()> {
        let content: String = proxies
            .iter()
            .map(|p| {
                if with_scheme {
                    p.url()
                } else {
                    p.to_simple_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(path, content)?;
        Ok(())
    }
}
