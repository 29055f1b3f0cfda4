//! IPv4 literal extraction shared by identity resolution and probe classification

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

/// Four dot-separated octets in 0-255, no leading zeros, word-boundary delimited
static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b((25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b",
    )
    .expect("Invalid IPv4 regex")
});

/// Return the first IPv4 literal found in `text`
pub fn find_ipv4(text: &str) -> Option<Ipv4Addr> {
    IPV4_REGEX
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}
