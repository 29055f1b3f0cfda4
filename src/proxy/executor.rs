//! Probe executor: one bounded connectivity check through one candidate

use crate::error::ProbeError;
use crate::proxy::identity::HostIdentity;
use crate::proxy::ip::find_ipv4;
use crate::proxy::models::{ProbeOutcome, ProbeResult, Proxy};
use crate::proxy::transport::{Route, Transport};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::debug;

/// How to treat a readable probe when the host identity is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdentityPolicy {
    /// Forwarding cannot be proven, so the probe counts as unreadable.
    #[default]
    FailClosed,
    /// Any extracted address counts as verified.
    FailOpen,
}

/// Raw result of dispatching a probe, before the host identity is known
#[derive(Debug)]
pub struct Fetch {
    pub body: Result<String, ProbeError>,
    pub elapsed: Duration,
}

impl Fetch {
    /// Turn the raw fetch into a classified result for `proxy`
    pub fn classify(
        self,
        proxy: Proxy,
        identity: &HostIdentity,
        policy: UnknownIdentityPolicy,
    ) -> ProbeResult {
        let response_time_ms = self.body.is_ok().then(|| self.elapsed.as_millis() as u64);
        let outcome = classify(self.body, identity, policy);
        debug!(proxy = %proxy, outcome = %outcome, "Classified probe");
        ProbeResult::new(proxy, outcome, response_time_ms)
    }
}

/// Map a fetched body (or the error that prevented one) onto a probe outcome
pub fn classify(
    body: Result<String, ProbeError>,
    identity: &HostIdentity,
    policy: UnknownIdentityPolicy,
) -> ProbeOutcome {
    match body.and_then(|body| exit_address(&body, identity, policy)) {
        Ok(ip) => ProbeOutcome::Verified(ip),
        Err(e) if e.is_transport() => ProbeOutcome::Failed(e.to_string()),
        Err(ProbeError::SelfRouting(_)) => ProbeOutcome::SelfRouted,
        Err(_) => ProbeOutcome::Unreadable,
    }
}

fn exit_address(
    body: &str,
    identity: &HostIdentity,
    policy: UnknownIdentityPolicy,
) -> Result<Ipv4Addr, ProbeError> {
    let seen = find_ipv4(body).ok_or(ProbeError::MalformedResponse)?;

    match identity.address() {
        Some(host) if host == seen => Err(ProbeError::SelfRouting(seen)),
        Some(_) => Ok(seen),
        None => match policy {
            UnknownIdentityPolicy::FailOpen => Ok(seen),
            UnknownIdentityPolicy::FailClosed => Err(ProbeError::IdentityUnresolved),
        },
    }
}

/// Dispatches probes against a fixed connectivity oracle
pub struct ProbeExecutor<'a> {
    transport: &'a dyn Transport,
    url: &'a str,
    timeout: Duration,
}

impl<'a> ProbeExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, url: &'a str, timeout: Duration) -> Self {
        Self {
            transport,
            url,
            timeout,
        }
    }

    /// Fetch the oracle through `proxy` within the time budget
    pub async fn fetch(&self, proxy: &Proxy) -> Fetch {
        let start = Instant::now();
        let route = Route::through(proxy);

        let body = match tokio::time::timeout(self.timeout, self.transport.get_text(self.url, route))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        };

        if let Err(ref e) = body {
            debug!(proxy = %proxy, error = %e, "Probe failed");
        }

        Fetch {
            body,
            elapsed: start.elapsed(),
        }
    }

    /// Probe `proxy` and classify the result against a known host identity
    pub async fn probe(
        &self,
        proxy: &Proxy,
        identity: &HostIdentity,
        policy: UnknownIdentityPolicy,
    ) -> ProbeResult {
        self.fetch(proxy)
            .await
            .classify(proxy.clone(), identity, policy)
    }
}
