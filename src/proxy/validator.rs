//! Validation orchestrator
//!
//! A run resolves the host identity and probes every candidate at the same
//! time, waits for all of them, then keeps the candidates whose probe proved
//! that traffic left through the proxy.

use crate::error::ProbeError;
use crate::proxy::executor::{Fetch, ProbeExecutor, UnknownIdentityPolicy};
use crate::proxy::identity::{HostIdentity, IdentityResolver};
use crate::proxy::models::{ProbeResult, Proxy};
use crate::proxy::transport::{HttpTransport, Transport, DEFAULT_USER_AGENT};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default per-probe budget in seconds
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 4;

/// Default budget for the identity lookup in seconds
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 4;

/// Default cap on probes in flight; each holds its own client and socket
const DEFAULT_CONCURRENCY: usize = 256;

/// Connectivity oracle probed through each candidate
const DEFAULT_PROBE_URL: &str = "http://httpbin.org/ip";

/// Endpoint echoing the caller's address, queried without a proxy
const DEFAULT_IDENTITY_URL: &str = "https://ifconfig.me";

/// Configuration for a validation run
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Budget for each probe, from dispatch to full body
    pub probe_timeout: Duration,
    /// Budget for the identity lookup
    pub identity_timeout: Duration,
    /// URL probed through each candidate
    pub probe_url: String,
    /// URL that echoes the host's address
    pub identity_url: String,
    /// Maximum probes in flight; `None` probes every candidate at once
    pub concurrency: Option<usize>,
    /// What to do with readable probes when the identity is unknown
    pub unknown_identity: UnknownIdentityPolicy,
    /// User agent for outbound requests
    pub user_agent: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            identity_timeout: Duration::from_secs(DEFAULT_IDENTITY_TIMEOUT_SECS),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            concurrency: Some(DEFAULT_CONCURRENCY),
            unknown_identity: UnknownIdentityPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency.max(1));
        self
    }

    /// Lift the cap and probe every candidate at once
    pub fn unbounded(mut self) -> Self {
        self.concurrency = None;
        self
    }

    pub fn with_unknown_identity(mut self, policy: UnknownIdentityPolicy) -> Self {
        self.unknown_identity = policy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Every outcome of one run, aligned with the input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub identity: HostIdentity,
    pub results: Vec<ProbeResult>,
}

impl ValidationReport {
    /// Verified candidates in input order
    pub fn verified(&self) -> impl Iterator<Item = &Proxy> {
        self.results
            .iter()
            .filter(|r| r.is_verified())
            .map(|r| &r.proxy)
    }

    /// Split results into verified and rejected, keeping order within each
    pub fn partition(self) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
        self.results.into_iter().partition(|r| r.is_verified())
    }
}

/// Validates candidate proxies concurrently
#[derive(Clone)]
pub struct ProxyValidator {
    config: ValidatorConfig,
    transport: Arc<dyn Transport>,
}

impl ProxyValidator {
    /// Create a validator with default configuration
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_config(ValidatorConfig::default())
    }

    /// Create a validator backed by the real HTTP transport
    pub fn with_config(config: ValidatorConfig) -> Result<Self, ProbeError> {
        let transport = HttpTransport::with_user_agent(&config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a validator over any transport
    pub fn with_transport(config: ValidatorConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Resolve the host identity on its own
    pub async fn resolve_identity(&self) -> HostIdentity {
        self.resolver().resolve().await
    }

    /// Validate a single candidate
    pub async fn probe(&self, proxy: &Proxy) -> ProbeResult {
        let executor = self.executor();
        let (identity, fetch) =
            future::join(self.resolve_identity(), executor.fetch(proxy)).await;
        fetch.classify(proxy.clone(), &identity, self.config.unknown_identity)
    }

    /// Probe every candidate and return all outcomes
    pub async fn check_proxies(&self, proxies: &[Proxy]) -> ValidationReport {
        debug!(candidates = proxies.len(), "Dispatched validation run");

        let resolver = self.resolver();
        let executor = self.executor();
        let limit = self.config.concurrency.unwrap_or(proxies.len()).max(1);

        let probes = stream::iter(proxies.iter().enumerate())
            .map(|(idx, proxy)| {
                let executor = &executor;
                async move { (idx, executor.fetch(proxy).await) }
            })
            .buffer_unordered(limit)
            .collect::<Vec<(usize, Fetch)>>();

        let (identity, fetched) = future::join(resolver.resolve(), probes).await;
        debug!(identity = %identity, "All probes settled");

        let mut slots: Vec<Option<Fetch>> = proxies.iter().map(|_| None).collect();
        for (idx, fetch) in fetched {
            slots[idx] = Some(fetch);
        }

        let results: Vec<ProbeResult> = proxies
            .iter()
            .zip(slots)
            .map(|(proxy, slot)| match slot {
                Some(fetch) => fetch.classify(proxy.clone(), &identity, self.config.unknown_identity),
                None => ProbeResult::failed(proxy.clone(), "probe did not complete"),
            })
            .collect();

        let verified = results.iter().filter(|r| r.is_verified()).count();
        info!(
            identity = %identity,
            candidates = proxies.len(),
            verified,
            "Validation run reduced"
        );

        ValidationReport { identity, results }
    }

    /// Return the candidates that demonstrably forwarded traffic, in input order
    pub async fn validate(&self, proxies: &[Proxy]) -> Vec<Proxy> {
        self.check_proxies(proxies)
            .await
            .verified()
            .cloned()
            .collect()
    }

    fn resolver(&self) -> IdentityResolver<'_> {
        IdentityResolver::new(
            self.transport.as_ref(),
            &self.config.identity_url,
            self.config.identity_timeout,
        )
    }

    fn executor(&self) -> ProbeExecutor<'_> {
        ProbeExecutor::new(
            self.transport.as_ref(),
            &self.config.probe_url,
            self.config.probe_timeout,
        )
    }
}
