//! Scripted transport used by the unit tests

use crate::error::ProbeError;
use crate::proxy::models::Proxy;
use crate::proxy::transport::{Route, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Canned answer for one route
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    delay: Duration,
    body: Option<String>,
}

impl Reply {
    pub(crate) fn body(body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            body: Some(body.to_string()),
        }
    }

    pub(crate) fn refuse() -> Self {
        Self {
            delay: Duration::ZERO,
            body: None,
        }
    }

    /// Never answers within any sane budget
    pub(crate) fn hang() -> Self {
        Self::body("").after(Duration::from_secs(3600))
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    direct: Option<Reply>,
    proxied: HashMap<Proxy, Reply>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn direct(mut self, reply: Reply) -> Self {
        self.direct = Some(reply);
        self
    }

    pub(crate) fn via(mut self, proxy: &Proxy, reply: Reply) -> Self {
        self.proxied.insert(proxy.clone(), reply);
        self
    }

    /// Requests seen so far, as `<route> <url>`
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_text(&self, url: &str, route: Route<'_>) -> Result<String, ProbeError> {
        let label = match route {
            Route::Direct => format!("direct {}", url),
            Route::Forward(proxy) => format!("forward:{} {}", proxy, url),
            Route::Tunnel(proxy) => format!("tunnel:{} {}", proxy, url),
        };
        self.calls.lock().unwrap().push(label);

        let reply = match route.proxy() {
            None => self.direct.clone(),
            Some(proxy) => self.proxied.get(proxy).cloned(),
        }
        .unwrap_or_else(Reply::refuse);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        reply
            .body
            .ok_or_else(|| ProbeError::Connect("connection refused".to_string()))
    }
}
