//! HTTP transport with per-protocol routing
//!
//! A request either goes out directly, through a forward (HTTP/HTTPS) proxy,
//! or through a SOCKS5 tunnel. The route is picked from the candidate's
//! protocol tag and every route is served by the same `Transport` trait so
//! the network layer can be swapped out.

use crate::error::ProbeError;
use crate::proxy::models::{Protocol, Proxy};
use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};

/// Default user agent for outbound requests
pub const DEFAULT_USER_AGENT: &str = concat!("proxy-validator/", env!("CARGO_PKG_VERSION"));

/// Bytes kept from a response body; anything past this is dropped unread
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Path a single request takes to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// The host's own network path
    Direct,
    /// Request handed to an HTTP/HTTPS forward proxy
    Forward(&'a Proxy),
    /// Request carried over a SOCKS5 tunnel opened for it alone
    Tunnel(&'a Proxy),
}

impl<'a> Route<'a> {
    /// Route used to probe through `proxy`
    pub fn through(proxy: &'a Proxy) -> Self {
        match proxy.protocol {
            Protocol::Http | Protocol::Https => Route::Forward(proxy),
            Protocol::Socks5 => Route::Tunnel(proxy),
        }
    }

    pub fn proxy(&self) -> Option<&'a Proxy> {
        match *self {
            Route::Direct => None,
            Route::Forward(proxy) | Route::Tunnel(proxy) => Some(proxy),
        }
    }
}

/// Fetches a URL as text over a given route
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` over `route` and return the full body.
    ///
    /// Implementations do not enforce a deadline; callers wrap this in their own budget.
    async fn get_text(&self, url: &str, route: Route<'_>) -> Result<String, ProbeError>;
}

/// `reqwest`-backed transport
///
/// Direct requests reuse one pooled client that ignores `HTTP_PROXY` and
/// friends. Proxied requests get a client of their own, dropped with the
/// request; tunnel clients never keep idle connections around.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    direct: Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Result<Self, ProbeError> {
        let user_agent = user_agent.into();
        let direct = Client::builder()
            .user_agent(&user_agent)
            .no_proxy()
            .build()
            .map_err(|source| ProbeError::ClientBuild {
                target: "direct".to_string(),
                source,
            })?;

        Ok(Self { direct, user_agent })
    }

    /// Create a reqwest client for a proxied route
    fn proxied_client(&self, route: Route<'_>) -> Result<Client, ProbeError> {
        let builder = Client::builder().user_agent(&self.user_agent);

        let built = match route {
            Route::Direct => return Ok(self.direct.clone()),
            Route::Forward(proxy) => {
                ReqwestProxy::all(proxy.url()).and_then(|p| builder.proxy(p).build())
            }
            Route::Tunnel(proxy) => ReqwestProxy::all(proxy.url())
                .and_then(|p| builder.proxy(p).pool_max_idle_per_host(0).build()),
        };

        built.map_err(|source| ProbeError::ClientBuild {
            target: route.proxy().map(Proxy::url).unwrap_or_default(),
            source,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str, route: Route<'_>) -> Result<String, ProbeError> {
        let client = self.proxied_client(route)?;
        let mut response = client.get(url).send().await.map_err(|e| {
            if e.is_connect() {
                ProbeError::Connect(e.to_string())
            } else {
                ProbeError::Request(e)
            }
        })?;

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_BODY_BYTES {
                body.truncate(MAX_BODY_BYTES);
                break;
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP responder on loopback; records each request line it sees
    async fn serve(body: String) -> (u16, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let text = String::from_utf8_lossy(&request);
                log.lock()
                    .unwrap()
                    .push(text.lines().next().unwrap_or_default().to_string());

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (port, seen)
    }

    /// A loopback port with nothing listening on it
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_route_through_http_proxies() {
        let http = Proxy::new("1.2.3.4", 8080, Protocol::Http);
        let https = Proxy::new("1.2.3.4", 8443, Protocol::Https);
        assert_eq!(Route::through(&http), Route::Forward(&http));
        assert_eq!(Route::through(&https), Route::Forward(&https));
    }

    #[test]
    fn test_route_through_socks5() {
        let socks = Proxy::new("5.6.7.8", 1080, Protocol::Socks5);
        assert_eq!(Route::through(&socks), Route::Tunnel(&socks));
        assert_eq!(Route::through(&socks).proxy(), Some(&socks));
        assert_eq!(Route::Direct.proxy(), None);
    }

    #[test]
    fn test_http_transport_builds_clients_for_every_route() {
        let transport = HttpTransport::new().unwrap();
        let http = Proxy::new("127.0.0.1", 8080, Protocol::Http);
        let socks = Proxy::new("127.0.0.1", 1080, Protocol::Socks5);

        assert!(transport.proxied_client(Route::Direct).is_ok());
        assert!(transport.proxied_client(Route::Forward(&http)).is_ok());
        assert!(transport.proxied_client(Route::Tunnel(&socks)).is_ok());
    }

    #[tokio::test]
    async fn test_forward_route_goes_through_proxy() {
        let (port, seen) = serve("{\"origin\": \"198.51.100.7\"}".to_string()).await;
        let proxy = Proxy::new("127.0.0.1", port, Protocol::Http);
        let transport = HttpTransport::new().unwrap();

        let body = transport
            .get_text("http://198.51.100.1/ip", Route::Forward(&proxy))
            .await
            .unwrap();

        assert!(body.contains("198.51.100.7"));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["GET http://198.51.100.1/ip HTTP/1.1"]
        );
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connect() {
        let port = closed_port().await;
        let transport = HttpTransport::new().unwrap();

        let err = transport
            .get_text(&format!("http://127.0.0.1:{}/ip", port), Route::Direct)
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Connect(_)), "got {:?}", err);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_direct_route_ignores_environment_proxy() {
        let (env_port, env_seen) = serve("7.7.7.7".to_string()).await;
        let (echo_port, echo_seen) = serve("203.0.113.9".to_string()).await;

        std::env::set_var("HTTP_PROXY", format!("http://127.0.0.1:{}", env_port));
        std::env::set_var("http_proxy", format!("http://127.0.0.1:{}", env_port));
        let transport = HttpTransport::new();
        std::env::remove_var("HTTP_PROXY");
        std::env::remove_var("http_proxy");

        let body = transport
            .unwrap()
            .get_text(&format!("http://127.0.0.1:{}/ip", echo_port), Route::Direct)
            .await
            .unwrap();

        assert_eq!(body, "203.0.113.9");
        assert!(env_seen.lock().unwrap().is_empty());
        assert_eq!(echo_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let mut huge = String::from("10.9.8.7 ");
        huge.push_str(&"x".repeat(4 * MAX_BODY_BYTES));
        let (port, _) = serve(huge).await;
        let transport = HttpTransport::new().unwrap();

        let body = transport
            .get_text(&format!("http://127.0.0.1:{}/ip", port), Route::Direct)
            .await
            .unwrap();

        assert_eq!(body.len(), MAX_BODY_BYTES);
        assert!(body.starts_with("10.9.8.7 "));
    }
}
