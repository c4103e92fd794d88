//! Transport configuration
//!
//! Options consumed by [`HttpTransport`](crate::transport::HttpTransport)
//! when building the underlying blocking reqwest client.

use std::time::Duration;

/// An intermediate HTTP proxy for outgoing requests.
///
/// A common use is routing traffic through a local debugging proxy such as
/// Fiddler, which listens on localhost:8888.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy pointing at localhost:8888 (the Fiddler default).
    pub fn localhost_debugging() -> Self {
        Self::new("localhost", 8888)
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Optional intermediate proxy.
    pub proxy: Option<Proxy>,
    /// Charset advertised via the Accept-Charset header.
    pub accept_charset: String,
    /// Whether to verify TLS hostnames. Disabled by
    /// `without_ssl_hostname_verification`.
    pub verify_ssl_hostname: bool,
    /// Whether redirects are followed automatically.
    pub follow_redirects: bool,
    /// Whether a cookie store is attached to the transport.
    pub cookie_store: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            proxy: None,
            accept_charset: "utf-8".to_string(),
            verify_ssl_hostname: true,
            follow_redirects: true,
            cookie_store: false,
        }
    }
}
