//! Blocking HTTP transport over reqwest
//!
//! Thin glue that performs a single GET/POST/PATCH/PUT and hands back the
//! raw body together with the status code. Status checking is NOT done
//! here: non-success statuses are surfaced as plain [`RawResponse`]s so the
//! layers above can defer or branch on them. Only connectivity failures and
//! malformed arguments become errors at this level.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::blocking::{Client as ReqwestClient, ClientBuilder};
use reqwest::Method;
use url::Url;

use crate::client::Headers;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// A raw transport result: status code plus the unparsed body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    /// Lossy UTF-8 view of the body, used for error context.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Observer invoked with the wire response before the body is extracted.
pub type RawResponseObserver = Arc<dyn Fn(&reqwest::blocking::Response) + Send + Sync>;

/// Blocking transport wrapping a configured reqwest client.
pub struct HttpTransport {
    client: ReqwestClient,
    config: ClientConfig,
    observers: Vec<RawResponseObserver>,
}

impl HttpTransport {
    /// Build a transport from the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::default()
            } else {
                reqwest::redirect::Policy::none()
            });

        if config.cookie_store {
            builder = builder.cookie_store(true);
        }

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.url()).map_err(|e| Error::Argument {
                message: format!("invalid proxy address: {}", e),
            })?;
            builder = builder.proxy(proxy);
        }

        if !config.verify_ssl_hostname {
            // Under rustls, hostname verification is part of certificate
            // validation, so the whole check is relaxed together.
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| Error::Connect {
            message: format!("failed to build HTTP client: {}", e),
            source: Some(anyhow::Error::new(e)),
        })?;

        Ok(Self {
            client,
            config,
            observers: Vec::new(),
        })
    }

    /// Transport with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Rebuild the underlying client with a new configuration, keeping any
    /// registered observers.
    pub fn reconfigure(self, config: ClientConfig) -> Result<Self> {
        let mut fresh = Self::new(config)?;
        fresh.observers = self.observers;
        Ok(fresh)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Register an observer that sees every wire response before its body
    /// is read.
    pub fn add_response_observer(&mut self, observer: RawResponseObserver) {
        self.observers.push(observer);
    }

    pub fn http_get(&self, url: &str, headers: &Headers) -> Result<RawResponse> {
        self.execute(Method::GET, url, None, headers)
    }

    pub fn http_post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<RawResponse> {
        self.execute(Method::POST, url, Some(body), headers)
    }

    pub fn http_patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<RawResponse> {
        self.execute(Method::PATCH, url, Some(body), headers)
    }

    pub fn http_put(&self, url: &str, body: Bytes, headers: &Headers) -> Result<RawResponse> {
        self.execute(Method::PUT, url, Some(body), headers)
    }

    /// POST a multipart form.
    pub fn http_post_multipart(
        &self,
        url: &str,
        form: reqwest::blocking::multipart::Form,
        headers: &Headers,
    ) -> Result<RawResponse> {
        let url = self.parse_url(url)?;
        let mut request = self.client.request(Method::POST, url).multipart(form);
        request = self.apply_headers(request, headers)?;
        self.send(request)
    }

    fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        headers: &Headers,
    ) -> Result<RawResponse> {
        let url = self.parse_url(url)?;
        log::trace!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        request = self.apply_headers(request, headers)?;
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }
        self.send(request)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<RawResponse> {
        let response = request.send()?;

        for observer in &self.observers {
            observer(&response);
        }

        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| Error::Connect {
            message: format!("failed to read response body: {}", e),
            source: Some(anyhow::Error::new(e)),
        })?;

        log::trace!("response status {} ({} bytes)", status, body.len());
        Ok(RawResponse { status, body })
    }

    fn parse_url(&self, url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::Argument {
            message: format!("invalid url '{}': {}", url, e),
        })
    }

    fn apply_headers(
        &self,
        mut request: reqwest::blocking::RequestBuilder,
        headers: &Headers,
    ) -> Result<reqwest::blocking::RequestBuilder> {
        request = request.header("Accept-Charset", &self.config.accept_charset);
        for (key, value) in headers {
            let name = reqwest::header::HeaderName::try_from(key.as_str()).map_err(|e| {
                Error::Argument {
                    message: format!("invalid header name '{}': {}", key, e),
                }
            })?;
            let value =
                reqwest::header::HeaderValue::try_from(value.as_str()).map_err(|e| {
                    Error::Argument {
                        message: format!("invalid header value for '{}': {}", key, e),
                    }
                })?;
            request = request.header(name, value);
        }
        Ok(request)
    }
}
