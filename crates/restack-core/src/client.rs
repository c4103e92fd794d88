//! The uniform request contract and the base HTTP client
//!
//! [`RestClient`] is the capability set every base transport and every
//! decorator implements identically; decorators wrap another `RestClient`
//! and stay interchangeable behind it. [`HttpRestClient`] is the base
//! implementation over [`HttpTransport`], carrying the media-type defaults
//! of its flavor (JSON, XML, plain text, binary). [`RestClientExt`] adds
//! the typed convenience layer and the composition methods.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::builder::RequestBuilder;
use crate::cache::{CacheStore, CachingClient, JsonFileCacheStore};
use crate::config::{ClientConfig, Proxy};
use crate::error::{Error, Result};
use crate::form::FormBuilder;
use crate::media::MediaType;
use crate::response::{is_success_status, ResponseHolder};
use crate::retry::{RetryPolicy, RetryingClient};
use crate::transport::{HttpTransport, RawResponseObserver};

/// Request headers: de-duplicated by key with deterministic order, so two
/// header sets with the same entries always canonicalize identically.
pub type Headers = BTreeMap<String, String>;

/// The uniform request capability implemented by base clients and
/// decorators alike.
///
/// Payloads are raw bodies; typed decoding lives in [`RestClientExt`] so
/// that decorators stay object-safe and the caching decorator memoizes at
/// the body level. `get` returns `Ok(None)` only for negative cache
/// entries; a base client either produces a body or an error.
pub trait RestClient: Send + Sync {
    /// GET returning the validated body.
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>>;

    /// GET returning a holder that defers status validation until consumed.
    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>>;

    /// POST returning the validated response body. Never cached.
    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes>;

    /// PATCH returning the validated response body. Never cached.
    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes>;
}

impl<C: RestClient + ?Sized> RestClient for &C {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        (**self).get(url, headers)
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        (**self).get_and(url, headers)
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).post(url, body, headers)
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).patch(url, body, headers)
    }
}

impl<C: RestClient + ?Sized> RestClient for Box<C> {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        (**self).get(url, headers)
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        (**self).get_and(url, headers)
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).post(url, body, headers)
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).patch(url, body, headers)
    }
}

impl<C: RestClient + ?Sized> RestClient for Arc<C> {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        (**self).get(url, headers)
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        (**self).get_and(url, headers)
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).post(url, body, headers)
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        (**self).patch(url, body, headers)
    }
}

/// Base client over the blocking transport, with per-flavor media defaults.
pub struct HttpRestClient {
    transport: HttpTransport,
    accept_media_type: Option<String>,
    content_media_type: Option<String>,
}

impl HttpRestClient {
    /// Client without media-type defaults over an existing transport.
    pub fn new(transport: HttpTransport) -> Self {
        Self {
            transport,
            accept_media_type: None,
            content_media_type: None,
        }
    }

    /// JSON-flavored client: `Accept: application/json;charset=utf-8`.
    pub fn json() -> Result<Self> {
        Ok(Self::new(HttpTransport::with_defaults()?)
            .with_accept_media_type(MediaType::ApplicationJsonUtf8)
            .with_content_media_type(MediaType::ApplicationJson))
    }

    /// XML-flavored client: `Accept: application/xml;charset=utf-8`.
    /// Bodies stay raw strings; no XML data binding is applied.
    pub fn xml() -> Result<Self> {
        Ok(Self::new(HttpTransport::with_defaults()?)
            .with_accept_media_type(MediaType::ApplicationXmlUtf8)
            .with_content_media_type(MediaType::ApplicationXml))
    }

    /// Plain-text client: `Accept: text/plain`.
    pub fn text() -> Result<Self> {
        Ok(Self::new(HttpTransport::with_defaults()?)
            .with_accept_media_type(MediaType::TextPlain)
            .with_content_media_type(MediaType::TextPlain))
    }

    /// Binary client: `Accept: application/octet-stream`.
    pub fn bytes() -> Result<Self> {
        Ok(Self::new(HttpTransport::with_defaults()?)
            .with_accept_media_type(MediaType::ApplicationOctetStream)
            .with_content_media_type(MediaType::ApplicationOctetStream))
    }

    pub fn config(&self) -> &ClientConfig {
        self.transport.config()
    }

    /// Route requests through an intermediate proxy.
    pub fn with_proxy(self, proxy: Proxy) -> Result<Self> {
        let mut config = self.transport.config().clone();
        config.proxy = Some(proxy);
        self.reconfigured(config)
    }

    /// Route requests through localhost:8888 (e.g. a Fiddler debugger).
    pub fn with_default_localhost_proxy(self) -> Result<Self> {
        self.with_proxy(Proxy::localhost_debugging())
    }

    pub fn with_accept_charset(self, charset: impl Into<String>) -> Result<Self> {
        let mut config = self.transport.config().clone();
        config.accept_charset = charset.into();
        self.reconfigured(config)
    }

    pub fn without_ssl_hostname_verification(self) -> Result<Self> {
        let mut config = self.transport.config().clone();
        config.verify_ssl_hostname = false;
        self.reconfigured(config)
    }

    pub fn without_redirect_following(self) -> Result<Self> {
        let mut config = self.transport.config().clone();
        config.follow_redirects = false;
        self.reconfigured(config)
    }

    pub fn with_cookie_store(self) -> Result<Self> {
        let mut config = self.transport.config().clone();
        config.cookie_store = true;
        self.reconfigured(config)
    }

    pub fn with_accept_media_type(mut self, media_type: MediaType) -> Self {
        self.accept_media_type = Some(media_type.header_value().to_string());
        self
    }

    pub fn with_accept_media_type_value(mut self, media_type: impl Into<String>) -> Self {
        self.accept_media_type = Some(media_type.into());
        self
    }

    pub fn with_content_media_type(mut self, media_type: MediaType) -> Self {
        self.content_media_type = Some(media_type.header_value().to_string());
        self
    }

    pub fn with_content_media_type_value(mut self, media_type: impl Into<String>) -> Self {
        self.content_media_type = Some(media_type.into());
        self
    }

    /// Register a raw-response observer on the underlying transport.
    pub fn with_response_observer(mut self, observer: RawResponseObserver) -> Self {
        self.transport.add_response_observer(observer);
        self
    }

    /// POST a multipart form through the transport, with the usual status
    /// validation.
    pub fn post_multipart(
        &self,
        url: &str,
        form: reqwest::blocking::multipart::Form,
        headers: &Headers,
    ) -> Result<Bytes> {
        let merged = self.merged_headers(headers, false);
        let response = self.transport.http_post_multipart(url, form, &merged)?;
        self.checked_body(response)
    }

    /// PUT returning the validated response body.
    pub fn put(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        let merged = self.merged_headers(headers, true);
        let response = self.transport.http_put(url, body, &merged)?;
        self.checked_body(response)
    }

    fn reconfigured(self, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: self.transport.reconfigure(config)?,
            accept_media_type: self.accept_media_type,
            content_media_type: self.content_media_type,
        })
    }

    /// Merge the flavor defaults into the caller's headers. A default is
    /// only applied when the caller did not re-supply the same key.
    fn merged_headers(&self, headers: &Headers, include_content_type: bool) -> Headers {
        let mut merged = headers.clone();
        if let Some(accept) = &self.accept_media_type {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case("accept")) {
                merged.insert("Accept".to_string(), accept.clone());
            }
        }
        if include_content_type {
            if let Some(content_type) = &self.content_media_type {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    merged.insert("Content-Type".to_string(), content_type.clone());
                }
            }
        }
        merged
    }

    fn checked_body(&self, response: crate::transport::RawResponse) -> Result<Bytes> {
        if is_success_status(response.status) {
            Ok(response.body)
        } else {
            Err(Error::Status {
                status: response.status,
                body: response.body_text(),
            })
        }
    }
}

impl RestClient for HttpRestClient {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        let merged = self.merged_headers(headers, false);
        let response = self.transport.http_get(url, &merged)?;
        self.checked_body(response).map(Some)
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        let merged = self.merged_headers(headers, false);
        let response = self.transport.http_get(url, &merged)?;
        let preview = response.body_text();
        Ok(ResponseHolder::with_preview(
            Some(response.body),
            response.status,
            preview,
        ))
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        let merged = self.merged_headers(headers, true);
        let response = self.transport.http_post(url, body, &merged)?;
        self.checked_body(response)
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        let merged = self.merged_headers(headers, true);
        let response = self.transport.http_patch(url, body, &merged)?;
        self.checked_body(response)
    }
}

/// Typed helpers and decorator composition over any [`RestClient`].
///
/// Composition is caller-controlled: `client.with_retry(..).with_cache(..)`
/// retries around cache misses, while `with_cache(..).with_retry(..)`
/// retries the cached view. Each `with_*` wraps the receiver in a new
/// decorator instead of mutating shared state.
pub trait RestClientExt: RestClient {
    /// GET and decode the body as JSON. `Ok(None)` passes negative cache
    /// entries through undecoded.
    fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &Headers) -> Result<Option<T>> {
        match self.get(url, headers)? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }

    /// Deferred GET decoding as JSON on consumption.
    fn get_json_and<T>(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<T>>>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        Ok(self.get_and(url, headers)?.try_map(|body| match body {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }))
    }

    /// GET the body as UTF-8 text.
    fn get_text(&self, url: &str, headers: &Headers) -> Result<Option<String>> {
        match self.get(url, headers)? {
            Some(body) => String::from_utf8(body.to_vec())
                .map(Some)
                .map_err(|e| Error::Decode {
                    message: format!("response body is not valid UTF-8: {}", e),
                }),
            None => Ok(None),
        }
    }

    /// GET the raw body.
    fn get_bytes(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        self.get(url, headers)
    }

    /// POST a JSON body and decode a JSON response.
    fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: &Headers,
    ) -> Result<R> {
        let payload = serde_json::to_vec(body).map_err(|e| Error::Argument {
            message: format!("failed to serialize request body: {}", e),
        })?;
        let mut headers = headers.clone();
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| MediaType::ApplicationJson.header_value().to_string());
        let response = self.post(url, payload.into(), &headers)?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// PATCH a JSON body and decode a JSON response.
    fn patch_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: &Headers,
    ) -> Result<R> {
        let payload = serde_json::to_vec(body).map_err(|e| Error::Argument {
            message: format!("failed to serialize request body: {}", e),
        })?;
        let mut headers = headers.clone();
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| MediaType::ApplicationJson.header_value().to_string());
        let response = self.patch(url, payload.into(), &headers)?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// POST an urlencoded form and return the raw response body.
    fn post_form(&self, url: &str, form: FormBuilder, headers: &Headers) -> Result<Bytes> {
        let mut headers = headers.clone();
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| MediaType::ApplicationFormUrlEncoded.header_value().to_string());
        self.post(url, Bytes::from(form.build()), &headers)
    }

    /// Wrap this client in a caching decorator over the given store.
    fn with_cache<S: CacheStore + 'static>(self, store: S) -> CachingClient<Self>
    where
        Self: Sized,
    {
        CachingClient::with_store(self, store)
    }

    /// Wrap this client in a caching decorator backed by a JSON folder
    /// cache under the system temp directory.
    fn with_local_cache(self, name: &str) -> Result<CachingClient<Self>>
    where
        Self: Sized,
    {
        let store = JsonFileCacheStore::local(name)?;
        Ok(CachingClient::with_store(self, store))
    }

    /// Wrap this client in a retrying decorator.
    fn with_retry(self, policy: RetryPolicy) -> RetryingClient<Self>
    where
        Self: Sized,
    {
        RetryingClient::new(self, policy)
    }

    /// Per-call fluent request builder dispatching to this client.
    fn request(&self) -> RequestBuilder<'_, Self>
    where
        Self: Sized,
    {
        RequestBuilder::new(self)
    }
}

impl<C: RestClient + ?Sized> RestClientExt for C {}
