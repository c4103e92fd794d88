//! Fluent per-request builder
//!
//! Entry point for one-off requests: pick a target URL (literal or
//! assembled via [`UrlBuilder`]), attach headers, then dispatch. The
//! builder borrows the client, so it composes with any decorator stack.
//!
//! ```no_run
//! use restack_core::{HttpRestClient, RestClientExt};
//!
//! # fn main() -> restack_core::Result<()> {
//! let client = HttpRestClient::json()?;
//! let status: Option<serde_json::Value> = client
//!     .request()
//!     .to_url("https://api.example.com/status")
//!     .with_header("X-Request-Id", "abc-123")
//!     .get_json()?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{Headers, RestClient, RestClientExt};
use crate::error::Result;
use crate::form::FormBuilder;
use crate::media::MediaType;
use crate::response::ResponseHolder;
use crate::url::UrlBuilder;

/// Request builder before a target URL is chosen.
pub struct RequestBuilder<'a, C> {
    client: &'a C,
}

impl<'a, C: RestClient> RequestBuilder<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Target a literal URL.
    pub fn to_url(self, url: impl Into<String>) -> RequestWithUrl<'a, C> {
        RequestWithUrl {
            client: self.client,
            url: url.into(),
            headers: Headers::new(),
        }
    }

    /// Target a URL assembled by a [`UrlBuilder`].
    pub fn to_built_url(self, builder: UrlBuilder) -> Result<RequestWithUrl<'a, C>> {
        Ok(self.to_url(builder.build()?))
    }
}

/// Request builder with a target URL, ready to dispatch.
pub struct RequestWithUrl<'a, C> {
    client: &'a C,
    url: String,
    headers: Headers,
}

impl<'a, C: RestClient> RequestWithUrl<'a, C> {
    /// Attach one header. Re-supplying a key replaces the earlier value.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a set of headers, replacing earlier values key by key.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Shorthand for an explicit Accept header.
    pub fn accepting(self, media_type: MediaType) -> Self {
        self.with_header("Accept", media_type.header_value())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn get_bytes(&self) -> Result<Option<Bytes>> {
        self.client.get_bytes(&self.url, &self.headers)
    }

    pub fn get_text(&self) -> Result<Option<String>> {
        self.client.get_text(&self.url, &self.headers)
    }

    pub fn get_json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.client.get_json(&self.url, &self.headers)
    }

    /// GET with deferred status validation.
    pub fn get_and(&self) -> Result<ResponseHolder<Option<Bytes>>> {
        self.client.get_and(&self.url, &self.headers)
    }

    /// Deferred GET decoding as JSON on consumption.
    pub fn get_json_and<T>(&self) -> Result<ResponseHolder<Option<T>>>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        self.client.get_json_and(&self.url, &self.headers)
    }

    pub fn post_json<B: Serialize, R: DeserializeOwned>(&self, body: &B) -> Result<R> {
        self.client.post_json(&self.url, body, &self.headers)
    }

    pub fn patch_json<B: Serialize, R: DeserializeOwned>(&self, body: &B) -> Result<R> {
        self.client.patch_json(&self.url, body, &self.headers)
    }

    pub fn post_form(&self, form: FormBuilder) -> Result<Bytes> {
        self.client.post_form(&self.url, form, &self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records the url and headers of the last dispatched request.
    struct RecordingClient {
        last: Mutex<Option<(String, Headers)>>,
        body: &'static [u8],
    }

    impl RecordingClient {
        fn new(body: &'static [u8]) -> Self {
            Self {
                last: Mutex::new(None),
                body,
            }
        }

        fn record(&self, url: &str, headers: &Headers) {
            *self.last.lock() = Some((url.to_string(), headers.clone()));
        }

        fn last(&self) -> (String, Headers) {
            self.last.lock().clone().expect("no request dispatched")
        }
    }

    impl RestClient for RecordingClient {
        fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
            self.record(url, headers);
            Ok(Some(Bytes::from_static(self.body)))
        }

        fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
            self.record(url, headers);
            Ok(ResponseHolder::new(Some(Bytes::from_static(self.body)), 200))
        }

        fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
            self.record(url, headers);
            Ok(body)
        }

        fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
            self.record(url, headers);
            Ok(body)
        }
    }

    #[test]
    fn test_dispatch_to_literal_url() {
        let client = RecordingClient::new(b"\"ok\"");
        let decoded: Option<String> = client
            .request()
            .to_url("http://host/status")
            .get_json()
            .unwrap();
        assert_eq!(decoded, Some("ok".to_string()));
        assert_eq!(client.last().0, "http://host/status");
    }

    #[test]
    fn test_dispatch_to_built_url() {
        let client = RecordingClient::new(b"body");
        client
            .request()
            .to_built_url(
                UrlBuilder::from_base_url("http://host")
                    .add_path_token("users")
                    .add_query_parameter("page", "2"),
            )
            .unwrap()
            .get_bytes()
            .unwrap();
        assert_eq!(client.last().0, "http://host/users?page=2");
    }

    #[test]
    fn test_headers_deduplicate_by_key() {
        let client = RecordingClient::new(b"body");
        client
            .request()
            .to_url("http://host")
            .with_header("Authorization", "Bearer old")
            .with_header("Authorization", "Bearer new")
            .get_bytes()
            .unwrap();
        let (_, headers) = client.last();
        assert_eq!(
            headers.get("Authorization").map(String::as_str),
            Some("Bearer new")
        );
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_with_headers_merges() {
        let client = RecordingClient::new(b"body");
        let mut extra = Headers::new();
        extra.insert("X-B".to_string(), "2".to_string());
        client
            .request()
            .to_url("http://host")
            .with_header("X-A", "1")
            .with_headers(extra)
            .get_bytes()
            .unwrap();
        let (_, headers) = client.last();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_accepting_sets_accept_header() {
        let client = RecordingClient::new(b"body");
        client
            .request()
            .to_url("http://host")
            .accepting(MediaType::TextPlain)
            .get_bytes()
            .unwrap();
        let (_, headers) = client.last();
        assert_eq!(headers.get("Accept").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn test_post_form_sets_content_type() {
        let client = RecordingClient::new(b"body");
        client
            .request()
            .to_url("http://host/token")
            .post_form(FormBuilder::new().add("grant_type", "client_credentials"))
            .unwrap();
        let (_, headers) = client.last();
        assert_eq!(
            headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
    }
}
