//! Restack Core - Composable blocking REST client
//!
//! This crate provides a small blocking HTTP client whose capabilities are
//! grown by wrapping, not by configuration flags: a base client speaks the
//! wire, and caching or retrying are decorators layered on top in whatever
//! order the caller wants.
//!
//! # Main Components
//!
//! - **Client Contract**: The [`RestClient`] trait implemented by the base
//!   client and every decorator, plus the typed [`RestClientExt`] layer
//! - **Caching**: [`CachingClient`] with pluggable [`CacheStore`] backends,
//!   negative caching of 400/404 outcomes and single-flight fetching
//! - **Retrying**: [`RetryingClient`] with a fixed-delay [`RetryPolicy`]
//!   and selective status classification
//! - **Deferred Responses**: [`ResponseHolder`] postpones status validation
//!   until the result is consumed and supports per-status overrides
//! - **Request Assembly**: [`UrlBuilder`], [`FormBuilder`] and the fluent
//!   [`RequestBuilder`] entry point
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use restack_core::{HttpRestClient, RestClientExt, RetryPolicy, Result};
//!
//! fn example() -> Result<()> {
//!     let client = HttpRestClient::json()?
//!         .with_retry(RetryPolicy::new(5, Duration::from_millis(100)))
//!         .with_local_cache("example")?;
//!
//!     let status: Option<serde_json::Value> = client
//!         .request()
//!         .to_url("https://api.example.com/status")
//!         .get_json()?;
//!     let _ = status;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod media;
pub mod response;
pub mod retry;
pub mod transport;
pub mod url;

// Re-export main types for convenience
pub use builder::{RequestBuilder, RequestWithUrl};
pub use cache::{CacheStore, CachedValue, CachingClient, InMemoryCacheStore, JsonFileCacheStore};
pub use client::{Headers, HttpRestClient, RestClient, RestClientExt};
pub use config::{ClientConfig, Proxy};
pub use error::{Error, Result};
pub use form::FormBuilder;
pub use media::MediaType;
pub use response::{is_success_status, ResponseHolder};
pub use retry::{is_retriable, RetryPolicy, RetryingClient};
pub use transport::{HttpTransport, RawResponse, RawResponseObserver};
pub use url::UrlBuilder;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_rest_client_is_object_safe() {
        fn assert_object_safe(_client: &dyn RestClient) {}
        struct Never;
        impl RestClient for Never {
            fn get(&self, _: &str, _: &Headers) -> Result<Option<bytes::Bytes>> {
                unimplemented!()
            }
            fn get_and(&self, _: &str, _: &Headers) -> Result<ResponseHolder<Option<bytes::Bytes>>> {
                unimplemented!()
            }
            fn post(&self, _: &str, _: bytes::Bytes, _: &Headers) -> Result<bytes::Bytes> {
                unimplemented!()
            }
            fn patch(&self, _: &str, _: bytes::Bytes, _: &Headers) -> Result<bytes::Bytes> {
                unimplemented!()
            }
        }
        assert_object_safe(&Never);
    }
}
