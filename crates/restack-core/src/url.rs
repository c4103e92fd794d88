//! URL assembly
//!
//! [`UrlBuilder`] composes a request URL from a base (either a full URL or
//! scheme/host/port parts), appended path tokens and query parameters.
//! Path tokens and query values are percent-encoded on build, so callers
//! can pass raw identifiers containing spaces or slashes.

use url::Url;

use crate::error::{Error, Result};

enum Base {
    Raw(String),
    Parts {
        scheme: String,
        host: String,
        port: Option<u16>,
    },
}

/// Fluent builder for request URLs.
pub struct UrlBuilder {
    base: Base,
    path_tokens: Vec<String>,
    query: Vec<(String, String)>,
}

impl UrlBuilder {
    /// Builder rooted at a full base URL, e.g. `https://api.example.com/v1`.
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base: Base::Raw(base_url.into()),
            path_tokens: Vec::new(),
            query: Vec::new(),
        }
    }

    /// Builder rooted at scheme, host and optional port.
    pub fn from_parts(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            base: Base::Parts {
                scheme: scheme.into(),
                host: host.into(),
                port,
            },
            path_tokens: Vec::new(),
            query: Vec::new(),
        }
    }

    /// Append one path segment. The token is encoded on build; a literal
    /// `/` inside it is escaped rather than splitting the path.
    pub fn add_path_token(mut self, token: impl Into<String>) -> Self {
        self.path_tokens.push(token.into());
        self
    }

    /// Append a query parameter.
    pub fn add_query_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a query parameter only when a value is present.
    pub fn add_query_parameter_if_some(
        self,
        key: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        match value {
            Some(value) => self.add_query_parameter(key, value),
            None => self,
        }
    }

    /// Assemble and encode the final URL.
    pub fn build(self) -> Result<String> {
        let mut url = match &self.base {
            Base::Raw(raw) => Url::parse(raw).map_err(|e| Error::Argument {
                message: format!("invalid base url '{}': {}", raw, e),
            })?,
            Base::Parts { scheme, host, port } => {
                let raw = match port {
                    Some(port) => format!("{}://{}:{}", scheme, host, port),
                    None => format!("{}://{}", scheme, host),
                };
                Url::parse(&raw).map_err(|e| Error::Argument {
                    message: format!("invalid base url '{}': {}", raw, e),
                })?
            }
        };

        if !self.path_tokens.is_empty() {
            let mut segments = url.path_segments_mut().map_err(|_| Error::Argument {
                message: "base url cannot carry path segments".to_string(),
            })?;
            segments.pop_if_empty();
            for token in &self.path_tokens {
                segments.push(token);
            }
        }

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }
}
