//! Urlencoded form bodies
//!
//! [`FormBuilder`] accumulates key/value pairs and renders an
//! `application/x-www-form-urlencoded` body for
//! [`RestClientExt::post_form`](crate::client::RestClientExt::post_form).

use url::form_urlencoded::Serializer;

/// Builder for urlencoded form bodies.
#[derive(Default)]
pub struct FormBuilder {
    pairs: Vec<(String, String)>,
}

impl FormBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field. Keys may repeat; order is preserved.
    pub fn add(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Append a field only when a value is present.
    pub fn add_if_some(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.add(key, value),
            None => self,
        }
    }

    /// Render the urlencoded body.
    pub fn build(self) -> String {
        let mut serializer = Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_encoded() {
        let body = FormBuilder::new()
            .add("grant_type", "client_credentials")
            .add("scope", "read write")
            .build();
        assert_eq!(body, "grant_type=client_credentials&scope=read+write");
    }

    #[test]
    fn test_reserved_characters() {
        let body = FormBuilder::new().add("q", "a&b=c").build();
        assert_eq!(body, "q=a%26b%3Dc");
    }

    #[test]
    fn test_optional_fields() {
        let body = FormBuilder::new()
            .add_if_some("a", Some("1"))
            .add_if_some("b", None::<String>)
            .build();
        assert_eq!(body, "a=1");
    }

    #[test]
    fn test_empty_form() {
        assert_eq!(FormBuilder::new().build(), "");
    }
}
