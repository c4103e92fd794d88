//! Media types for Accept and Content-Type negotiation

use std::fmt;

/// Well-known media types used as Accept/Content-Type defaults by the
/// client variants. Caller-supplied headers override these defaults when
/// the same header key is re-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    ApplicationJson,
    ApplicationJsonUtf8,
    ApplicationXml,
    ApplicationXmlUtf8,
    ApplicationFormUrlEncoded,
    ApplicationOctetStream,
    TextPlain,
    TextHtml,
    All,
}

impl MediaType {
    /// The header value for this media type.
    pub fn header_value(&self) -> &'static str {
        match self {
            MediaType::ApplicationJson => "application/json",
            MediaType::ApplicationJsonUtf8 => "application/json;charset=utf-8",
            MediaType::ApplicationXml => "application/xml",
            MediaType::ApplicationXmlUtf8 => "application/xml;charset=utf-8",
            MediaType::ApplicationFormUrlEncoded => "application/x-www-form-urlencoded",
            MediaType::ApplicationOctetStream => "application/octet-stream",
            MediaType::TextPlain => "text/plain",
            MediaType::TextHtml => "text/html",
            MediaType::All => "*/*",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header_value())
    }
}
