//! Blob storage failure details.
//!
//! S3-compatible providers answer a rejected `PUT` with an XML body such as
//! `<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>`.
//! The code and message are surfaced in logs; when the body cannot be parsed
//! both fall back to `unknown`.

use std::fmt;

use serde::Deserialize;

const UNKNOWN: &str = "unknown";
const CLOSING_TAG: &str = "</Error>";

/// Error code and message reported by the storage provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

impl ProviderError {
    /// Placeholder used when the provider body is missing or unreadable.
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN.to_string(),
            message: UNKNOWN.to_string(),
        }
    }

    /// Parse a provider XML error body, never failing.
    pub fn parse(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::unknown();
        }

        match quick_xml::de::from_str::<ErrorBody>(trimmed) {
            Ok(parsed) if !parsed.code.is_empty() => Self {
                code: parsed.code,
                message: if parsed.message.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    parsed.message
                },
            },
            _ => Self::unknown(),
        }
    }
}

/// A rejected upload.
#[derive(Debug, Clone)]
pub struct UploadError {
    /// Destination key of the artifact.
    pub key: String,
    /// HTTP status code, when one could be determined.
    pub status: Option<u16>,
    /// Structured provider error.
    pub provider: ProviderError,
}

impl UploadError {
    /// Build an upload error from a raw HTTP status and response body.
    pub fn from_response(key: impl Into<String>, status: u16, body: &str) -> Self {
        Self {
            key: key.into(),
            status: Some(status),
            provider: ProviderError::parse(body),
        }
    }

    /// Build an upload error from an `object_store` failure.
    ///
    /// The store folds the HTTP status and the response body into its error
    /// text, so both are recovered from the rendered error chain.
    pub fn from_store_error(key: impl Into<String>, err: &object_store::Error) -> Self {
        let text = error_chain_text(err);
        let body = text
            .find("<?xml")
            .or_else(|| text.find("<Error"))
            .map_or("", |start| {
                // the chain may repeat the body; keep the first document
                let rest = &text[start..];
                rest.find(CLOSING_TAG)
                    .map_or(rest, |end| &rest[..end + CLOSING_TAG.len()])
            });

        match extract_status(&text) {
            Some(status) => Self::from_response(key, status, body),
            None => Self {
                key: key.into(),
                status: None,
                provider: ProviderError::parse(body),
            },
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status
            .map_or_else(|| UNKNOWN.to_string(), |s| s.to_string());
        write!(
            f,
            "upload of '{}' failed: status={} code={} message=\"{}\"",
            self.key, status, self.provider.code, self.provider.message
        )
    }
}

impl std::error::Error for UploadError {}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

fn extract_status(text: &str) -> Option<u16> {
    const MARKER: &str = "status code: ";
    let start = text.find(MARKER)? + MARKER.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_error_body() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>4442587FB7D0A2F9</RequestId></Error>"#;
        let parsed = ProviderError::parse(body);
        assert_eq!(parsed.code, "AccessDenied");
        assert_eq!(parsed.message, "Access Denied");
    }

    #[test]
    fn test_unparseable_body_is_unknown() {
        assert_eq!(ProviderError::parse("<html>bad gateway"), ProviderError::unknown());
        assert_eq!(ProviderError::parse(""), ProviderError::unknown());
        assert_eq!(ProviderError::parse("not xml at all"), ProviderError::unknown());
    }

    #[test]
    fn test_from_response() {
        let err = UploadError::from_response(
            "exports/abc.csv",
            403,
            "<Error><Code>SignatureDoesNotMatch</Code><Message>nope</Message></Error>",
        );
        assert_eq!(err.status, Some(403));
        assert_eq!(err.provider.code, "SignatureDoesNotMatch");
        let text = err.to_string();
        assert!(text.contains("status=403"));
        assert!(text.contains("code=SignatureDoesNotMatch"));
    }

    #[test]
    fn test_extract_status() {
        assert_eq!(
            extract_status("Server returned non-2xx status code: 403 Forbidden: <Error/>"),
            Some(403)
        );
        assert_eq!(extract_status("connection refused"), None);
    }

    #[test]
    fn test_from_store_error_with_status_and_body() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            "Server returned non-2xx status code: 403 Forbidden: \
             <Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"
                .into();
        let err = object_store::Error::Generic { store: "S3", source };
        let upload = UploadError::from_store_error("exports/abc.zip", &err);
        assert_eq!(upload.status, Some(403));
        assert_eq!(upload.provider.code, "AccessDenied");
        assert_eq!(upload.provider.message, "Access Denied");
    }

    #[test]
    fn test_from_store_error_without_body() {
        let err = object_store::Error::NotImplemented;
        let upload = UploadError::from_store_error("k", &err);
        assert_eq!(upload.status, None);
        assert_eq!(upload.provider, ProviderError::unknown());
    }
}
