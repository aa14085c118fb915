use std::borrow::Cow;

use http::{HeaderMap, StatusCode};

/// A response whose body has been fully written.
///
/// Handed to the caller of [`Router::handle`](crate::Router::handle) once the
/// chain ends the response; post-body callbacks run after it is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl CompletedResponse {
    /// Body as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Convert into an [`http::Response`] for a transport to write.
    #[must_use]
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Canonical reason phrase for a status, falling back by status class.
#[must_use]
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or(match status.as_u16() {
        100..=199 => "Informational",
        200..=299 => "OK",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        _ => "Server Error",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(StatusCode::OK), "OK");
        assert_eq!(reason_phrase(StatusCode::NOT_FOUND), "Not Found");
        assert_eq!(reason_phrase(StatusCode::BAD_REQUEST), "Bad Request");
        assert_eq!(
            reason_phrase(StatusCode::INTERNAL_SERVER_ERROR),
            "Internal Server Error"
        );
    }

    #[test]
    fn test_unknown_status_uses_class_phrase() {
        let status = StatusCode::from_u16(599).map(reason_phrase);
        assert_eq!(status.ok(), Some("Server Error"));
    }

    #[test]
    fn test_into_http_keeps_parts() {
        let mut headers = HeaderMap::new();
        headers.insert("x-test", http::HeaderValue::from_static("1"));
        let converted = CompletedResponse {
            status: StatusCode::CREATED,
            headers,
            body: b"done".to_vec(),
        }
        .into_http();
        assert_eq!(converted.status(), StatusCode::CREATED);
        assert_eq!(converted.headers()["x-test"], "1");
        assert_eq!(converted.body(), b"done");
    }
}
