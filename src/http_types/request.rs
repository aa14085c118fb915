use http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, Method};
use tracing::warn;

/// Transport-agnostic view of an incoming request.
///
/// Whatever accepts connections builds one of these (or converts an
/// [`http::Request`]) and hands it to [`Router::handle`](crate::Router::handle).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header; invalid names or values are logged and skipped.
    #[must_use]
    pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        HeaderValue: TryFrom<V>,
    {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(path = %self.path, "Invalid request header skipped"),
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw path, before normalisation.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// All `Accept` values joined, so repeated headers negotiate as one list.
    #[must_use]
    pub fn accept(&self) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(","))
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl From<http::Request<Vec<u8>>> for Request {
    fn from(request: http::Request<Vec<u8>>) -> Self {
        let (parts, body) = request.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
        let mut converted = Request::new(parts.method, &target);
        converted.headers = parts.headers;
        converted.body = body;
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_split_into_path_and_query() {
        let req = Request::new(Method::GET, "/a/b?x=1&y=2");
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query(), Some("x=1&y=2"));
    }

    #[test]
    fn test_repeated_accept_headers_joined() {
        let req = Request::new(Method::GET, "/")
            .with_header("accept", "text/html")
            .with_header("accept", "application/json;q=0.5");
        assert_eq!(
            req.accept().as_deref(),
            Some("text/html,application/json;q=0.5")
        );
    }

    #[test]
    fn test_from_http_request() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("http://example.com/items?limit=3")
            .header("content-type", "application/json")
            .body(b"{}".to_vec())
            .map(Request::from);
        let req = req.unwrap();
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.path(), "/items");
        assert_eq!(req.query(), Some("limit=3"));
        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(req.body(), b"{}");
    }
}
