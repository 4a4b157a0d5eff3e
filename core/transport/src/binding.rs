//! Request binding used as additional authenticated data.

use http::{HeaderMap, Method, Uri};

/// Header a client sets to signal envelope support.
pub const HEADER_ENCRYPTION_ENABLED: &str = "x-encryption-enabled";

/// Correlation id header.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Session id header.
pub const HEADER_SESSION_ID: &str = "x-session-id";

/// Marker header on encrypted responses.
pub const HEADER_ENCRYPTED: &str = "x-encrypted";

/// The request attributes a ciphertext is bound to.
///
/// A body sealed for one method, path, correlation id or session fails to
/// open under any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBinding {
    pub method: String,
    pub path: String,
    pub correlation_id: String,
    pub session_id: String,
}

impl RequestBinding {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        correlation_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            correlation_id: correlation_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Capture the binding of an incoming request. Missing ids bind as empty
    /// strings.
    pub fn from_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        Self::new(
            method.as_str(),
            uri.path(),
            header_str(headers, HEADER_REQUEST_ID),
            header_str(headers, HEADER_SESSION_ID),
        )
    }

    /// `METHOD|path|correlation-id|session-id`
    pub fn aad(&self) -> Vec<u8> {
        format!(
            "{}|{}|{}|{}",
            self.method, self.path, self.correlation_id, self.session_id
        )
        .into_bytes()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_aad_layout() {
        let binding = RequestBinding::new("POST", "/api/tokens", "req-42", "sess-7");
        assert_eq!(binding.aad(), b"POST|/api/tokens|req-42|sess-7".to_vec());
    }

    #[test]
    fn test_missing_ids_bind_empty() {
        let uri: Uri = "/api/tokens?expand=true".parse().unwrap();
        let binding = RequestBinding::from_request(&Method::PUT, &uri, &HeaderMap::new());
        assert_eq!(binding.aad(), b"PUT|/api/tokens||".to_vec());
    }

    #[test]
    fn test_headers_are_captured() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REQUEST_ID, HeaderValue::from_static("abc"));
        headers.insert(HEADER_SESSION_ID, HeaderValue::from_static("s1"));
        let uri: Uri = "/x".parse().unwrap();

        let binding = RequestBinding::from_request(&Method::GET, &uri, &headers);
        assert_eq!(binding, RequestBinding::new("GET", "/x", "abc", "s1"));
    }
}
