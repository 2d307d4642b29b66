//! Shared HTTP plumbing for the AuraLink REST API.
//!
//! [`HttpClient`] validates the base URL, builds percent-encoded endpoint
//! URLs below `/api` and maps non-2xx responses to [`ApiError::Api`].
//! [`SensorApi`](crate::sensors::SensorApi) and
//! [`EmailClient`](crate::email::EmailClient) are thin typed layers over it.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Base URL of a locally running backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for REST operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend is not reachable.
    #[error("Backend not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed, or the response body could not be decoded.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    /// HTTP status of an error response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Result type for REST operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// HTTP client bound to one backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Request)?;
        Self::with_client(base_url, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> ApiResult<Self> {
        let trimmed = base_url.trim_end_matches('/');
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ApiError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }
        let base_url =
            Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }

    /// The base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// URL of `/api/{segments...}`. Each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::GET, segments)?).await
    }

    pub async fn get_query<T, Q>(&self, segments: &[&str], query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, segments)?.query(query))
            .await
    }

    /// GET that maps 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<Option<T>> {
        match self.get(segments).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::POST, segments)?).await
    }

    pub async fn post_query<T, Q>(&self, segments: &[&str], query: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, segments)?.query(query))
            .await
    }

    pub async fn post_json<T, B>(&self, segments: &[&str], body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, segments)?.json(body))
            .await
    }

    pub async fn put_empty<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::PUT, segments)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        self.send(self.request(Method::DELETE, segments)?).await
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await.map_err(|e| ApiError::NotReachable {
            url: e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| self.base_url().to_string()),
            source: e,
        })?;
        handle_response(response).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
        response.json().await.map_err(ApiError::Request)
    } else {
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| status.to_string());

        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &serde_json::Value) -> Option<String> {
    ["error", "message", "errorMessage"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_normalizes_url() {
        let client = HttpClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_invalid_url() {
        let result = HttpClient::new("localhost:8080");
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_endpoint_building() {
        let client = HttpClient::new("http://localhost:8080").unwrap();
        assert_eq!(
            client.endpoint(&["sensors"]).unwrap().as_str(),
            "http://localhost:8080/api/sensors"
        );
        assert_eq!(
            client
                .endpoint(&["email", "received", "abc", "read"])
                .unwrap()
                .as_str(),
            "http://localhost:8080/api/email/received/abc/read"
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = HttpClient::new("http://localhost:8080").unwrap();
        let url = client.endpoint(&["sensors", "lab/1 a", "history"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/sensors/lab%2F1%20a/history"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = HttpClient::new("https://example.com/auralink/").unwrap();
        assert_eq!(
            client.endpoint(&["sensors"]).unwrap().as_str(),
            "https://example.com/auralink/api/sensors"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        let body = serde_json::json!({"message": "Email not found"});
        assert_eq!(error_message(&body).as_deref(), Some("Email not found"));

        let body = serde_json::json!({"status": "FAILED", "errorMessage": "SMTP down"});
        assert_eq!(error_message(&body).as_deref(), Some("SMTP down"));

        assert_eq!(error_message(&serde_json::json!({"error": ""})), None);
    }

    #[test]
    fn test_api_error_status() {
        let err = ApiError::Api {
            status: 404,
            message: "Sent email not found".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "API error (404): Sent email not found");
        assert!(!ApiError::InvalidUrl("x".into()).is_not_found());
    }
}
