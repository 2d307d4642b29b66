//! REST client for `/api/quotes`.

use auralink_types::{Quote, SensorReading};

use crate::http::{ApiResult, HttpClient};

const QUOTES: &str = "quotes";

/// Asks the backend for a quote matching a device's conditions.
///
/// # Example
///
/// ```no_run
/// use auralink_core::QuoteClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let quotes = QuoteClient::new("http://localhost:8080")?;
/// if let Some(quote) = quotes.generate_for_device("esp32-lab").await? {
///     println!("{}", quote.text);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QuoteClient {
    http: HttpClient,
}

impl QuoteClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
        })
    }

    pub fn with_http(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Quote for the device's latest reading, `None` if the backend has no
    /// reading for it yet.
    pub async fn generate_for_device(&self, device_id: &str) -> ApiResult<Option<Quote>> {
        match self
            .http
            .post_empty(&[QUOTES, "generate", device_id])
            .await
        {
            Ok(quote) => Ok(Some(quote)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Quote for a reading supplied by the caller.
    pub async fn generate(&self, reading: &SensorReading) -> ApiResult<Quote> {
        self.http.post_json(&[QUOTES, "generate"], reading).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ApiError;

    #[test]
    fn test_quote_urls() {
        let quotes = QuoteClient::new("http://localhost:8080/").unwrap();
        assert_eq!(quotes.base_url(), "http://localhost:8080");
        assert_eq!(
            quotes
                .http
                .endpoint(&[QUOTES, "generate", "lab 2"])
                .unwrap()
                .as_str(),
            "http://localhost:8080/api/quotes/generate/lab%202"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let quotes = QuoteClient::new("http://127.0.0.1:1").unwrap();
        let err = quotes.generate_for_device("esp32-lab").await.unwrap_err();
        assert!(matches!(err, ApiError::NotReachable { .. }));
        assert!(!err.is_not_found());
    }
}
