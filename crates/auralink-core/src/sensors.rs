//! REST client for `/api/sensors`.

use async_trait::async_trait;

use auralink_types::SensorReading;

use crate::http::{ApiResult, HttpClient};
use crate::traits::SensorSource;

/// Typed client for the sensor endpoints.
///
/// # Example
///
/// ```no_run
/// use auralink_core::{SensorApi, SensorSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = SensorApi::new("http://localhost:8080")?;
/// for reading in api.all_sensors().await? {
///     println!("{}: {} ppm", reading.device_id, reading.co2);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SensorApi {
    http: HttpClient,
}

impl SensorApi {
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
}

#[async_trait]
impl SensorSource for SensorApi {
    async fn all_sensors(&self) -> ApiResult<Vec<SensorReading>> {
        self.http.get(&["sensors"]).await
    }

    async fn sensor(&self, device_id: &str) -> ApiResult<Option<SensorReading>> {
        self.http.get_optional(&["sensors", device_id]).await
    }

    async fn history(&self, device_id: &str) -> ApiResult<Vec<SensorReading>> {
        self.http.get(&["sensors", device_id, "history"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_api_urls() {
        let api = SensorApi::new("http://localhost:8080/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:8080");
        assert_eq!(
            api.http
                .endpoint(&["sensors", "esp32#2", "history"])
                .unwrap()
                .as_str(),
            "http://localhost:8080/api/sensors/esp32%232/history"
        );
    }

    #[test]
    fn test_sensor_api_rejects_bad_url() {
        assert!(SensorApi::new("ftp://localhost").is_err());
    }
}
