//! Trait abstractions over the REST backend.
//!
//! The state components ([`Dashboard`](crate::dashboard::Dashboard) and
//! [`Inbox`](crate::inbox::Inbox)) are generic over these traits so they can
//! run against the real HTTP clients or against the fakes in
//! [`mock`](crate::mock).

use async_trait::async_trait;

use auralink_types::{
    ApiMessage, EmailMessage, EmailRequest, EmailStats, HealthStatus, Priority, SensorReading,
};

use crate::http::ApiResult;

/// Source of REST-fetched sensor data.
///
/// # Example
///
/// ```ignore
/// use auralink_core::{SensorSource, ApiResult};
///
/// async fn device_count<S: SensorSource>(source: &S) -> ApiResult<usize> {
///     Ok(source.all_sensors().await?.len())
/// }
/// ```
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Latest reading of every known device.
    async fn all_sensors(&self) -> ApiResult<Vec<SensorReading>>;

    /// Latest reading of one device, `None` if the device is unknown.
    async fn sensor(&self, device_id: &str) -> ApiResult<Option<SensorReading>>;

    /// Recent readings of one device, newest first.
    async fn history(&self, device_id: &str) -> ApiResult<Vec<SensorReading>>;
}

/// The email sub-API.
#[async_trait]
pub trait EmailBackend: Send + Sync {
    // --- Sending ---

    async fn send(&self, request: &EmailRequest) -> ApiResult<EmailMessage>;

    async fn send_simple(&self, to: &str, subject: &str, body: &str) -> ApiResult<EmailMessage>;

    async fn send_alert(&self, to: &str, alert_type: &str, message: &str)
    -> ApiResult<EmailMessage>;

    // --- Listing ---

    async fn sent(&self) -> ApiResult<Vec<EmailMessage>>;

    async fn sent_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>>;

    async fn received(&self) -> ApiResult<Vec<EmailMessage>>;

    async fn received_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>>;

    /// Received messages the classifier assigned `priority`.
    async fn by_priority(&self, priority: Priority) -> ApiResult<Vec<EmailMessage>>;

    async fn search(&self, query: &str) -> ApiResult<Vec<EmailMessage>>;

    async fn stats(&self) -> ApiResult<EmailStats>;

    /// Ask the server to poll the mailbox now. Returns the newly fetched messages.
    async fn fetch(&self) -> ApiResult<Vec<EmailMessage>>;

    // --- Mutations ---

    async fn mark_read(&self, id: &str) -> ApiResult<ApiMessage>;

    async fn mark_all_read(&self) -> ApiResult<ApiMessage>;

    async fn delete_sent(&self, id: &str) -> ApiResult<ApiMessage>;

    async fn delete_received(&self, id: &str) -> ApiResult<ApiMessage>;

    async fn clear_sent(&self) -> ApiResult<ApiMessage>;

    async fn clear_received(&self) -> ApiResult<ApiMessage>;

    // --- AI ---

    async fn reprocess(&self, id: &str) -> ApiResult<Option<EmailMessage>>;

    async fn reprocess_all(&self) -> ApiResult<Vec<EmailMessage>>;

    async fn health(&self) -> ApiResult<HealthStatus>;
}
