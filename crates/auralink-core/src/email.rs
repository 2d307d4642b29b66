//! REST client for `/api/email`.

use async_trait::async_trait;

use auralink_types::{
    ApiMessage, EmailMessage, EmailRequest, EmailStats, HealthStatus, Priority,
};

use crate::http::{ApiResult, HttpClient};
use crate::traits::EmailBackend;

const EMAIL: &str = "email";

/// Typed client for the email endpoints.
#[derive(Debug, Clone)]
pub struct EmailClient {
    http: HttpClient,
}

impl EmailClient {
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
impl EmailBackend for EmailClient {
    async fn send(&self, request: &EmailRequest) -> ApiResult<EmailMessage> {
        self.http.post_json(&[EMAIL, "send"], request).await
    }

    async fn send_simple(&self, to: &str, subject: &str, body: &str) -> ApiResult<EmailMessage> {
        self.http
            .post_query(
                &[EMAIL, "send-simple"],
                &[("to", to), ("subject", subject), ("body", body)],
            )
            .await
    }

    async fn send_alert(
        &self,
        to: &str,
        alert_type: &str,
        message: &str,
    ) -> ApiResult<EmailMessage> {
        self.http
            .post_query(
                &[EMAIL, "send-alert"],
                &[("to", to), ("alertType", alert_type), ("message", message)],
            )
            .await
    }

    async fn sent(&self) -> ApiResult<Vec<EmailMessage>> {
        self.http.get(&[EMAIL, "sent"]).await
    }

    async fn sent_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        self.http.get_optional(&[EMAIL, "sent", id]).await
    }

    async fn received(&self) -> ApiResult<Vec<EmailMessage>> {
        self.http.get(&[EMAIL, "received"]).await
    }

    async fn received_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        self.http.get_optional(&[EMAIL, "received", id]).await
    }

    async fn by_priority(&self, priority: Priority) -> ApiResult<Vec<EmailMessage>> {
        self.http
            .get(&[EMAIL, "priority", priority.as_str()])
            .await
    }

    async fn search(&self, query: &str) -> ApiResult<Vec<EmailMessage>> {
        self.http
            .get_query(&[EMAIL, "search"], &[("query", query)])
            .await
    }

    async fn stats(&self) -> ApiResult<EmailStats> {
        self.http.get(&[EMAIL, "stats"]).await
    }

    async fn fetch(&self) -> ApiResult<Vec<EmailMessage>> {
        self.http.post_empty(&[EMAIL, "fetch"]).await
    }

    async fn mark_read(&self, id: &str) -> ApiResult<ApiMessage> {
        self.http.put_empty(&[EMAIL, "received", id, "read"]).await
    }

    async fn mark_all_read(&self) -> ApiResult<ApiMessage> {
        self.http.put_empty(&[EMAIL, "received", "read-all"]).await
    }

    async fn delete_sent(&self, id: &str) -> ApiResult<ApiMessage> {
        self.http.delete(&[EMAIL, "sent", id]).await
    }

    async fn delete_received(&self, id: &str) -> ApiResult<ApiMessage> {
        self.http.delete(&[EMAIL, "received", id]).await
    }

    async fn clear_sent(&self) -> ApiResult<ApiMessage> {
        self.http.delete(&[EMAIL, "sent"]).await
    }

    async fn clear_received(&self) -> ApiResult<ApiMessage> {
        self.http.delete(&[EMAIL, "received"]).await
    }

    async fn reprocess(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        match self.http.post_empty(&[EMAIL, "ai", "reprocess", id]).await {
            Ok(message) => Ok(Some(message)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn reprocess_all(&self) -> ApiResult<Vec<EmailMessage>> {
        self.http.post_empty(&[EMAIL, "ai", "reprocess-all"]).await
    }

    async fn health(&self) -> ApiResult<HealthStatus> {
        self.http.get(&[EMAIL, "health"]).await
    }
}
