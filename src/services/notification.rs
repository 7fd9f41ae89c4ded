// src/services/notification.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// FCM accepts at most this many registration ids per multicast request.
pub const FCM_MULTICAST_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("push gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// Delivery counts of one multicast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MulticastReport {
    pub success: usize,
    pub failure: usize,
}

/// External push gateway.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError>;

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError>;
}

/// Firebase Cloud Messaging over the HTTP (server key) endpoint.
#[derive(Clone)]
pub struct FcmGateway {
    client: Client,
    endpoint: String,
    server_key: String,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failure: usize,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    error: Option<String>,
}

impl FcmGateway {
    pub fn new(endpoint: String, server_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            server_key,
        }
    }

    async fn post(&self, payload: serde_json::Value) -> Result<FcmResponse, PushError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json::<FcmResponse>().await?)
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        let resp = self
            .post(json!({
                "to": token,
                "notification": { "title": message.title, "body": message.body },
                "data": message.data,
            }))
            .await?;

        if resp.failure > 0 {
            let reason = resp
                .results
                .into_iter()
                .find_map(|r| r.error)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(PushError::Delivery(reason));
        }
        Ok(())
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        let mut report = MulticastReport::default();

        for chunk in tokens.chunks(FCM_MULTICAST_LIMIT) {
            let resp = self
                .post(json!({
                    "registration_ids": chunk,
                    "notification": { "title": message.title, "body": message.body },
                    "data": message.data,
                }))
                .await?;
            report.success += resp.success;
            report.failure += resp.failure;
        }

        Ok(report)
    }
}

/// Gateway used when no push credentials are configured. Drops every message.
#[derive(Debug, Clone, Default)]
pub struct NoopGateway;

#[async_trait]
impl PushGateway for NoopGateway {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), PushError> {
        tracing::debug!(token, title = %message.title, "push disabled, dropping notification");
        Ok(())
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        tracing::debug!(
            recipients = tokens.len(),
            title = %message.title,
            "push disabled, dropping notification"
        );
        Ok(MulticastReport::default())
    }
}

/// Best-effort wrapper around a [`PushGateway`].
///
/// Never returns an error: delivery problems are logged and the calling
/// workflow carries on.
#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn PushGateway>,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self { gateway }
    }

    pub async fn notify(&self, token: &str, message: &PushMessage) {
        if let Err(e) = self.gateway.send(token, message).await {
            tracing::warn!("Failed to deliver push notification: {}", e);
        }
    }

    pub async fn notify_many(&self, tokens: &[String], message: &PushMessage) {
        match tokens {
            [] => {}
            [token] => self.notify(token, message).await,
            _ => match self.gateway.send_multicast(tokens, message).await {
                Ok(report) if report.failure > 0 => {
                    tracing::warn!(
                        "Push multicast partially failed: {} delivered, {} failed",
                        report.success,
                        report.failure
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to deliver push multicast: {}", e),
            },
        }
    }
}
