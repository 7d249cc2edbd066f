//! HTTP client for the aggregation server
//!
//! One POST per batch, plus the administrative delete/clear calls. Transport
//! failures and non-success statuses are reported as distinct errors; callers
//! decide what to do with them (the uplink sender drops and logs).

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::NormalizedRecord;

const BATCH_TIMEOUT: Duration = Duration::from_secs(10);
const ADMIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SinkError {
    /// No usable response: connect failure, timeout, broken body
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered, but not with a success status
    #[error("server returned {0}")]
    Status(StatusCode),
}

/// Per-kind counts acknowledged by the server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessedCounts {
    #[serde(default)]
    pub messages: u32,
    #[serde(default)]
    pub positions: u32,
    #[serde(default)]
    pub telemetry: u32,
}

#[derive(Debug, Deserialize)]
pub struct BatchAck {
    pub success: bool,
    #[serde(default)]
    pub processed: ProcessedCounts,
}

#[derive(Clone)]
pub struct SinkClient {
    base_url: String,
    client: reqwest::Client,
}

impl SinkClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Delivers the whole batch in one call; 200 is the only success
    pub async fn deliver(&self, batch: &[NormalizedRecord]) -> Result<BatchAck, SinkError> {
        let response = self
            .client
            .post(format!("{}/api/messages/batch", self.base_url))
            .timeout(BATCH_TIMEOUT)
            .json(&serde_json::json!({ "messages": batch }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        // a 200 with an unreadable body still counts as delivered
        let ack = response.json::<BatchAck>().await.unwrap_or(BatchAck {
            success: true,
            processed: ProcessedCounts::default(),
        });
        debug!(
            "sink ack: {} msg / {} pos / {} telem",
            ack.processed.messages, ack.processed.positions, ack.processed.telemetry
        );
        Ok(ack)
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(format!("{}/api/messages/delete", self.base_url))
            .timeout(ADMIN_TIMEOUT)
            .json(&serde_json::json!({ "messageId": message_id }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        Ok(())
    }

    pub async fn clear_messages(&self) -> Result<(), SinkError> {
        let response = self
            .client
            .post(format!("{}/api/messages/clear", self.base_url))
            .timeout(ADMIN_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status));
        }
        Ok(())
    }
}
