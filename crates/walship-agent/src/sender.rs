//! Sender Contract and HTTP Implementation
//!
//! The driver hands every closed batch to a `Sender` and interprets the
//! outcome three ways:
//!
//! - `Ok(())`: advance the cursor, notify hooks, continue
//! - `Err(Retryable)`: back off and retry the SAME batch; the cursor is
//!   untouched, so a send that reached the wire anyway is deduplicated
//!   downstream by cursor
//! - `Err(Fatal)`: the agent enters Crashed
//!
//! The sender owns serialization, authentication and HTTP semantics; the
//! core never looks inside. `HttpSender` is the stock implementation;
//! embedders swap in their own transport by implementing the trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::batch::Batch;
use crate::error::BoxError;

/// Classified send failure.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Transient: the same batch will be retried after a backoff.
    #[error("retryable send failure: {0}")]
    Retryable(#[source] BoxError),

    /// Permanent: the agent crashes; operator intervention required.
    #[error("fatal send failure: {0}")]
    Fatal(#[source] BoxError),
}

impl SendError {
    pub fn retryable(err: impl Into<BoxError>) -> Self {
        SendError::Retryable(err.into())
    }

    pub fn fatal(err: impl Into<BoxError>) -> Self {
        SendError::Fatal(err.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Retryable(_))
    }
}

/// Context forwarded with every send.
#[derive(Debug, Clone)]
pub struct SendMetadata {
    /// Chain identifier of the node producing the WAL.
    pub chain_id: String,

    /// Node identifier.
    pub node_id: String,

    /// API authentication key; empty disables the Authorization header.
    pub auth_key: String,

    /// Ingestion endpoint base URL, no trailing slash.
    pub service_url: String,
}

/// Transmits batches to the ingestion service.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, batch: &Batch, metadata: &SendMetadata) -> Result<(), SendError>;
}

/// Per-frame entry in the multipart manifest.
#[derive(Serialize)]
struct ManifestEntry<'a> {
    segment: &'a str,
    seq: u64,
    length: usize,
    uncompressed_length: u32,
    commit_time: i64,
}

/// Stock HTTP sender.
///
/// Posts each batch to `{service_url}/frames` as a multipart form with two
/// parts: a JSON `manifest` describing every frame, and a `frames` part of
/// concatenated compressed payloads in manifest order. The compressed bytes
/// pass through exactly as read from disk.
///
/// ## Status Classification
///
/// - 2xx → success
/// - 408, 429, 5xx, transport errors → retryable
/// - any other 4xx → fatal (bad auth or bad request will not heal)
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    /// Build a sender whose per-request wall time is capped by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SendError::fatal)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&self, batch: &Batch, metadata: &SendMetadata) -> Result<(), SendError> {
        let manifest: Vec<ManifestEntry<'_>> = batch
            .frames
            .iter()
            .map(|f| ManifestEntry {
                segment: &f.segment_id,
                seq: f.frame_seq,
                length: f.payload.len(),
                uncompressed_length: f.uncompressed_length,
                commit_time: f.commit_time,
            })
            .collect();
        let manifest = serde_json::to_string(&manifest).map_err(SendError::fatal)?;

        let mut payload = Vec::with_capacity(batch.total_bytes);
        for frame in &batch.frames {
            payload.extend_from_slice(&frame.payload);
        }

        let form = Form::new()
            .part(
                "manifest",
                Part::text(manifest)
                    .mime_str("application/json")
                    .map_err(SendError::fatal)?,
            )
            .part("frames", Part::bytes(payload).file_name("frames.bin"));

        let url = format!("{}/frames", metadata.service_url);
        let mut request = self
            .client
            .post(&url)
            .header("X-Walship-Chain-Id", &metadata.chain_id)
            .header("X-Walship-Node-Id", &metadata.node_id);
        if !metadata.auth_key.is_empty() {
            request = request.bearer_auth(&metadata.auth_key);
        }

        let response = request
            .multipart(form)
            .send()
            .await
            .map_err(SendError::retryable)?;

        let status = response.status();
        if status.is_success() {
            debug!(
                frames = batch.frame_count(),
                bytes = batch.total_bytes,
                %status,
                "batch accepted"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let err = format!("unexpected status {status}: {body}");
        if status_is_retryable(status) {
            Err(SendError::Retryable(err.into()))
        } else {
            Err(SendError::Fatal(err.into()))
        }
    }
}

fn status_is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_classification() {
        assert!(SendError::retryable("agent overloaded").is_retryable());
        assert!(!SendError::fatal("bad auth key").is_retryable());
    }

    #[test]
    fn test_send_error_display() {
        let err = SendError::retryable("connection reset");
        assert!(format!("{}", err).contains("connection reset"));
        let err = SendError::fatal("401 unauthorized");
        assert!(format!("{}", err).contains("401 unauthorized"));
    }

    #[test]
    fn test_status_classification() {
        // Retryable: the service may heal.
        assert!(status_is_retryable(StatusCode::REQUEST_TIMEOUT));
        assert!(status_is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(status_is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(status_is_retryable(StatusCode::BAD_GATEWAY));
        assert!(status_is_retryable(StatusCode::SERVICE_UNAVAILABLE));

        // Fatal: retrying the same request cannot succeed.
        assert!(!status_is_retryable(StatusCode::BAD_REQUEST));
        assert!(!status_is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!status_is_retryable(StatusCode::FORBIDDEN));
        assert!(!status_is_retryable(StatusCode::NOT_FOUND));
        assert!(!status_is_retryable(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[test]
    fn test_http_sender_builds() {
        assert!(HttpSender::new(Duration::from_secs(15)).is_ok());
    }
}
