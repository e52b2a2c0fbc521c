//! Deployment client trait and implementations.
//!
//! A deployment is a named model endpoint (a chat model, an image
//! generator, ...). Clients stream [`DeploymentDelta`]s back to the caller;
//! tools fold them into transcripts and results.

use async_trait::async_trait;
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{DeploymentDelta, DeploymentRequest};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately. A rate limit with a
/// `Retry-After` hint waits for the hinted duration instead of the backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    client_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                let wait = e.retry_after().unwrap_or(backoff);
                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        client = client_name,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        backoff_ms = wait.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Internal("retry loop exited without result".into())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A stream of deployment deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<DeploymentDelta>> + Send + 'static>>;

/// Shared handle to a deployment client.
pub type SharedDeploymentClient = Arc<dyn DeploymentClient>;

/// A client able to stream chat completions from named deployments.
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Start a streaming request.
    ///
    /// Errors returned here happen before any delta is produced (connection,
    /// auth, bad request). Errors after the stream starts arrive as stream
    /// items.
    async fn stream(&self, request: DeploymentRequest) -> Result<DeltaStream>;

    /// Get the name of this client.
    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted response for [`MockDeploymentClient`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Stream the given deltas, then finish.
    Deltas(Vec<DeploymentDelta>),
    /// Stream the given deltas, then yield an error.
    FailAfter(Vec<DeploymentDelta>, String),
    /// Fail before streaming starts.
    Reject(String),
}

impl MockResponse {
    /// A response that streams each piece as a text delta.
    pub fn text_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Deltas(chunks.into_iter().map(DeploymentDelta::text).collect())
    }
}

/// A mock client for testing purposes.
///
/// Returns pre-configured responses in order and records every request.
#[derive(Debug)]
pub struct MockDeploymentClient {
    name: String,
    responses: parking_lot::Mutex<VecDeque<MockResponse>>,
    request_log: parking_lot::Mutex<Vec<DeploymentRequest>>,
}

impl MockDeploymentClient {
    /// Create a mock with the given responses, returned in order.
    ///
    /// Once exhausted, further requests fail with a backend error.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: parking_lot::Mutex::new(responses.into()),
            request_log: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that streams a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockResponse::text_chunks([text.into()])])
    }

    /// Get all requests that were made to this client.
    pub fn requests(&self) -> Vec<DeploymentRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }
}

#[async_trait]
impl DeploymentClient for MockDeploymentClient {
    async fn stream(&self, request: DeploymentRequest) -> Result<DeltaStream> {
        self.request_log.lock().push(request);

        let next = self.responses.lock().pop_front();
        let items: Vec<Result<DeploymentDelta>> = match next {
            None => {
                return Err(LlmError::Backend(
                    "MockDeploymentClient: no more responses available".to_string(),
                ));
            }
            Some(MockResponse::Reject(message)) => return Err(LlmError::Backend(message)),
            Some(MockResponse::Deltas(deltas)) => deltas.into_iter().map(Ok).collect(),
            Some(MockResponse::FailAfter(deltas, message)) => deltas
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(LlmError::Backend(message))))
                .collect(),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
