//! Retrying batch delivery.

use crate::{Destination, Payload, Receipt, RetryPolicy, SinkError, SinkResult, Transport};
use event_protocol_types::{Batch, PayloadCodec};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delivery sink configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Attempts after the first before giving up (0 = single attempt).
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub retry_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_retry_delay: Duration,
    /// Where batches are delivered.
    pub destination: Destination,
    /// Identity the endpoint must report; `None` only checks reachability.
    pub expected_identity: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_retries: retry.max_retries,
            retry_delay: retry.retry_delay,
            max_retry_delay: retry.max_retry_delay,
            destination: Destination::default(),
            expected_identity: None,
        }
    }
}

impl SinkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            max_retry_delay: self.max_retry_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Created,
    Ready,
    Disposed,
}

/// Sends batches through a [`Transport`] with bounded retry.
///
/// # Lifecycle
///
/// 1. [`initialize`](Self::initialize) probes the endpoint; failure here is fatal
/// 2. [`send_batch`](Self::send_batch) any number of times
/// 3. [`dispose`](Self::dispose) closes the transport (idempotent)
pub struct DeliverySink {
    config: SinkConfig,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn PayloadCodec>,
    state: Mutex<SinkState>,
}

impl DeliverySink {
    pub fn new(config: SinkConfig, transport: Arc<dyn Transport>, codec: Arc<dyn PayloadCodec>) -> Self {
        Self {
            config,
            transport,
            codec,
            state: Mutex::new(SinkState::Created),
        }
    }

    /// Whether `initialize` succeeded and `dispose` has not been called.
    pub fn is_ready(&self) -> bool {
        *self.state.lock() == SinkState::Ready
    }

    /// Verify the endpoint is reachable and reports the expected identity.
    pub async fn initialize(&self) -> SinkResult<()> {
        match *self.state.lock() {
            SinkState::Ready => return Err(SinkError::AlreadyInitialized),
            SinkState::Disposed => return Err(SinkError::Disposed),
            SinkState::Created => {}
        }

        let endpoint = self.transport.endpoint();
        let observed = self
            .transport
            .probe()
            .await
            .map_err(|e| SinkError::Unreachable {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        if let Some(expected) = &self.config.expected_identity {
            if *expected != observed {
                error!(
                    endpoint = %endpoint,
                    expected = %expected,
                    observed = %observed,
                    "Endpoint identity mismatch"
                );
                return Err(SinkError::IdentityMismatch {
                    expected: expected.clone(),
                    observed,
                });
            }
        }

        *self.state.lock() = SinkState::Ready;
        info!(endpoint = %endpoint, identity = %observed, "Delivery sink initialized");
        Ok(())
    }

    /// Encode and transmit a batch, retrying failed attempts with backoff.
    ///
    /// Returns the endpoint's receipt, or `RetriesExhausted` carrying the
    /// last attempt's error once the retry budget is spent.
    pub async fn send_batch(&self, batch: &Batch) -> SinkResult<Receipt> {
        self.ensure_ready()?;

        let payload = Payload {
            bytes: self.codec.encode(batch)?,
            content_type: self.codec.content_type(),
            content_encoding: self.codec.content_encoding(),
        };
        let policy = self.config.retry_policy();
        let batch_id = batch.id();
        let mut last_error = String::new();

        for attempt in 0..policy.max_attempts() {
            debug!(
                batch_id = %batch_id,
                attempt,
                events = batch.len(),
                bytes = payload.bytes.len(),
                "Sending batch"
            );

            match self.transport.transmit(&payload, &self.config.destination).await {
                Ok(receipt) => {
                    info!(
                        batch_id = %batch_id,
                        events = batch.len(),
                        attempts = attempt + 1,
                        receipt = %receipt,
                        "Batch delivered"
                    );
                    return Ok(receipt);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < policy.max_attempts() {
                        let delay = policy.delay_after(attempt);
                        warn!(
                            batch_id = %batch_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Send failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(
            batch_id = %batch_id,
            attempts = policy.max_attempts(),
            error = %last_error,
            "Max retries exceeded"
        );
        Err(SinkError::RetriesExhausted {
            batch_id: batch_id.to_string(),
            attempts: policy.max_attempts(),
            last_error,
        })
    }

    /// Close the transport. Later calls do nothing.
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == SinkState::Disposed {
                return;
            }
            *state = SinkState::Disposed;
        }

        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to close transport");
        }
        info!("Delivery sink disposed");
    }

    fn ensure_ready(&self) -> SinkResult<()> {
        match *self.state.lock() {
            SinkState::Ready => Ok(()),
            SinkState::Created => Err(SinkError::NotInitialized),
            SinkState::Disposed => Err(SinkError::Disposed),
        }
    }
}
