//! Transport seam between the sink and the network.

use crate::TransportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Named delivery target on the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    name: String,
}

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new("events")
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Encoded batch ready for transmission.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
}

/// Opaque acknowledgement returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(pub String);

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network client used by [`DeliverySink`](crate::DeliverySink).
///
/// Implementations make a single attempt per call; retrying is the sink's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable endpoint description for errors and logs.
    fn endpoint(&self) -> String;

    /// Check reachability and return the identity the endpoint reports.
    async fn probe(&self) -> TransportResult<String>;

    /// Submit one payload.
    async fn transmit(&self, payload: &Payload, destination: &Destination) -> TransportResult<Receipt>;

    /// Release network resources.
    async fn close(&self) -> TransportResult<()>;
}
