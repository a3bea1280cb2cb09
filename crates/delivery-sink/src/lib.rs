//! Delivery of formed batches to a remote endpoint.
//!
//! - [`DeliverySink`]: encodes a batch, transmits it and retries with capped
//!   exponential backoff until success or the retry budget runs out
//! - [`Transport`]: the network seam (identity probe + payload transmit)
//! - [`HttpTransport`]: reqwest implementation of [`Transport`]

mod error;
mod http;
mod retry;
mod sink;
mod transport;

pub use error::{SinkError, SinkResult, TransportError, TransportResult};
pub use http::{HttpTransport, DEFAULT_TIMEOUT};
pub use retry::RetryPolicy;
pub use sink::{DeliverySink, SinkConfig};
pub use transport::{Destination, Payload, Receipt, Transport};
