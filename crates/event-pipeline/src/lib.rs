//! # Event Pipeline
//!
//! Accepts application events, persists them, groups them into batches and
//! delivers the batches with bounded retry.
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────────┐
//!   submit ──▶│ DurableQueue │◀──────────── remove on success ─┐
//!      │      └──────────────┘                                 │
//!      │      ┌────────────────┐  batch   ┌──────────────┐     │
//!      └─────▶│ BatchAssembler │────────▶│ DeliverySink │─────┘
//!             └────────────────┘          └──────────────┘
//! ```
//!
//! Each event is written to the queue and to the assembler's buffer. A batch
//! forms when the buffer is full or the flush timer fires. When the sink
//! confirms a batch, its events are removed from the queue; when delivery
//! fails they stay queued and are resubmitted on the next start.
//!
//! Delivery is at-least-once: a crash between confirmation and removal
//! sends the affected events again.
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = EventPipeline::from_config(&config, &paths)?;
//! pipeline.initialize().await?;
//! pipeline.submit(Event::new(EventKind::Track, "signup", session_id)).await?;
//! pipeline.shutdown().await?;
//! ```

mod dispatch;
mod error;
mod pipeline;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{EventPipeline, PipelineOptions};
