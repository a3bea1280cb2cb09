//! Event and batch types shared by every stage of the delivery pipeline.
//!
//! This crate provides:
//! - [`Event`]: one recorded occurrence (track / screen / identify)
//! - [`Batch`]: an immutable, ordered group of events formed for one delivery attempt
//! - [`PayloadCodec`]: batch serialization, with JSON and zstd-compressed JSON codecs

mod batch;
mod codec;
mod error;
mod event;

pub use batch::{Batch, BatchId};
pub use codec::{JsonCodec, PayloadCodec, ZstdJsonCodec, DEFAULT_ZSTD_LEVEL};
pub use error::{CodecError, CodecResult};
pub use event::{Event, EventId, EventKind, Properties};
