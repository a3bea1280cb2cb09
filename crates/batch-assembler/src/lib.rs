//! In-memory batching of events under a dual size/time policy.
//!
//! A [`BatchAssembler`] buffers events and forms a [`Batch`] when either the
//! buffer reaches `batch_size` or the periodic flush timer fires, whichever
//! comes first. Formed batches are handed to a [`BatchDispatcher`] strictly
//! in formation order, while new events keep buffering during a slow
//! dispatch.
//!
//! ```ignore
//! let assembler = BatchAssembler::new(AssemblerConfig::default(), dispatcher)?;
//! assembler.start();
//! assembler.add_event(event).await;
//! assembler.flush().await;
//! assembler.stop();
//! ```
//!
//! [`Batch`]: event_protocol_types::Batch

mod assembler;
mod dispatcher;
mod error;
mod turnstile;

pub use assembler::{AssemblerConfig, BatchAssembler};
pub use dispatcher::BatchDispatcher;
pub use error::{AssemblerError, AssemblerResult};
