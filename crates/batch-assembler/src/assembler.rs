//! Buffer, size trigger and periodic flush timer.

use crate::turnstile::Turnstile;
use crate::{AssemblerError, AssemblerResult, BatchDispatcher};
use event_protocol_types::{Batch, Event};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Batching policy.
///
/// - `batch_size`: buffer length that forms a batch immediately (default: 50)
/// - `flush_interval`: period of the flush timer while running (default: 5s)
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl AssemblerConfig {
    /// Reject thresholds that could never trigger.
    pub fn validate(&self) -> AssemblerResult<()> {
        if self.batch_size == 0 {
            return Err(AssemblerError::InvalidBatchSize(self.batch_size));
        }
        if self.flush_interval.is_zero() {
            return Err(AssemblerError::InvalidFlushInterval);
        }
        Ok(())
    }
}

/// A formed batch together with its place in the dispatch order.
struct PendingBatch {
    ticket: u64,
    batch: Batch,
}

struct Buffer {
    events: Vec<Event>,
    next_ticket: u64,
}

struct Inner {
    config: AssemblerConfig,
    buffer: Mutex<Buffer>,
    turnstile: Turnstile,
    dispatcher: Arc<dyn BatchDispatcher>,
}

struct FlushTimer {
    stop_tx: oneshot::Sender<()>,
    _task: JoinHandle<()>,
}

/// Groups events into batches by size or elapsed time.
///
/// # Lifecycle
///
/// Created stopped. [`start`](Self::start) arms the periodic flush timer and
/// [`stop`](Self::stop) disarms it; both are idempotent. Size-triggered and
/// manual flushes work in either state.
///
/// # Ordering
///
/// The length check, drain and ticket assignment happen under one lock, so
/// each event lands in exactly one batch. Dispatch happens outside the lock,
/// admitted by ticket, so batches reach the dispatcher in formation order
/// without a slow dispatch holding up `add_event` for events that do not
/// fill the buffer.
pub struct BatchAssembler {
    inner: Arc<Inner>,
    timer: Mutex<Option<FlushTimer>>,
}

impl BatchAssembler {
    /// Create a stopped assembler.
    pub fn new(config: AssemblerConfig, dispatcher: Arc<dyn BatchDispatcher>) -> AssemblerResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                buffer: Mutex::new(Buffer {
                    events: Vec::new(),
                    next_ticket: 0,
                }),
                turnstile: Turnstile::new(),
                dispatcher,
            }),
            timer: Mutex::new(None),
        })
    }

    /// Arm the flush timer. The first tick fires one full interval from now.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            debug!("Batch assembler already running");
            return;
        }

        let period = self.inner.config.flush_interval;
        let first_tick = Instant::now() + period;
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Some(pending) = inner.take_pending() {
                            debug!(batch_size = pending.batch.len(), "Flush interval elapsed");
                            inner.dispatch(pending).await;
                        }
                    }
                }
            }

            debug!("Flush timer stopped");
        });

        *timer = Some(FlushTimer { stop_tx, _task: task });
        info!(
            batch_size = self.inner.config.batch_size,
            flush_interval_ms = period.as_millis() as u64,
            "Batch assembler started"
        );
    }

    /// Disarm the flush timer.
    ///
    /// No timed batch forms after this returns. A dispatch already started by
    /// the timer runs to completion. Buffered events stay buffered.
    pub fn stop(&self) {
        if let Some(timer) = self.timer.lock().take() {
            let _ = timer.stop_tx.send(());
            info!(buffered = self.current_batch_size(), "Batch assembler stopped");
        }
    }

    /// Whether the flush timer is armed.
    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Number of buffered events.
    pub fn current_batch_size(&self) -> usize {
        self.inner.buffer.lock().events.len()
    }

    /// Buffer an event, dispatching a batch if the buffer is now full.
    ///
    /// An event whose id is already buffered replaces the buffered copy in
    /// place, so a batch never carries the same event twice.
    ///
    /// Returns once the resulting batch (if any) has been dispatched.
    pub async fn add_event(&self, event: Event) {
        let ready = {
            let mut buffer = self.inner.buffer.lock();
            if let Some(slot) = buffer.events.iter_mut().find(|e| e.id == event.id) {
                debug!(event_id = %event.id, "Replaced buffered event");
                *slot = event;
                return;
            }
            buffer.events.push(event);
            if buffer.events.len() >= self.inner.config.batch_size {
                Some(buffer.form_batch())
            } else {
                None
            }
        };

        if let Some(pending) = ready {
            debug!(batch_size = pending.batch.len(), "Batch size reached");
            self.inner.dispatch(pending).await;
        }
    }

    /// Dispatch everything buffered as one batch. No-op when empty.
    pub async fn flush(&self) {
        if let Some(pending) = self.inner.take_pending() {
            debug!(batch_size = pending.batch.len(), "Manual flush");
            self.inner.dispatch(pending).await;
        }
    }
}

impl Drop for BatchAssembler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            let _ = timer.stop_tx.send(());
        }
    }
}

impl Buffer {
    fn form_batch(&mut self) -> PendingBatch {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        PendingBatch {
            ticket,
            batch: Batch::form(std::mem::take(&mut self.events)),
        }
    }
}

impl Inner {
    fn take_pending(&self) -> Option<PendingBatch> {
        let mut buffer = self.buffer.lock();
        if buffer.events.is_empty() {
            None
        } else {
            Some(buffer.form_batch())
        }
    }

    /// Run the dispatch on its own task and wait for it.
    ///
    /// The spawned task always leaves the turnstile, even if the caller's
    /// future is dropped, so later batches are never stranded.
    async fn dispatch(self: &Arc<Self>, pending: PendingBatch) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.dispatch_in_turn(pending).await });
        if let Err(e) = handle.await {
            error!(error = %e, "Batch dispatch task failed");
        }
    }

    async fn dispatch_in_turn(&self, pending: PendingBatch) {
        let PendingBatch { ticket, batch } = pending;
        let _pass = self.turnstile.enter(ticket).await;

        let batch_id = batch.id().clone();
        let batch_size = batch.len();
        debug!(batch_id = %batch_id, batch_size, ticket, "Dispatching batch");

        if let Err(e) = self.dispatcher.dispatch(batch).await {
            warn!(
                batch_id = %batch_id,
                batch_size,
                error = %e,
                "Batch dispatch failed"
            );
        }
    }
}
