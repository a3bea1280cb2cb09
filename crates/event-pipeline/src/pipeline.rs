//! Pipeline orchestration and lifecycle.

use crate::dispatch::DeliveryDispatcher;
use crate::{PipelineError, PipelineResult};
use batch_assembler::{AssemblerConfig, BatchAssembler};
use delivery_sink::{DeliverySink, Destination, HttpTransport, SinkConfig, Transport};
use durable_event_queue::{DurableQueue, QueueStorage};
use event_protocol_types::{Event, JsonCodec, PayloadCodec, ZstdJsonCodec};
use pipeline_config_and_utils::{Paths, PipelineConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Everything needed to assemble a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Queue namespace.
    pub namespace: String,
    /// Backing storage for the durable queue; `None` disables durability.
    pub storage: Option<QueueStorage>,
    /// Queue capacity (0 = unbounded).
    pub max_queue_size: usize,
    pub assembler: AssemblerConfig,
    pub sink: SinkConfig,
}

impl PipelineOptions {
    /// Options derived from a validated configuration.
    pub fn from_config(config: &PipelineConfig, paths: &Paths) -> Self {
        Self {
            namespace: config.namespace.clone(),
            storage: config
                .durable
                .then(|| QueueStorage::Directory(paths.queue_dir())),
            max_queue_size: config.max_queue_size,
            assembler: AssemblerConfig {
                batch_size: config.batch_size,
                flush_interval: config.flush_interval(),
            },
            sink: SinkConfig {
                max_retries: config.max_retries,
                retry_delay: config.retry_delay(),
                max_retry_delay: config.max_retry_delay(),
                destination: Destination::new(config.destination.clone()),
                expected_identity: config.expected_identity.clone(),
            },
        }
    }
}

/// Caller-owned handle to one running pipeline.
///
/// # Lifecycle
///
/// 1. [`initialize`](Self::initialize): open the queue, verify the endpoint,
///    resubmit events left over from a previous run, arm the flush timer
/// 2. [`submit`](Self::submit) events; [`flush`](Self::flush) as needed
/// 3. [`shutdown`](Self::shutdown): final flush, then release everything
///
/// Only lifecycle misuse is reported as an error from `submit`, `flush` and
/// `shutdown`; I/O failures on those paths are logged.
pub struct EventPipeline {
    namespace: String,
    queue: Option<Arc<DurableQueue>>,
    assembler: BatchAssembler,
    sink: Arc<DeliverySink>,
    lifecycle: Mutex<()>,
    submissions: Mutex<()>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
    opted_out: AtomicBool,
}

impl EventPipeline {
    /// Wire the components together. Nothing is opened yet.
    pub fn new(
        options: PipelineOptions,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn PayloadCodec>,
    ) -> PipelineResult<Self> {
        let queue = options.storage.map(|storage| {
            Arc::new(DurableQueue::new(
                options.namespace.clone(),
                storage,
                options.max_queue_size,
            ))
        });
        let sink = Arc::new(DeliverySink::new(options.sink, transport, codec));
        let dispatcher = Arc::new(DeliveryDispatcher::new(sink.clone(), queue.clone()));
        let assembler = BatchAssembler::new(options.assembler, dispatcher)?;

        Ok(Self {
            namespace: options.namespace,
            queue,
            assembler,
            sink,
            lifecycle: Mutex::new(()),
            submissions: Mutex::new(()),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            opted_out: AtomicBool::new(false),
        })
    }

    /// Build a pipeline delivering over HTTP as described by `config`.
    pub fn from_config(config: &PipelineConfig, paths: &Paths) -> PipelineResult<Self> {
        config.validate()?;

        let transport = HttpTransport::with_timeout(
            &config.endpoint,
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        let codec: Arc<dyn PayloadCodec> = if config.compress {
            Arc::new(ZstdJsonCodec::default())
        } else {
            Arc::new(JsonCodec)
        };

        Self::new(
            PipelineOptions::from_config(config, paths),
            Arc::new(transport),
            codec,
        )
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether events are persisted before batching.
    pub fn is_durable(&self) -> bool {
        self.queue.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether the flush timer is armed.
    pub fn is_running(&self) -> bool {
        self.assembler.is_running()
    }

    /// Drop all subsequently submitted events while set.
    pub fn set_opted_out(&self, opted_out: bool) {
        let previous = self.opted_out.swap(opted_out, Ordering::SeqCst);
        if previous != opted_out {
            info!(namespace = %self.namespace, opted_out, "Opt-out changed");
        }
    }

    pub fn is_opted_out(&self) -> bool {
        self.opted_out.load(Ordering::SeqCst)
    }

    /// Open the queue, verify the sink, resubmit leftover events and start
    /// the flush timer.
    ///
    /// Queue and sink failures are returned; the pipeline stays
    /// uninitialized and `initialize` may be retried.
    pub async fn initialize(&self) -> PipelineResult<()> {
        let _guard = self.lifecycle.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(PipelineError::ShutDown);
        }
        if self.is_initialized() {
            return Err(PipelineError::AlreadyInitialized);
        }

        let pending = match &self.queue {
            Some(queue) => {
                queue.initialize().await?;
                match queue.get_all().await {
                    Ok(pending) => pending,
                    Err(e) => {
                        close_quietly(queue).await;
                        return Err(e.into());
                    }
                }
            }
            None => Vec::new(),
        };

        if let Err(e) = self.sink.initialize().await {
            error!(namespace = %self.namespace, error = %e, "Delivery sink failed to initialize");
            if let Some(queue) = &self.queue {
                close_quietly(queue).await;
            }
            return Err(e.into());
        }

        let restored = pending.len();
        for event in pending {
            self.assembler.add_event(event).await;
        }

        self.assembler.start();
        self.initialized.store(true, Ordering::SeqCst);
        info!(
            namespace = %self.namespace,
            durable = self.is_durable(),
            restored,
            "Event pipeline initialized"
        );
        Ok(())
    }

    /// Accept an event for delivery.
    ///
    /// Opted-out pipelines drop the event. Otherwise it is persisted (when
    /// durable) and buffered; a persistence failure is logged and the event
    /// is still buffered.
    ///
    /// Concurrent submissions are serialized so the queue and the buffer see
    /// events in the same order. A submission that fills a batch holds the
    /// others back until that batch has been dispatched.
    pub async fn submit(&self, event: Event) -> PipelineResult<()> {
        self.ensure_initialized()?;

        if self.is_opted_out() {
            debug!(event_id = %event.id, name = %event.name, "Opted out, dropping event");
            return Ok(());
        }

        let _order = self.submissions.lock().await;
        if let Some(queue) = &self.queue {
            if let Err(e) = queue.enqueue(&event).await {
                warn!(
                    namespace = %self.namespace,
                    event_id = %event.id,
                    error = %e,
                    "Failed to persist event"
                );
            }
        }

        self.assembler.add_event(event).await;
        Ok(())
    }

    /// Dispatch whatever is buffered.
    pub async fn flush(&self) -> PipelineResult<()> {
        self.ensure_initialized()?;
        self.assembler.flush().await;
        Ok(())
    }

    /// Flush, stop the timer, dispose the sink and close the queue.
    ///
    /// Events whose final delivery fails stay queued for the next run.
    pub async fn shutdown(&self) -> PipelineResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.ensure_initialized()?;

        self.assembler.flush().await;
        self.assembler.stop();
        self.sink.dispose().await;
        if let Some(queue) = &self.queue {
            close_quietly(queue).await;
        }

        self.initialized.store(false, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
        info!(namespace = %self.namespace, "Event pipeline shut down");
        Ok(())
    }

    /// Events not yet confirmed delivered.
    ///
    /// Durable pipelines report the queue length; otherwise the number of
    /// buffered events.
    pub async fn pending_count(&self) -> PipelineResult<usize> {
        self.ensure_initialized()?;
        match &self.queue {
            Some(queue) => Ok(queue.count().await?),
            None => Ok(self.assembler.current_batch_size()),
        }
    }

    fn ensure_initialized(&self) -> PipelineResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(PipelineError::NotInitialized)
        }
    }
}

async fn close_quietly(queue: &DurableQueue) {
    if let Err(e) = queue.close().await {
        warn!(namespace = %queue.namespace(), error = %e, "Failed to close durable queue");
    }
}
