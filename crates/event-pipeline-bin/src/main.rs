//! Event pipeline command-line tool.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use durable_event_queue::{DurableQueue, QueueStorage};
use event_pipeline::EventPipeline;
use event_protocol_types::{Event, EventKind, Properties};
use pipeline_config_and_utils::{init_logging, Paths, PipelineConfig};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Event pipeline command-line interface.
#[derive(Parser)]
#[command(name = "event-pipeline")]
#[command(about = "Persist, batch and deliver application events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and queues. Defaults to ~/.event-pipeline
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Queue namespace; overrides the config file
    #[arg(short, long, global = true, env = "EVENT_PIPELINE_NAMESPACE")]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit events read as JSON lines, then flush and shut down
    Send {
        /// Input file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Session identifier for events that do not carry one
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Print the number of undelivered events in the queue
    Status,
    /// Delete every undelivered event in the queue
    Purge,
    /// Print the effective configuration
    Config,
}

/// One input line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventLine {
    #[serde(default)]
    id: Option<String>,
    kind: EventKind,
    name: String,
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    subject_id: Option<String>,
    /// Raw identifier to store only as a SHA-256 hash.
    #[serde(default)]
    hash_subject: Option<String>,
}

impl EventLine {
    fn into_event(self, default_session: &str) -> Event {
        let session_id = self.session_id.unwrap_or_else(|| default_session.to_string());
        let mut event = Event::new(self.kind, self.name, session_id);
        if let Some(id) = self.id {
            event = event.with_id(id);
        }
        if let Some(properties) = self.properties {
            event = event.with_properties(properties);
        }
        if let Some(raw) = self.hash_subject {
            event = event.with_hashed_subject(&raw);
        } else if let Some(subject) = self.subject_id {
            event = event.with_subject(subject);
        }
        event
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = PipelineConfig::load(&paths).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
        config.validate()?;
    }

    init_logging(&config.log_level, config.log_json);

    match cli.command {
        Commands::Send { file, session_id } => {
            let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            match file {
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    send(&config, &paths, BufReader::new(file), &session_id).await?;
                }
                None => {
                    send(&config, &paths, BufReader::new(tokio::io::stdin()), &session_id).await?;
                }
            }
        }
        Commands::Status => {
            let queue = open_queue(&config, &paths).await?;
            let pending = queue.count().await?;
            queue.close().await?;
            println!("{}: {} pending", config.namespace, pending);
        }
        Commands::Purge => {
            let queue = open_queue(&config, &paths).await?;
            let pending = queue.count().await?;
            queue.clear().await?;
            queue.close().await?;
            println!("{}: purged {} events", config.namespace, pending);
        }
        Commands::Config => {
            let mut shown = config.clone();
            if shown.api_key.is_some() {
                shown.api_key = Some("<redacted>".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

async fn send<R>(config: &PipelineConfig, paths: &Paths, input: R, session_id: &str) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let pipeline = EventPipeline::from_config(config, paths)?;
    pipeline
        .initialize()
        .await
        .context("failed to initialize pipeline")?;

    let mut lines = input.lines();
    let mut submitted = 0usize;
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLine>(line) {
            Ok(parsed) => {
                pipeline.submit(parsed.into_event(session_id)).await?;
                submitted += 1;
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed event line"),
        }
    }

    pipeline.shutdown().await?;

    if submitted == 0 {
        bail!("no events submitted");
    }
    info!(submitted, namespace = %config.namespace, "Events submitted");
    Ok(())
}

async fn open_queue(config: &PipelineConfig, paths: &Paths) -> anyhow::Result<DurableQueue> {
    if !config.durable {
        bail!("namespace {} is not durable; nothing is queued", config.namespace);
    }
    let queue = DurableQueue::new(
        config.namespace.clone(),
        QueueStorage::Directory(paths.queue_dir()),
        config.max_queue_size,
    );
    queue.initialize().await?;
    Ok(queue)
}
