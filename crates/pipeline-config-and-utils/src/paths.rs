//! File system paths for the event pipeline.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the pipeline.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.event-pipeline)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.event-pipeline`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".event-pipeline"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.event-pipeline).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.event-pipeline/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Directory holding one queue database per namespace (~/.event-pipeline/queues).
    pub fn queue_dir(&self) -> PathBuf {
        self.base_dir.join("queues")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.queue_dir())?;
        Ok(())
    }
}
