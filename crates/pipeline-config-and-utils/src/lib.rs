//! Configuration, file system paths and logging for the event pipeline.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{PipelineConfig, DEFAULT_ENDPOINT, DEFAULT_LOG_LEVEL, ENV_PREFIX};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
