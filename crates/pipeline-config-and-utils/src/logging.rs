//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Log level comes from `RUST_LOG` when set, otherwise `level`. With `json`
/// each line is a JSON object; otherwise compact text. Output goes to
/// stderr. Calling this more than once keeps the first subscriber.
///
/// ```ignore
/// init_logging("info", false);
/// tracing::info!("Pipeline started");
/// ```
pub fn init_logging(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };

    if result.is_ok() {
        tracing::debug!(level, json, "Logging initialized");
    }
}
