//! Configuration management for the pipeline.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default collector endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787";

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "EVENT_PIPELINE_";

/// Pipeline configuration.
///
/// Missing keys in the JSON file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Emit JSON log lines instead of text.
    pub log_json: bool,
    /// Queue namespace; one database per namespace.
    pub namespace: String,
    /// Persist events so they survive restarts.
    pub durable: bool,
    /// Queue capacity (0 = unbounded).
    pub max_queue_size: usize,
    /// Events per batch.
    pub batch_size: usize,
    /// Flush timer period in milliseconds.
    pub flush_interval_ms: u64,
    /// Collector base URL.
    pub endpoint: String,
    /// Bearer token for the collector.
    pub api_key: Option<String>,
    /// Destination name on the collector.
    pub destination: String,
    /// Identity the collector must report; unset skips the check.
    pub expected_identity: Option<String>,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff after the first failure, in milliseconds.
    pub retry_delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Compress payloads with zstd.
    pub compress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            namespace: "default".to_string(),
            durable: true,
            max_queue_size: 1000,
            batch_size: 50,
            flush_interval_ms: 5_000,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            destination: "events".to_string(),
            expected_identity: None,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 60_000,
            request_timeout_ms: 30_000,
            compress: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the config file (if any), then apply
    /// environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from `EVENT_PIPELINE_*` environment variables.
    pub fn load_from_env(&mut self) -> CoreResult<()> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Override fields from a key lookup (keys without the prefix).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("LOG_JSON") {
            self.log_json = parse_override("LOG_JSON", &v)?;
        }
        if let Some(v) = lookup("NAMESPACE") {
            self.namespace = v;
        }
        if let Some(v) = lookup("DURABLE") {
            self.durable = parse_override("DURABLE", &v)?;
        }
        if let Some(v) = lookup("MAX_QUEUE_SIZE") {
            self.max_queue_size = parse_override("MAX_QUEUE_SIZE", &v)?;
        }
        if let Some(v) = lookup("BATCH_SIZE") {
            self.batch_size = parse_override("BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("FLUSH_INTERVAL_MS") {
            self.flush_interval_ms = parse_override("FLUSH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("API_KEY") {
            self.api_key = Some(v).filter(|key| !key.trim().is_empty());
        }
        if let Some(v) = lookup("DESTINATION") {
            self.destination = v;
        }
        if let Some(v) = lookup("EXPECTED_IDENTITY") {
            self.expected_identity = Some(v).filter(|id| !id.trim().is_empty());
        }
        if let Some(v) = lookup("MAX_RETRIES") {
            self.max_retries = parse_override("MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_override("RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("MAX_RETRY_DELAY_MS") {
            self.max_retry_delay_ms = parse_override("MAX_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_override("REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("COMPRESS") {
            self.compress = parse_override("COMPRESS", &v)?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(CoreError::Config("namespace must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(CoreError::Config("batch_size must be at least 1".to_string()));
        }
        if self.flush_interval_ms == 0 {
            return Err(CoreError::Config(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(CoreError::Config("destination must not be empty".to_string()));
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            return Err(CoreError::Config(format!(
                "max_retry_delay_ms ({}) is below retry_delay_ms ({})",
                self.max_retry_delay_ms, self.retry_delay_ms
            )));
        }

        let url = self.endpoint_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "endpoint must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// Get the endpoint as a parsed URL.
    pub fn endpoint_url(&self) -> CoreResult<Url> {
        Url::parse(&self.endpoint).map_err(CoreError::from)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> CoreResult<T> {
    raw.trim().parse().map_err(|_| {
        CoreError::Config(format!(
            "invalid value for {}{}: {:?}",
            ENV_PREFIX, key, raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.durable);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "namespace": "checkout",
            "batch_size": 10,
            "compress": true
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = PipelineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.namespace, "checkout");
        assert_eq!(config.batch_size, 10);
        assert!(config.compress);
        assert_eq!(config.flush_interval_ms, 5_000);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = PipelineConfig {
            namespace: "mobile".to_string(),
            max_queue_size: 0,
            api_key: Some("token".to_string()),
            ..PipelineConfig::default()
        };
        config.save(&paths).unwrap();

        let loaded = PipelineConfig::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_from_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = PipelineConfig::load_from_file(&paths.config_file());
        assert!(matches!(config, Err(CoreError::Io(_))));
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("missing"));

        let config = PipelineConfig::load(&paths).unwrap();
        assert_eq!(config.batch_size, PipelineConfig::default().batch_size);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(lookup(&[
                ("NAMESPACE", "web"),
                ("BATCH_SIZE", "25"),
                ("DURABLE", "false"),
                ("API_KEY", "secret"),
                ("FLUSH_INTERVAL_MS", " 250 "),
                ("REQUEST_TIMEOUT_MS", "1500"),
            ]))
            .unwrap();

        assert_eq!(config.namespace, "web");
        assert_eq!(config.batch_size, 25);
        assert!(!config.durable);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_blank_override_clears_optional() {
        let mut config = PipelineConfig {
            expected_identity: Some("collector".to_string()),
            ..PipelineConfig::default()
        };
        config
            .apply_overrides(lookup(&[("EXPECTED_IDENTITY", "  ")]))
            .unwrap();
        assert!(config.expected_identity.is_none());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(lookup(&[("BATCH_SIZE", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("EVENT_PIPELINE_BATCH_SIZE"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_batch = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero_batch.validate(), Err(CoreError::Config(_))));

        let zero_interval = PipelineConfig {
            flush_interval_ms: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero_interval.validate(), Err(CoreError::Config(_))));

        let empty_namespace = PipelineConfig {
            namespace: " ".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(empty_namespace.validate(), Err(CoreError::Config(_))));

        let inverted_backoff = PipelineConfig {
            retry_delay_ms: 5_000,
            max_retry_delay_ms: 1_000,
            ..PipelineConfig::default()
        };
        assert!(matches!(inverted_backoff.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let unparsable = PipelineConfig {
            endpoint: "not a valid url".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(unparsable.validate(), Err(CoreError::InvalidUrl(_))));

        let wrong_scheme = PipelineConfig {
            endpoint: "ftp://collector.example.com".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(wrong_scheme.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_load_validates() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{"batch_size": 0}"#).unwrap();

        assert!(matches!(PipelineConfig::load(&paths), Err(CoreError::Config(_))));
    }
}
