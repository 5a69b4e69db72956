use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EditorConfig {
    /// Base of the parcel backend, e.g. `http://localhost:8000/api`.
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    // Post-merge lookup of the new parcel
    pub highlight_retry_delay_ms: u64,
    pub highlight_max_attempts: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            highlight_retry_delay_ms: 600,
            highlight_max_attempts: 25,
        }
    }
}

impl EditorConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(s)?)
    }

    pub fn from_ron_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&contents)
    }

    /// `PARCEL_API_URL` and `PARCEL_API_TOKEN` win over file values.
    /// Call `dotenvy::dotenv()` first if a `.env` file should count.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PARCEL_API_URL") {
            self.api_base_url = url;
        }
        if let Ok(token) = std::env::var("PARCEL_API_TOKEN") {
            if !token.is_empty() {
                self.api_token = Some(token);
            }
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.highlight_retry_delay_ms),
            max_attempts: self.highlight_max_attempts.max(1),
        }
    }
}

/// Fixed-delay, capped retry used while waiting for a freshly written parcel
/// to show up in a reloaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        EditorConfig::default().retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = EditorConfig::from_ron_str(
            r#"(api_base_url: "https://gis.example.org/api", highlight_max_attempts: 5)"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://gis.example.org/api");
        assert_eq!(config.highlight_max_attempts, 5);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.retry_policy().delay, Duration::from_millis(600));
    }

    #[test]
    fn zero_attempts_still_looks_once() {
        let config = EditorConfig {
            highlight_max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(EditorConfig::from_ron_str("(api_base_url: 12").is_err());
    }
}
