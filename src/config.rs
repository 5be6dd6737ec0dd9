use crate::render::coordinator::ReplacementMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleboxConfig {
    pub message_rendered_delay_ms: u64,
    pub chat_changed_delay_ms: u64,
    pub startup_delay_ms: u64,
    pub structure_changed_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_interval_ms: u64,
    pub save_debounce_ms: u64,
    pub replacement_mode: ReplacementMode,
    pub stream_chunk_chars: usize,
    pub stream_interval_ms: u64,
}

impl Default for StyleboxConfig {
    fn default() -> Self {
        Self {
            message_rendered_delay_ms: 100,
            chat_changed_delay_ms: 500,
            startup_delay_ms: 1000,
            structure_changed_delay_ms: 50,
            retry_attempts: 5,
            retry_interval_ms: 100,
            save_debounce_ms: 300,
            replacement_mode: ReplacementMode::Replace,
            stream_chunk_chars: 6,
            stream_interval_ms: 40,
        }
    }
}

impl StyleboxConfig {
    pub fn message_rendered_delay(&self) -> Duration {
        Duration::from_millis(self.message_rendered_delay_ms)
    }

    pub fn chat_changed_delay(&self) -> Duration {
        Duration::from_millis(self.chat_changed_delay_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn structure_changed_delay(&self) -> Duration {
        Duration::from_millis(self.structure_changed_delay_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!(%err, "using default configuration");
            Self::default()
        })
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("stylebox"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".stylebox")
        })
}
