use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_STATE_PATH: &str = "nos-state.json";
pub const DEFAULT_EVENTS_PATH: &str = "nos-events.jsonl";

/// Static token metadata. Decimals are fixed at [`crate::DECIMALS`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub token_uri: Option<String>,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "BlockNet NOS".to_string(),
            symbol: "NOS".to_string(),
            token_uri: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    pub metadata: TokenMetadata,
    pub state_path: PathBuf,
    pub events_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            metadata: TokenMetadata::default(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            events_path: PathBuf::from(DEFAULT_EVENTS_PATH),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("token {0} must not be empty")]
    Empty(&'static str),
}

impl LedgerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: LedgerConfig =
            serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata.name.trim().is_empty() {
            return Err(ConfigError::Empty("name"));
        }
        if self.metadata.symbol.trim().is_empty() {
            return Err(ConfigError::Empty("symbol"));
        }
        Ok(())
    }
}
