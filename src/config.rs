use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngramConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. When unset, embedding is
    /// disabled and search degrades to substring matching.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Max vectors held by the local fallback index.
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub default_threshold: f32,
    /// KNN over-fetch factor compensating for owner/type post-filtering.
    pub candidate_multiplier: usize,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_engram_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-large".into(),
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            default_threshold: 0.7,
            candidate_multiplier: 4,
        }
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngramConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngramConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (ENGRAM_DB, ENGRAM_LOG_LEVEL,
    /// ENGRAM_EMBEDDING_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_EMBEDDING_URL") {
            self.embedding.base_url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
