//! Configuration for the bingo engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Game rules and defaults
    pub game: GameConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/bingo"),
            service_name: "bingo-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Game rules and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Maximum length of a text submission (code points)
    pub text_max_chars: usize,

    /// Leaderboard size when the caller does not ask for one
    pub leaderboard_default_top_k: usize,

    /// Display names are truncated to this many code points
    pub participant_name_max_chars: usize,

    /// Line bonus for events created without one
    pub default_line_bonus_points: i64,

    /// Resubmission budget for events created without one
    pub default_max_resubmits: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            text_max_chars: 140,
            leaderboard_default_top_k: 50,
            participant_name_max_chars: 20,
            default_line_bonus_points: 100,
            default_max_resubmits: 2,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("BINGO_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(value) = std::env::var("BINGO_TEXT_MAX_CHARS") {
            config.game.text_max_chars = value.parse().map_err(|e| {
                crate::Error::Config(format!("BINGO_TEXT_MAX_CHARS: {}", e))
            })?;
        }

        if let Ok(value) = std::env::var("BINGO_LEADERBOARD_TOP_K") {
            config.game.leaderboard_default_top_k = value.parse().map_err(|e| {
                crate::Error::Config(format!("BINGO_LEADERBOARD_TOP_K: {}", e))
            })?;
        }

        Ok(config)
    }
}
