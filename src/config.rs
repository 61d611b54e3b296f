//! Configuration management for the speech bridge
//!
//! Runtime configuration is loaded from a JSON file so transport behaviour and
//! log verbosity can be adjusted without recompiling. Missing or malformed
//! files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SPEECH_BRIDGE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "assets/bridge_config.json";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub handles: HandleConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Handle token generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandleConfig {
    /// Fixed salt for handle tokens; random when absent
    #[serde(default)]
    pub salt_seed: Option<u64>,
}

/// In-process transport behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Reflect every sent message back as a received message
    pub echo_messages: bool,
    /// Prefix for generated session identifiers
    pub session_id_prefix: String,
    /// Most recent sent messages kept for inspection; 0 keeps none
    #[serde(default = "default_sent_history")]
    pub sent_history: usize,
}

fn default_sent_history() -> usize {
    32
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            echo_messages: true,
            session_id_prefix: "loopback-".to_string(),
            sent_history: default_sent_history(),
        }
    }
}

/// Logging setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::debug!(
                    "[Config] No config file at {:?} ({}). Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from `SPEECH_BRIDGE_CONFIG`, else the bundled asset path
    pub fn load() -> Self {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from_file(path),
            _ => Self::load_from_file(DEFAULT_CONFIG_PATH),
        }
    }
}
