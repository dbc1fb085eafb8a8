//! Store configuration.
//!
//! [`StoreConfig::load`] reads `config/config.toml` (section `[store]`, optional) and overlays
//! environment variables such as `STEELTRACK__STORE__PATH`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// PBKDF2 rounds used to derive field keys from the access code
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file; ignored by `Store::open_in_memory`
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    /// Also treat untagged base64 blobs longer than 50 characters as ciphertext
    #[serde(default = "default_legacy_detection")]
    pub legacy_ciphertext_detection: bool,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_path() -> String {
    "data/steel_track.db".to_string()
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

fn default_legacy_detection() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            kdf_iterations: default_kdf_iterations(),
            legacy_ciphertext_detection: default_legacy_detection(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Load the store configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/config.toml")
    }

    /// Same as [`StoreConfig::load`] with an explicit file location.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("STEELTRACK").separator("__").try_parsing(true));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // An unreadable file should not stop the app; env vars alone still apply.
                if std::path::Path::new(file).exists() {
                    log::warn!("Failed to load config file {file}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("STEELTRACK").separator("__").try_parsing(true))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<StoreConfig>("store") {
            Ok(cfg) => cfg.validated(),
            Err(ConfigError::NotFound(_)) => Ok(StoreConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Store configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.kdf_iterations == 0 {
            return Err(ConfigError::Message("store.kdf_iterations must be positive".to_string()));
        }
        Ok(self)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }
}
