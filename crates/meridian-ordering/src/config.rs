//! # Ordering Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MERIDIAN_PAYMENT_POLICY=allow_partial                              │
//! │     MERIDIAN_DB_PATH=/var/lib/meridian/meridian.db                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/meridian-backoffice/ordering.toml (Linux)                │
//! │     ~/Library/Application Support/com.meridian.backoffice/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     require_full, on_payment, 5s storage timeout                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ordering.toml
//! [ordering]
//! payment_policy = "require_full"    # require_full | allow_partial
//! inventory_policy = "on_payment"    # on_payment | on_creation
//! storage_timeout_ms = 5000
//! max_conflict_retries = 3
//!
//! [database]
//! path = "/var/lib/meridian/meridian.db"
//! max_connections = 5
//! ```

use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use meridian_core::{InventoryPolicy, PaymentPolicy};
use meridian_db::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid ordering configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Ordering Settings
// =============================================================================

/// Business policies and storage limits of the ordering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingSettings {
    #[serde(default)]
    pub payment_policy: PaymentPolicy,

    #[serde(default)]
    pub inventory_policy: InventoryPolicy,

    /// Upper bound for any single storage call (milliseconds).
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_ms: u64,

    /// How often a ledger re-reads and re-applies after losing a version race.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_storage_timeout() -> u64 {
    5_000
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for OrderingSettings {
    fn default() -> Self {
        OrderingSettings {
            payment_policy: PaymentPolicy::default(),
            inventory_policy: InventoryPolicy::default(),
            storage_timeout_ms: default_storage_timeout(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl OrderingSettings {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

// =============================================================================
// Ordering Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingConfig {
    #[serde(default)]
    pub ordering: OrderingSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl OrderingConfig {
    /// Loads configuration: file (if present), then environment overrides.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ordering config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ordering config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ordering config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.ordering.storage_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }

    /// Applies `MERIDIAN_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("MERIDIAN_PAYMENT_POLICY") {
            match parse_snake_case::<PaymentPolicy>(&raw) {
                Some(policy) => {
                    debug!(policy = %raw, "Overriding payment policy from environment");
                    self.ordering.payment_policy = policy;
                }
                None => warn!(policy = %raw, "Unknown payment policy in environment"),
            }
        }

        if let Some(raw) = lookup("MERIDIAN_INVENTORY_POLICY") {
            match parse_snake_case::<InventoryPolicy>(&raw) {
                Some(policy) => {
                    debug!(policy = %raw, "Overriding inventory policy from environment");
                    self.ordering.inventory_policy = policy;
                }
                None => warn!(policy = %raw, "Unknown inventory policy in environment"),
            }
        }

        if let Some(raw) = lookup("MERIDIAN_STORAGE_TIMEOUT_MS") {
            if let Ok(ms) = raw.parse::<u64>() {
                self.ordering.storage_timeout_ms = ms;
            }
        }

        if let Some(raw) = lookup("MERIDIAN_MAX_CONFLICT_RETRIES") {
            if let Ok(n) = raw.parse::<u32>() {
                self.ordering.max_conflict_retries = n;
            }
        }

        if let Some(path) = lookup("MERIDIAN_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup("MERIDIAN_DB_MAX_CONNECTIONS") {
            if let Ok(n) = raw.parse::<u32>() {
                self.database.max_connections = n;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "meridian", "backoffice")
            .map(|dirs| dirs.config_dir().join("ordering.toml"))
    }

    /// The configured database file, or `meridian.db` in the platform data
    /// directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "meridian", "backoffice")
                .map(|dirs| dirs.data_dir().join("meridian.db"))
        })
    }

    /// Pool configuration for `meridian_db::Database::new`.
    pub fn db_config(&self) -> ConfigResult<DbConfig> {
        let path = self.database_path().ok_or(ConfigError::NoPath)?;
        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections))
    }
}

/// Parses a unit enum variant from its serde `snake_case` name.
fn parse_snake_case<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let normalized = raw.trim().to_lowercase();
    let de: StrDeserializer<'_, ValueError> = normalized.as_str().into_deserializer();
    T::deserialize(de).ok()
}
