use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::domain::{default_rates, DEFAULT_BASE_CURRENCY, DEFAULT_REFERENCE_COUNTRY};

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "ShipmentRates";
const APP_NAME: &str = "ShipmentRates";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
}

/// Engine settings. Missing keys fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Base URL of the rating service; `rates` is resolved against it.
    pub rating_base_url: String,
    pub exchange_rates_url: String,
    pub user_agent: String,
    pub base_currency: String,
    /// Country the shipment scopes are judged against.
    pub reference_country: String,
    pub exchange_rate_ttl_secs: u64,
    /// Served when no exchange-rate table can be fetched or loaded.
    pub fallback_rates: HashMap<String, f64>,
    pub manual_courier_name: String,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            rating_base_url: "http://127.0.0.1:8080/api/".to_string(),
            exchange_rates_url: "http://127.0.0.1:8080/api/exchange-rates".to_string(),
            user_agent: concat!("shipment-rates/", env!("CARGO_PKG_VERSION")).to_string(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            reference_country: DEFAULT_REFERENCE_COUNTRY.to_string(),
            exchange_rate_ttl_secs: 60 * 60,
            fallback_rates: default_rates(),
            manual_courier_name: "Manual courier".to_string(),
        }
    }
}

impl RatingConfig {
    pub fn exchange_rate_ttl(&self) -> Duration {
        Duration::from_secs(self.exchange_rate_ttl_secs)
    }
}

fn config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

/// Loads the config from the platform config dir, or the defaults.
pub fn load_config() -> RatingConfig {
    let Some(path) = config_file() else {
        log::debug!("[config] No config directory; using defaults");
        return RatingConfig::default();
    };
    match load_config_from(&path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::debug!("[config] No config at {}; using defaults", path.display());
            RatingConfig::default()
        }
        Err(err) => {
            log::warn!("[config] Failed to load {}: {err}; using defaults", path.display());
            RatingConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<Option<RatingConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

pub fn save_config(config: &RatingConfig) -> Result<(), ConfigError> {
    let path = config_file().ok_or(ConfigError::StorageUnavailable)?;
    save_config_to(&path, config)
}

pub fn save_config_to(path: &Path, config: &RatingConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}
