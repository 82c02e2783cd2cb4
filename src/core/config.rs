use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::currency::Currency;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KrakenProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_coingecko")]
    pub coingecko: CoinGeckoProviderConfig,
    #[serde(default = "default_kraken")]
    pub kraken: KrakenProviderConfig,
}

fn default_coingecko() -> CoinGeckoProviderConfig {
    CoinGeckoProviderConfig {
        base_url: "https://api.coingecko.com".to_string(),
    }
}

fn default_kraken() -> KrakenProviderConfig {
    KrakenProviderConfig {
        base_url: "https://api.kraken.com".to_string(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: default_coingecko(),
            kraken: default_kraken(),
        }
    }
}

/// Tuning for the rate provider. The GBP bound is a heuristic: a quote is
/// plausible when `|gbp - usd * gbp_usd_ratio| <= usd * gbp_tolerance`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RatesConfig {
    pub fresh_for_secs: u64,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub gbp_usd_ratio: f64,
    pub gbp_tolerance: f64,
    pub timezone: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        RatesConfig {
            fresh_for_secs: 4 * 60,
            refresh_interval_secs: 5 * 60,
            request_timeout_secs: 10,
            gbp_usd_ratio: 0.75,
            gbp_tolerance: 0.15,
            timezone: "Europe/London".to_string(),
        }
    }
}

impl RatesConfig {
    pub fn fresh_for(&self) -> Duration {
        Duration::from_secs(self.fresh_for_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CheckoutConfig {
    pub submit_delay_ms: u64,
    pub payment_delay_ms: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            submit_delay_ms: 1000,
            payment_delay_ms: 10_000,
        }
    }
}

impl CheckoutConfig {
    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    pub data_path: Option<String>,
}

fn default_currency() -> Currency {
    Currency::Usd
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            rates: RatesConfig::default(),
            checkout: CheckoutConfig::default(),
            currency: default_currency(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when
    /// no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "basedmotors", "basedmotors")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("com", "basedmotors", "basedmotors")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty document deserializes to unit, not to an empty mapping
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
