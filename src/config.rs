use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Floor applied to `poll_interval` to protect the shared API budget.
pub const MIN_POLL_INTERVAL_SECS: f64 = 0.3;

/// Environment variable holding the hex private key.
pub const PRIVATE_KEY_VAR: &str = "POLYMARKET_PRIVATE_KEY";

/// Environment variable holding the proxy (Safe) wallet address.
pub const PROXY_ADDRESS_VAR: &str = "POLYMARKET_PROXY_ADDRESS";

/// Application config, deserialized from `config.toml` or a `.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Wallet addresses whose positions are mirrored.
    #[serde(default)]
    pub wallets_to_track: Vec<String>,
    /// Percentage of each tracked trade's size to copy (1.0 = 1%).
    #[serde(default = "default_copy_percentage")]
    pub copy_percentage: f64,
    /// Positions requests allowed per 10 seconds, across all wallets.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// When false, copy orders are computed and logged but never sent.
    #[serde(default)]
    pub trading_enabled: bool,
    /// Seconds to wait between passes over all wallets.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

fn default_copy_percentage() -> f64 {
    1.0
}

fn default_rate_limit() -> u32 {
    25
}

fn default_poll_interval() -> f64 {
    0.5
}

impl AppConfig {
    /// Load config from the given path, TOML unless the extension is `.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        };
        config.with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reject configs the poll loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.wallets_to_track.is_empty() {
            bail!("no wallets to track, set wallets_to_track in the config");
        }
        if let Some(idx) = self.wallets_to_track.iter().position(|w| w.trim().is_empty()) {
            bail!("wallets_to_track[{idx}] is empty");
        }
        if !self.copy_percentage.is_finite() || self.copy_percentage < 0.0 {
            bail!("copy_percentage must be a non-negative number, got {}", self.copy_percentage);
        }
        if self.rate_limit == 0 {
            bail!("rate_limit must be at least 1 call per 10s");
        }
        if !self.poll_interval.is_finite() {
            bail!("poll_interval must be a finite number of seconds");
        }
        Ok(())
    }

    /// Poll interval with the minimum floor applied.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval.max(MIN_POLL_INTERVAL_SECS))
    }
}

/// Secrets needed for live order submission, supplied via the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub private_key: String,
    pub proxy_address: String,
}

impl Credentials {
    /// Read credentials from the environment (after loading `.env` if present).
    /// Missing variables yield empty strings.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            private_key: std::env::var(PRIVATE_KEY_VAR).unwrap_or_default(),
            proxy_address: std::env::var(PROXY_ADDRESS_VAR).unwrap_or_default(),
        }
    }

    /// Both secrets are present; live trading can be attempted.
    pub fn is_complete(&self) -> bool {
        !self.private_key.trim().is_empty() && !self.proxy_address.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("private_key", &"<redacted>")
            .field("proxy_address", &self.proxy_address)
            .finish()
    }
}
