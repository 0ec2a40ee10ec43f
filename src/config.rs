use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PriceWatchError;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_HISTORY_CAP: usize = 20;
pub const DEFAULT_STATS_WINDOW: usize = 10;

/// One tracked instrument, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub initial_price: f64,
    /// Per-tick perturbation bound, e.g. 0.02 for +/-2%.
    pub volatility: f64,
    /// Optional price alert armed at startup.
    #[serde(default)]
    pub alert_threshold: Option<f64>,
}

/// Runtime knobs, overridable from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tick_interval: Duration,
    pub history_cap: usize,
    pub stats_window: usize,
    pub stats_enabled: bool,
    /// When set, stats older than this are cleared at tick time.
    /// Unset means last-known values are shown until replaced.
    pub stats_stale_after: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            history_cap: DEFAULT_HISTORY_CAP,
            stats_window: DEFAULT_STATS_WINDOW,
            stats_enabled: true,
            stats_stale_after: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, PriceWatchError> {
        Ok(Self {
            tick_interval: Duration::from_millis(env_parse(
                "TICK_INTERVAL_MS",
                DEFAULT_TICK_INTERVAL_MS,
            )?),
            history_cap: env_parse("HISTORY_CAP", DEFAULT_HISTORY_CAP)?,
            stats_window: env_parse("STATS_WINDOW", DEFAULT_STATS_WINDOW)?,
            stats_enabled: env_parse("STATS_ENABLED", true)?,
            stats_stale_after: env_parse_opt::<u64>("STATS_STALE_AFTER_MS")?
                .map(Duration::from_millis),
        })
    }
}

/// Loads the instrument list from `ASSETS_FILE` (a JSON array) when set,
/// otherwise falls back to the built-in watch list.
pub fn load_assets() -> Result<Vec<AssetConfig>, PriceWatchError> {
    match env::var("ASSETS_FILE") {
        Ok(path) => {
            let raw = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        Err(_) => Ok(default_assets()),
    }
}

pub fn default_assets() -> Vec<AssetConfig> {
    [
        ("btc", "Bitcoin", "BTCUSDT", 43_250.0, 0.02, Some(44_500.0)),
        ("eth", "Ethereum", "ETHUSDT", 2_280.0, 0.03, None),
        ("sol", "Solana", "SOLUSDT", 98.5, 0.05, Some(105.0)),
        ("xrp", "Ripple", "XRPUSDT", 0.52, 0.04, None),
        ("ada", "Cardano", "ADAUSDT", 0.58, 0.04, None),
        ("doge", "Dogecoin", "DOGEUSDT", 0.078, 0.06, None),
    ]
    .into_iter()
    .map(
        |(id, name, symbol, initial_price, volatility, alert_threshold)| AssetConfig {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            initial_price,
            volatility,
            alert_threshold,
        },
    )
    .collect()
}

fn env_parse<T: FromStr>(name: &'static str, default: T) -> Result<T, PriceWatchError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PriceWatchError::InvalidEnv { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: FromStr>(name: &'static str) -> Result<Option<T>, PriceWatchError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| PriceWatchError::InvalidEnv { name, value: raw }),
        Err(_) => Ok(None),
    }
}
