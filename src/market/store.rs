use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{AssetConfig, Settings};
use crate::error::PriceWatchError;
use crate::market::sim;
use crate::stats::bridge::StatsHandle;
use crate::stats::StatsResult;

/// Assets moving more than this much in a tick count as gainers/losers.
const MOVER_THRESHOLD_PCT: f64 = 5.0;

/// One tracked instrument. Identity fields are fixed at initialization;
/// everything else is replaced wholesale by the store's mutation operations.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub previous_price: f64,
    pub change_percent: f64,
    pub price_history: VecDeque<f64>,
    pub volatility_factor: f64,
    pub alert_threshold: Option<f64>,
    pub alert_triggered: bool,
    pub moving_average: Option<f64>,
    pub volatility: Option<f64>,
    pub stats_updated_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
}

impl Asset {
    fn new(config: &AssetConfig, now: DateTime<Utc>) -> Self {
        let mut asset = Self {
            id: config.id.clone(),
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            price: config.initial_price,
            previous_price: config.initial_price,
            change_percent: 0.0,
            price_history: VecDeque::from([config.initial_price]),
            volatility_factor: config.volatility,
            alert_threshold: config.alert_threshold,
            alert_triggered: false,
            moving_average: None,
            volatility: None,
            stats_updated_at: None,
            last_update: now,
        };
        asset.alert_triggered = asset.evaluate_alert();
        asset
    }

    /// Alert state is always derived from the current price and threshold,
    /// never stored independently.
    fn evaluate_alert(&self) -> bool {
        matches!(self.alert_threshold, Some(t) if self.price >= t)
    }
}

/// Owner of the asset collection. Cheap to clone; all clones share state.
///
/// Every mutation builds a fresh `Vec` and swaps the `Arc` under the lock,
/// so readers holding a snapshot never observe a half-applied tick.
#[derive(Clone)]
pub struct AssetStore {
    assets: Arc<Mutex<Arc<Vec<Asset>>>>,
    rng: Arc<Mutex<Box<dyn RngCore + Send>>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    stats: Arc<Mutex<Option<StatsHandle>>>,
    snapshots: Arc<watch::Sender<Arc<Vec<Asset>>>>,
    settings: Settings,
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AssetStore {
    pub fn initialize(
        configs: &[AssetConfig],
        settings: Settings,
    ) -> Result<Self, PriceWatchError> {
        Self::with_rng(configs, settings, Box::new(StdRng::from_os_rng()))
    }

    /// Like [`initialize`](Self::initialize), but with a caller-supplied
    /// random source for reproducible price paths.
    pub fn with_rng(
        configs: &[AssetConfig],
        settings: Settings,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, PriceWatchError> {
        if configs.is_empty() {
            return Err(PriceWatchError::EmptyConfig);
        }
        let mut seen = HashSet::new();
        for config in configs {
            if !seen.insert(config.id.as_str()) {
                return Err(PriceWatchError::DuplicateAsset(config.id.clone()));
            }
        }

        let now = Utc::now();
        let snapshot = Arc::new(
            configs
                .iter()
                .map(|config| Asset::new(config, now))
                .collect::<Vec<_>>(),
        );
        let (snapshots, _) = watch::channel(snapshot.clone());

        Ok(Self {
            assets: Arc::new(Mutex::new(snapshot)),
            rng: Arc::new(Mutex::new(rng)),
            ticker: Arc::new(Mutex::new(None)),
            stats: Arc::new(Mutex::new(None)),
            snapshots: Arc::new(snapshots),
            settings,
        })
    }

    /// Wires the store to a stats bridge. Ticks fire requests through this
    /// handle once an asset has at least two history samples.
    pub fn attach_stats(&self, handle: StatsHandle) {
        *self.stats.lock().unwrap() = Some(handle);
    }

    /// Advances every asset by one simulated step, in configuration order.
    ///
    /// The whole batch is swapped in at once; stats requests go out after
    /// the swap and never block the tick.
    pub fn tick(&self) {
        let now = Utc::now();
        let snapshot = {
            let mut rng = self.rng.lock().unwrap();
            let mut assets = self.assets.lock().unwrap();
            let next: Vec<Asset> = assets
                .iter()
                .map(|asset| self.advance(asset, &mut **rng, now))
                .collect();
            *assets = Arc::new(next);
            assets.clone()
        };

        self.snapshots.send_replace(snapshot.clone());
        self.request_stats(&snapshot);
    }

    fn advance(&self, asset: &Asset, rng: &mut (dyn RngCore + Send), now: DateTime<Utc>) -> Asset {
        let mut next = asset.clone();
        next.previous_price = asset.price;
        next.price = sim::simulate_next_price(rng, asset.price, asset.volatility_factor);
        next.price_history.push_back(next.price);
        while next.price_history.len() > self.settings.history_cap {
            next.price_history.pop_front();
        }
        next.change_percent = sim::percent_change(next.price, next.previous_price);
        next.alert_triggered = next.evaluate_alert();
        next.last_update = now;

        if let Some(stale_after) = self.settings.stats_stale_after {
            if let Some(at) = next.stats_updated_at {
                let age = now.signed_duration_since(at).to_std().unwrap_or_default();
                if age > stale_after {
                    next.moving_average = None;
                    next.volatility = None;
                    next.stats_updated_at = None;
                }
            }
        }

        next
    }

    fn request_stats(&self, snapshot: &Arc<Vec<Asset>>) {
        let handle = self.stats.lock().unwrap().clone();
        let Some(handle) = handle else { return };
        for asset in snapshot.iter() {
            if asset.price_history.len() < 2 {
                continue;
            }
            // The history crosses the channel as an owned copy.
            let prices: Vec<f64> = asset.price_history.iter().copied().collect();
            handle.request(&asset.id, prices, self.settings.stats_window);
        }
    }

    /// Sets or clears an alert threshold and re-evaluates the alert against
    /// the current price immediately. Unknown ids are ignored.
    pub fn set_alert_threshold(&self, asset_id: &str, threshold: Option<f64>) {
        let snapshot = {
            let mut assets = self.assets.lock().unwrap();
            if !assets.iter().any(|a| a.id == asset_id) {
                debug!("ignoring alert threshold for unknown asset {}", asset_id);
                return;
            }
            let next: Vec<Asset> = assets
                .iter()
                .map(|asset| {
                    if asset.id != asset_id {
                        return asset.clone();
                    }
                    let mut asset = asset.clone();
                    asset.alert_threshold = threshold;
                    asset.alert_triggered = asset.evaluate_alert();
                    asset
                })
                .collect();
            *assets = Arc::new(next);
            assets.clone()
        };
        self.snapshots.send_replace(snapshot);
    }

    /// Merges an asynchronously computed result into the matching asset.
    /// Last write wins; a superseded result landing late simply overwrites.
    /// Unknown ids are ignored.
    pub fn merge_stats(&self, result: &StatsResult) {
        let snapshot = {
            let mut assets = self.assets.lock().unwrap();
            if !assets.iter().any(|a| a.id == result.asset_id) {
                debug!("dropping stats for unknown asset {}", result.asset_id);
                return;
            }
            let next: Vec<Asset> = assets
                .iter()
                .map(|asset| {
                    if asset.id != result.asset_id {
                        return asset.clone();
                    }
                    let mut asset = asset.clone();
                    asset.moving_average = Some(result.moving_average);
                    asset.volatility = Some(result.volatility);
                    asset.stats_updated_at = Some(result.computed_at);
                    asset
                })
                .collect();
            *assets = Arc::new(next);
            assets.clone()
        };
        self.snapshots.send_replace(snapshot);
    }

    /// Starts the periodic ticker if it is not already running. Only one
    /// ticker task exists at a time, however often this is called.
    pub fn resume(&self) {
        let mut ticker = self.ticker.lock().unwrap();
        if ticker.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let store = self.clone();
        let period = self.settings.tick_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // A slow tick delays the next one instead of overlapping it.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.tick();
            }
        }));
    }

    /// Stops future ticks. In-flight stats requests are not cancelled.
    pub fn pause(&self) {
        if let Some(handle) = self.ticker.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn toggle(&self) {
        if self.is_running() {
            self.pause();
        } else {
            self.resume();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Current collection snapshot.
    pub fn assets(&self) -> Arc<Vec<Asset>> {
        self.assets.lock().unwrap().clone()
    }

    /// Snapshot stream; a new value is published after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Asset>>> {
        self.snapshots.subscribe()
    }

    /// Assets up more than 5% this tick, strongest first. Ties keep
    /// configuration order.
    pub fn gainers(&self) -> Vec<Asset> {
        let mut movers: Vec<Asset> = self
            .assets()
            .iter()
            .filter(|a| a.change_percent > MOVER_THRESHOLD_PCT)
            .cloned()
            .collect();
        movers.sort_by(|a, b| {
            b.change_percent
                .partial_cmp(&a.change_percent)
                .unwrap_or(Ordering::Equal)
        });
        movers
    }

    /// Assets down more than 5% this tick, weakest first.
    pub fn losers(&self) -> Vec<Asset> {
        let mut movers: Vec<Asset> = self
            .assets()
            .iter()
            .filter(|a| a.change_percent < -MOVER_THRESHOLD_PCT)
            .cloned()
            .collect();
        movers.sort_by(|a, b| {
            a.change_percent
                .partial_cmp(&b.change_percent)
                .unwrap_or(Ordering::Equal)
        });
        movers
    }

    pub fn triggered_alerts(&self) -> Vec<Asset> {
        self.assets()
            .iter()
            .filter(|a| a.alert_triggered)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    fn replace_assets(&self, assets: Vec<Asset>) {
        let snapshot = {
            let mut guard = self.assets.lock().unwrap();
            *guard = Arc::new(assets);
            guard.clone()
        };
        self.snapshots.send_replace(snapshot);
    }
}
