//! Core of a simulated real-time price watch: a bounded time-series store
//! over a fixed instrument list, a periodic price ticker, threshold alerts,
//! and a statistics engine running in its own task behind message channels.

pub mod config;
pub mod error;
pub mod market;
pub mod stats;

pub use config::{AssetConfig, Settings};
pub use error::PriceWatchError;
pub use market::store::{Asset, AssetStore};
pub use stats::bridge::{StatsBridge, StatsHandle};
pub use stats::{StatsRequest, StatsResult};
