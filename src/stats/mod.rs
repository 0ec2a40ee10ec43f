pub mod bridge;
pub mod engine;

use chrono::{DateTime, Utc};

/// A statistics job for one asset. The history is an owned snapshot copy;
/// nothing is shared with the store across the channel boundary.
#[derive(Debug, Clone)]
pub struct StatsRequest {
    pub asset_id: String,
    pub prices: Vec<f64>,
    pub window: usize,
}

/// Outcome of one successful computation, correlated back by asset id.
#[derive(Debug, Clone)]
pub struct StatsResult {
    pub asset_id: String,
    pub moving_average: f64,
    pub volatility: f64,
    pub data_points: usize,
    pub computed_at: DateTime<Utc>,
}

/// Everything the engine sends back. `Ready` and `Error` are control
/// messages the bridge turns into log lines; only `Result` reaches the
/// result stream.
#[derive(Debug, Clone)]
pub enum EngineReply {
    Ready,
    Result(StatsResult),
    Error { asset_id: String, message: String },
}
