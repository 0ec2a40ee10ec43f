use chrono::Utc;
use log::debug;
use tokio::sync::mpsc;

use crate::stats::{EngineReply, StatsRequest, StatsResult};

/// Fewer samples than this and a request is answered with an error reply.
pub const MIN_SAMPLES: usize = 2;

/// Arithmetic mean of the last `min(window, len)` samples. An empty
/// sequence (or a zero window) yields 0.
pub fn moving_average(prices: &[f64], window: usize) -> f64 {
    if prices.is_empty() || window == 0 {
        return 0.0;
    }
    let take = window.min(prices.len());
    let tail = &prices[prices.len() - take..];
    tail.iter().sum::<f64>() / take as f64
}

/// Population standard deviation (divide by `n`). Fewer than two samples
/// yield 0.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < MIN_SAMPLES {
        return 0.0;
    }
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Stateless computation loop. Lives in its own task; the channel pair is
/// the only way in or out. Every request is self-contained and no history
/// is retained between requests.
pub async fn run_stats_engine(
    mut rx: mpsc::Receiver<StatsRequest>,
    tx: mpsc::Sender<EngineReply>,
) {
    if tx.send(EngineReply::Ready).await.is_err() {
        return;
    }

    while let Some(request) = rx.recv().await {
        if tx.send(handle_request(request)).await.is_err() {
            break;
        }
    }
    debug!("stats engine stopped");
}

fn handle_request(request: StatsRequest) -> EngineReply {
    if request.prices.len() < MIN_SAMPLES {
        return EngineReply::Error {
            asset_id: request.asset_id,
            message: "insufficient price data".to_string(),
        };
    }

    EngineReply::Result(StatsResult {
        moving_average: moving_average(&request.prices, request.window),
        volatility: volatility(&request.prices),
        data_points: request.prices.len(),
        computed_at: Utc::now(),
        asset_id: request.asset_id,
    })
}
