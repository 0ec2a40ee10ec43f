use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::stats::engine;
use crate::stats::{EngineReply, StatsRequest, StatsResult};

/// Sized to absorb a burst of per-asset requests between ticks.
const CHANNEL_BUFFER: usize = 100;

/// Cheap clone handle for firing stats requests. A handle without a sender
/// belongs to a disabled bridge and drops every request.
#[derive(Clone)]
pub struct StatsHandle {
    tx: Option<mpsc::Sender<StatsRequest>>,
}

impl StatsHandle {
    /// Fire-and-forget. A full or closed channel costs this one sample and
    /// a warning; nothing propagates back to the caller.
    pub fn request(&self, asset_id: &str, prices: Vec<f64>, window: usize) {
        let Some(tx) = &self.tx else {
            debug!("stats disabled, dropping request for {}", asset_id);
            return;
        };
        let request = StatsRequest {
            asset_id: asset_id.to_string(),
            prices,
            window,
        };
        if let Err(e) = tx.try_send(request) {
            warn!("stats request for {} dropped: {}", asset_id, e);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

/// Owns the engine task and the router that turns control replies into log
/// lines while forwarding results to the outbound channel.
pub struct StatsBridge {
    handle: StatsHandle,
    results: Option<mpsc::Receiver<StatsResult>>,
    engine: Option<JoinHandle<()>>,
    router: Option<JoinHandle<()>>,
}

impl StatsBridge {
    pub fn initialize() -> Self {
        let (req_tx, req_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (result_tx, result_rx) = mpsc::channel(CHANNEL_BUFFER);

        let engine = tokio::spawn(engine::run_stats_engine(req_rx, reply_tx));
        let router = tokio::spawn(route_replies(reply_rx, result_tx));

        Self {
            handle: StatsHandle { tx: Some(req_tx) },
            results: Some(result_rx),
            engine: Some(engine),
            router: Some(router),
        }
    }

    /// Degraded mode: requests are dropped and no results are ever
    /// produced. The rest of the system runs unchanged.
    pub fn disabled() -> Self {
        Self {
            handle: StatsHandle { tx: None },
            results: None,
            engine: None,
            router: None,
        }
    }

    pub fn handle(&self) -> StatsHandle {
        self.handle.clone()
    }

    /// Takes the single-consumer result stream. Subsequent calls return
    /// `None`; resubscribing means taking a fresh receiver from a fresh
    /// bridge.
    pub fn take_results(&mut self) -> Option<mpsc::Receiver<StatsResult>> {
        self.results.take()
    }

    /// Terminates the computation unit, discarding pending requests with no
    /// reply to their callers. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.handle.tx = None;
        if let Some(task) = self.engine.take() {
            task.abort();
        }
        if let Some(task) = self.router.take() {
            task.abort();
        }
        info!("stats bridge shut down");
    }
}

async fn route_replies(mut rx: mpsc::Receiver<EngineReply>, tx: mpsc::Sender<StatsResult>) {
    while let Some(reply) = rx.recv().await {
        match reply {
            EngineReply::Ready => info!("stats engine ready"),
            EngineReply::Error { asset_id, message } => {
                warn!("stats computation failed for {}: {}", asset_id, message);
            }
            EngineReply::Result(result) => {
                if tx.send(result).await.is_err() {
                    break;
                }
            }
        }
    }
}
