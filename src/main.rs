use env_logger::Builder;
use log::{info, LevelFilter};
use std::collections::HashSet;
use std::error::Error;
use std::io::Write;

use pricewatch::config;
use pricewatch::market::store::AssetStore;
use pricewatch::stats::bridge::StatsBridge;
use pricewatch::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Configure logger
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("pricewatch", LevelFilter::Debug)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .write_style(env_logger::WriteStyle::Always)
        .init();

    info!("Starting Pricewatch...");

    let settings = Settings::from_env()?;
    let configs = config::load_assets()?;
    info!(
        "Watching {} instruments, tick every {:?}",
        configs.len(),
        settings.tick_interval
    );

    let mut bridge = if settings.stats_enabled {
        StatsBridge::initialize()
    } else {
        info!("Statistics disabled by configuration");
        StatsBridge::disabled()
    };

    let store = AssetStore::initialize(&configs, settings)?;
    store.attach_stats(bridge.handle());

    // Merge computed statistics back into the store as results arrive
    let merge_handle = {
        let store = store.clone();
        let results = bridge.take_results();
        tokio::spawn(async move {
            match results {
                Some(mut results) => {
                    while let Some(result) = results.recv().await {
                        log::debug!(
                            "Stats for {}: ma={:.4} vol={:.4} (n={})",
                            result.asset_id,
                            result.moving_average,
                            result.volatility,
                            result.data_points
                        );
                        store.merge_stats(&result);
                    }
                }
                // Disabled mode: nothing ever arrives, park the task so the
                // shutdown select below stays armed.
                None => std::future::pending::<()>().await,
            }
        })
    };

    // Watch snapshots and log alert transitions
    let alert_handle = {
        let mut snapshots = store.subscribe();
        tokio::spawn(async move {
            let mut triggered: HashSet<String> = HashSet::new();
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                for asset in snapshot.iter() {
                    if asset.alert_triggered && triggered.insert(asset.id.clone()) {
                        info!(
                            "ALERT: {} reached {} (threshold: {})",
                            asset.symbol,
                            asset.price,
                            asset.alert_threshold.unwrap_or_default()
                        );
                    } else if !asset.alert_triggered && triggered.remove(&asset.id) {
                        info!("Alert cleared for {}", asset.symbol);
                    }
                }
            }
        })
    };

    store.resume();

    tokio::select! {
        _ = merge_handle => {},
        _ = alert_handle => {},
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    };

    store.pause();
    bridge.shutdown();

    info!("Shutdown complete");
    Ok(())
}
