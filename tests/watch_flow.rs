use std::time::Duration;

use rand::RngCore;
use tokio::time::timeout;

use pricewatch::config::AssetConfig;
use pricewatch::market::store::AssetStore;
use pricewatch::stats::bridge::StatsBridge;
use pricewatch::Settings;

/// Random source pinned to the top of its range: every simulated step moves
/// the price up by (almost exactly) the full volatility factor, giving a
/// deterministic, monotonically rising path.
struct MaxRng;

impl RngCore for MaxRng {
    fn next_u32(&mut self) -> u32 {
        u32::MAX
    }

    fn next_u64(&mut self) -> u64 {
        u64::MAX
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0xFF);
    }
}

fn btc_config() -> AssetConfig {
    AssetConfig {
        id: "btc".to_string(),
        name: "Bitcoin".to_string(),
        symbol: "BTCUSDT".to_string(),
        initial_price: 100.0,
        volatility: 0.05,
        alert_threshold: None,
    }
}

#[test]
fn alert_fires_on_the_first_tick_at_or_above_the_threshold() {
    let store =
        AssetStore::with_rng(&[btc_config()], Settings::default(), Box::new(MaxRng)).unwrap();
    store.set_alert_threshold("btc", Some(110.0));

    // ~105: below the threshold, no alert yet
    store.tick();
    {
        let assets = store.assets();
        assert!(assets[0].price < 110.0, "price {} too high", assets[0].price);
        assert!(!assets[0].alert_triggered);
        assert!(store.triggered_alerts().is_empty());
    }

    // ~110.25: first crossing
    store.tick();
    {
        let assets = store.assets();
        assert!(assets[0].price >= 110.0, "price {} too low", assets[0].price);
        assert!(assets[0].alert_triggered);
        assert_eq!(store.triggered_alerts().len(), 1);
    }

    // ~115.76: stays triggered while above
    store.tick();
    {
        let assets = store.assets();
        assert!(assets[0].price >= 110.0);
        assert!(assets[0].alert_triggered);
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_resume_keeps_a_single_tick_source() {
    let settings = Settings {
        tick_interval: Duration::from_millis(50),
        history_cap: 1_000,
        ..Settings::default()
    };
    let store = AssetStore::with_rng(&[btc_config()], settings, Box::new(MaxRng)).unwrap();

    store.resume();
    store.resume();
    store.resume();
    assert!(store.is_running());

    tokio::time::sleep(Duration::from_millis(500)).await;
    store.pause();
    store.pause();
    assert!(!store.is_running());

    let ticks = store.assets()[0].price_history.len() - 1;
    assert!(
        (5..=15).contains(&ticks),
        "expected ~11 ticks from a single source, got {ticks}"
    );

    // No ticking while paused
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.assets()[0].price_history.len() - 1, ticks);

    // Resuming after a pause restarts exactly one source
    store.resume();
    tokio::time::sleep(Duration::from_millis(200)).await;
    store.pause();
    let after_resume = store.assets()[0].price_history.len() - 1;
    assert!(after_resume > ticks, "ticker should run again after resume");
}

#[tokio::test(start_paused = true)]
async fn toggle_flips_the_ticker_state() {
    let store =
        AssetStore::with_rng(&[btc_config()], Settings::default(), Box::new(MaxRng)).unwrap();
    assert!(!store.is_running());

    store.toggle();
    assert!(store.is_running());

    store.toggle();
    assert!(!store.is_running());
}

#[tokio::test]
async fn stats_flow_from_tick_to_merged_asset() {
    let mut bridge = StatsBridge::initialize();
    let store =
        AssetStore::with_rng(&[btc_config()], Settings::default(), Box::new(MaxRng)).unwrap();
    store.attach_stats(bridge.handle());

    let merge_task = {
        let store = store.clone();
        let mut results = bridge.take_results().unwrap();
        tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                store.merge_stats(&result);
            }
        })
    };

    // Two manual ticks: history reaches three samples and each tick past the
    // first fires a stats request.
    store.tick();
    store.tick();

    let (moving_average, volatility) = timeout(Duration::from_secs(5), async {
        loop {
            let assets = store.assets();
            if let (Some(ma), Some(vol)) = (assets[0].moving_average, assets[0].volatility) {
                break (ma, vol);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stats should be merged back into the store");

    // The rising path starts at 100, so the window mean lands between the
    // endpoints and the spread is positive.
    assert!(moving_average > 100.0 && moving_average < 120.0);
    assert!(volatility > 0.0);

    bridge.shutdown();
    merge_task.abort();
}

#[tokio::test]
async fn disabled_stats_leave_the_market_loop_untouched() {
    let mut bridge = StatsBridge::disabled();
    let store =
        AssetStore::with_rng(&[btc_config()], Settings::default(), Box::new(MaxRng)).unwrap();
    store.attach_stats(bridge.handle());
    assert!(bridge.take_results().is_none());

    store.tick();
    store.tick();

    let assets = store.assets();
    assert_eq!(assets[0].price_history.len(), 3);
    assert!(assets[0].moving_average.is_none());
    assert!(assets[0].volatility.is_none());
}
