use rand::Rng;

/// Draws a uniform perturbation in `[-volatility_factor, +volatility_factor]`
/// and applies it multiplicatively to the current price.
///
/// The random source is passed in by the caller, so deterministic generators
/// can drive reproducible price paths in tests.
pub fn simulate_next_price<R: Rng + ?Sized>(
    rng: &mut R,
    current: f64,
    volatility_factor: f64,
) -> f64 {
    let delta = rng.random_range(-volatility_factor..=volatility_factor);
    round_to(current * (1.0 + delta), 4)
}

/// Signed percent change between two prices. A zero previous price yields 0
/// rather than dividing by zero.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    round_to((current - previous) / previous * 100.0, 2)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
