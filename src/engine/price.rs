//! Bounded random walk used to move simulated prices.
//!
//! next = prev * (1 + r * vol), r uniform in [-1, 1]
//!
//! The result is clamped to the asset's bounds (when set). A price never
//! reaches zero or goes negative: if clamping leaves it there, the previous
//! price is kept.

use rand::Rng;

use crate::types::{AssetDescriptor, MIN_VOLATILITY};

pub fn effective_volatility(asset: &AssetDescriptor) -> f64 {
    // NaN fails the comparison too.
    if asset.volatility > 0.0 {
        asset.volatility
    } else {
        MIN_VOLATILITY
    }
}

/// Next price using the thread-local RNG.
pub fn next_price(previous: f64, asset: &AssetDescriptor) -> f64 {
    next_price_with(&mut rand::thread_rng(), previous, asset)
}

pub fn next_price_with<R: Rng + ?Sized>(rng: &mut R, previous: f64, asset: &AssetDescriptor) -> f64 {
    let vol = effective_volatility(asset);
    let r: f64 = rng.gen_range(-1.0..=1.0);

    let mut candidate = previous * (1.0 + r * vol);

    if let Some(max) = asset.max_price {
        if candidate > max {
            candidate = max;
        }
    }
    if let Some(min) = asset.min_price {
        if candidate < min {
            candidate = min;
        }
    }

    if !candidate.is_finite() || candidate <= 0.0 {
        return previous;
    }
    candidate
}
