//! Synthetic bin distributions for when no upstream data is available

use crate::types::{sort_bins, BinPoint};

/// Center price used when no reference price is known
pub const DEFAULT_CENTER_PRICE: f64 = 100.0;
/// Liquidity at the center bin
pub const PEAK_LIQUIDITY: f64 = 100.0;

/// Shape of a generated distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticConfig {
    /// Percent price increase per bin (e.g., 1.0 for 1%)
    pub bin_step_percent: f64,
    /// Number of bins; even counts are widened by one to stay symmetric
    pub bin_count: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bin_step_percent: 1.0,
            bin_count: 41,
        }
    }
}

impl SyntheticConfig {
    /// Window of `radius` bins on either side of the center
    pub fn for_radius(bin_step_percent: f64, radius: u32) -> Self {
        Self {
            bin_step_percent,
            bin_count: radius as usize * 2 + 1,
        }
    }
}

/// Generate a bell-shaped distribution centered on `center_price`.
///
/// Prices are spaced geometrically: offset `i` sits at
/// `center * (1 + step/100)^i`. Liquidity follows a Gaussian scaled to
/// [`PEAK_LIQUIDITY`] and rounded, so it is symmetric around the center and
/// non-increasing toward the edges. Output is deterministic and sorted.
pub fn generate_bins(center_price: f64, config: &SyntheticConfig) -> Vec<BinPoint> {
    let center = if center_price.is_finite() && center_price > 0.0 {
        center_price
    } else {
        DEFAULT_CENTER_PRICE
    };
    let step = if config.bin_step_percent.is_finite() && config.bin_step_percent > 0.0 {
        config.bin_step_percent
    } else {
        SyntheticConfig::default().bin_step_percent
    };

    let half = (config.bin_count.max(1) / 2) as i32;
    let sigma = (half as f64 / 2.5).max(1.0);
    let ratio = 1.0 + step / 100.0;

    let mut bins: Vec<BinPoint> = (-half..=half)
        .filter_map(|i| {
            let price = center * ratio.powi(i);
            let weight = (-((i * i) as f64) / (2.0 * sigma * sigma)).exp();
            BinPoint::new(price, (PEAK_LIQUIDITY * weight).round())
        })
        .collect();

    sort_bins(&mut bins);
    bins
}
