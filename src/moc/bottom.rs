//! Bottom topography envelopes for the MOC plot.
//!
//! For every latitude bin the deepest sea floor touching the bin (`botmax`)
//! and a smoothed near-maximum envelope (`botnice`) are derived from the
//! per-location bottom level indices. Bins without any location are marked
//! NaN so the renderer can blank them instead of drawing a zero floor.

use std::collections::BTreeMap;

/// Quantile used for the `botnice` envelope: excludes the deepest 20% of
/// floors in a bin. A smoothing heuristic, not a load-bearing choice.
pub const BOTTOM_QUANTILE: f64 = 0.80;

const SMOOTH_KERNEL: [f64; 3] = [1.0, 2.0, 1.0];

/// Per-bin maximum and smoothed 80th-percentile bottom depth.
///
/// `bins` maps the engine's integer bin key to the output column, sorted by
/// latitude. `mask` holds the basin location indices; `lat` and
/// `bottom_index` cover the full location set.
pub fn estimate_bottom(
    depth: &[f64],
    bottom_index: &[usize],
    lat: &[f64],
    mask: &[usize],
    dlat: f64,
    bins: &BTreeMap<i64, usize>,
) -> (Vec<f64>, Vec<f64>) {
    let nbins = bins.len();
    let mut per_bin: Vec<Vec<f64>> = vec![Vec::new(); nbins];

    for &loc in mask {
        if let Some(&col) = bins.get(&super::bin_key(lat[loc], dlat)) {
            per_bin[col].push(depth[bottom_index[loc]]);
        }
    }

    let mut botmax = vec![f64::NAN; nbins];
    let mut botnice = vec![f64::NAN; nbins];
    for (col, depths) in per_bin.iter_mut().enumerate() {
        if depths.is_empty() {
            continue;
        }
        depths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        botmax[col] = *depths.last().unwrap_or(&f64::NAN);
        botnice[col] = quantile_sorted(depths, BOTTOM_QUANTILE);
    }

    let botnice = smooth_121(&botnice);
    (botmax, botnice)
}

/// Linear-interpolated quantile of an ascending-sorted slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// 1:2:1 smoothing along the bin axis with edge-replication padding, so the
/// output keeps the input length and a constant signal passes unchanged.
/// NaN bins stay NaN; finite neighbors of a NaN bin renormalize over the
/// taps that carry data.
fn smooth_121(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let half = SMOOTH_KERNEL.len() / 2;
    let mut padded = Vec::with_capacity(n + 2 * half);
    for _ in 0..half {
        padded.push(values[0]);
    }
    padded.extend_from_slice(values);
    for _ in 0..half {
        padded.push(values[n - 1]);
    }

    let mut out = vec![f64::NAN; n];
    for i in 0..n {
        if values[i].is_nan() {
            continue;
        }
        let mut sum = 0.0;
        let mut weight = 0.0;
        for (k, &w) in SMOOTH_KERNEL.iter().enumerate() {
            let v = padded[i + k];
            if !v.is_nan() {
                sum += w * v;
                weight += w;
            }
        }
        out[i] = sum / weight;
    }
    out
}
