//! Mass-weighted summary statistics over finite deltas.
//!
//! The callers guarantee finite positions; these helpers make no attempt to
//! classify NaN or infinite positions (the model layer owns that ladder).

use crate::primitives::delta::DiracDelta;

/// Total float mass of a delta slice.
pub fn total_mass(deltas: &[DiracDelta]) -> f64 {
    deltas.iter().map(|d| d.mass()).sum()
}

/// Mass-weighted mean position.
///
/// `None` only for an empty slice; a slice whose total mass is zero yields
/// NaN, matching the plain ratio.
pub fn weighted_mean(deltas: &[DiracDelta]) -> Option<f64> {
    if deltas.is_empty() {
        return None;
    }
    let total = total_mass(deltas);
    let first = deltas
        .iter()
        .map(|d| d.position() * d.mass())
        .sum::<f64>();
    Some(first / total)
}

/// Mass-weighted second central moment around `mean`.
pub fn weighted_variance(deltas: &[DiracDelta], mean: f64) -> f64 {
    let total = total_mass(deltas);
    let second = deltas
        .iter()
        .map(|d| {
            let dev = d.position() - mean;
            dev * dev * d.mass()
        })
        .sum::<f64>();
    second / total
}

/// Absolute distance between the weighted means of two delta sets.
///
/// `None` when either set is empty.
pub fn mean_distance(a: &[DiracDelta], b: &[DiracDelta]) -> Option<f64> {
    Some((weighted_mean(a)? - weighted_mean(b)?).abs())
}
