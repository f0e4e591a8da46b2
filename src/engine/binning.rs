//! Histogram reconstruction from weighted points.
//!
//! ## Purpose
//!
//! This module turns a finite, sorted delta list into a piecewise-constant
//! PDF whose telescoping-torque representation reproduces the input, and
//! computes the TTR of any bin PDF. It is the computational core of the
//! crate.
//!
//! ## Design notes
//!
//! * A list of `m` deltas occupies a slot array of `2m + 1` boundary
//!   positions: delta `i` sits at slot `2i + 1`, even interior slots are
//!   internal boundaries, slots `0` and `2m` are the extremal boundaries.
//!   The output histogram has `2m` bins.
//! * Internal boundaries come in two modes. The plain mode places each
//!   boundary at the mass-weighted mean of its neighbouring deltas and is
//!   used to seed the reconstruction. The TTR mode telescopes upward so
//!   the binary-tree torque structure of the input is reproduced; slots
//!   the sweep leaves NaN or out of order are repaired with the plain
//!   formula.
//! * Each delta's mass is split across its two straddling bins so their
//!   average height carries the mass and their centre of mass sits exactly
//!   on the delta.
//! * Extremal bin widths first try the boundary condition that zeroes the
//!   second derivative of the height profile across the three end bins.
//!   That condition is a quadratic in the outer width; when it has no
//!   usable positive root, or fewer than 6 deltas are present, the nearest
//!   internal bin width is reflected outward instead (zero first
//!   derivative).
//! * The discriminant test accepts a root only when it is finite and
//!   non-negative. The legacy writer fell back on nearly every input due
//!   to an inverted finiteness test; the corrected condition is used here.
//!
//! ## Execution flow
//!
//! 1. Place deltas in the slot array and fill internal boundaries.
//! 2. Derive internal bin widths from boundary differences.
//! 3. Split each internal delta's mass into its two bins.
//! 4. Solve or reflect the two extremal widths, then split the outermost
//!    masses the same way.
//!
//! The top-level [`get_binning`] wraps the whole reconstruction: normalize,
//! seed with the plain mode, take the TTR at the plotting order, and re-bin
//! in TTR mode.
//!
//! ## Invariants
//!
//! * Boundary positions are strictly ascending on well-formed input.
//! * The histogram integral equals the total input mass up to rounding.
//! * `bin_pdf_to_ttr(create_binning(T, k, true), k)` reproduces a full
//!   valid k-th-order set `T` up to numerical tolerance.
//!
//! ## Non-goals
//!
//! * No continuous density estimation.
//! * No handling of NaN or infinite positions; callers partition those out
//!   (the model's `sort` does).
//!
//! ## Visibility
//!
//! [`create_binning`], [`bin_pdf_to_ttr`], [`get_binning`], and
//! [`Binning`] are part of the public API.

use crate::engine::output::BinPdf;
use crate::engine::validator::Validator;
use crate::math::ttr;
use crate::model::value::{
    DistributionalValue, DEFAULT_RELATIVE_MEAN_THRESHOLD, DEFAULT_RELATIVE_RANGE_THRESHOLD,
};
use crate::primitives::delta::DiracDelta;
use crate::primitives::errors::UxError;

/// Result of the top-level reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Binning {
    /// Normalization left no finite mass.
    Empty,
    /// One finite delta; plotted as a single arrow, not a histogram.
    SingleDelta { position: f64, mass: f64 },
    /// The reconstructed bin PDF.
    Histogram(BinPdf),
}

// ============================================================================
// Boundary Placement
// ============================================================================

/// Fill the internal boundary slots for `deltas`.
///
/// Returns the slot position and mass arrays (`2m + 1` entries, extremal
/// slots still NaN). In TTR mode `exponent` must match `m = 2^exponent`.
pub fn determine_boundary_positions(
    deltas: &[DiracDelta],
    exponent: u32,
    use_ttr_binning: bool,
) -> (Vec<f64>, Vec<f64>) {
    let (mut bp, mut bm) = ttr::layout_odd(deltas);
    let last_internal = bp.len() - 1;

    if use_ttr_binning {
        ttr::telescope(&mut bp, &mut bm, exponent, 1);

        // repair slots the sweep missed or pushed out of order
        for i in (2..last_internal).step_by(2) {
            let ordered = bp[i - 1] < bp[i] && bp[i] < bp[i + 1];
            if bp[i].is_nan() || !ordered {
                let (p, m) = ttr::torque_merge(bp[i - 1], bm[i - 1], bp[i + 1], bm[i + 1]);
                bp[i] = p;
                bm[i] = m;
            }
        }
    } else {
        for i in (2..last_internal).step_by(2) {
            let (p, m) = ttr::torque_merge(bp[i - 1], bm[i - 1], bp[i + 1], bm[i + 1]);
            bp[i] = p;
            bm[i] = m;
        }
    }

    (bp, bm)
}

/// Solve the zero-second-derivative condition for one extremal width.
///
/// `outer_mass` is the outermost delta's mass, `w1`/`w2` the adjacent and
/// second internal bin widths, `d2` the second-neighbour bin height. Picks
/// the smaller positive root; `None` means the condition is unusable and
/// the caller reflects `w1` instead.
fn extremal_width(outer_mass: f64, w1: f64, w2: f64, d2: f64) -> Option<f64> {
    let a = d2 * w1 - outer_mass;
    let b = a * w1 - outer_mass * w2;
    let c = outer_mass * w1 * (w1 + w2);

    let det = b * b - 4.0 * a * c;
    if !det.is_finite() || det < 0.0 {
        return None;
    }

    let sqrt_det = det.sqrt();
    let candidates = [(-b + sqrt_det) / (2.0 * a), (-b - sqrt_det) / (2.0 * a)];
    candidates
        .into_iter()
        .filter(|r| r.is_finite() && *r > 0.0)
        .reduce(f64::min)
}

/// Place the extremal boundaries and split the outermost masses.
///
/// Requires the internal widths and internal-delta heights to be in place.
pub fn handle_extremal_bins(
    bp: &mut [f64],
    widths: &mut [f64],
    heights: &mut [f64],
    deltas: &[DiracDelta],
) {
    let m = deltas.len();
    let bins = 2 * m;

    // left end
    let left_mass = deltas[0].mass();
    let w1 = widths[1];
    let w0 = if m >= 6 {
        extremal_width(left_mass, w1, widths[2], heights[2])
    } else {
        None
    }
    .unwrap_or(w1);
    widths[0] = w0;
    bp[0] = bp[1] - w0;
    let avg_h = left_mass / (w0 + w1);
    heights[0] = avg_h * w1 / w0;
    heights[1] = avg_h * w0 / w1;

    // right end
    let right_mass = deltas[m - 1].mass();
    let w1 = widths[bins - 2];
    let w_last = if m >= 6 {
        extremal_width(right_mass, w1, widths[bins - 3], heights[bins - 3])
    } else {
        None
    }
    .unwrap_or(w1);
    widths[bins - 1] = w_last;
    bp[bins] = bp[bins - 1] + w_last;
    let avg_h = right_mass / (w1 + w_last);
    heights[bins - 2] = avg_h * w_last / w1;
    heights[bins - 1] = avg_h * w1 / w_last;
}

// ============================================================================
// Histogram Construction
// ============================================================================

/// Build the bin PDF of a finite, sorted delta list.
///
/// `exponent` and `use_ttr_binning` select the internal boundary mode; at
/// least two deltas are required.
pub fn create_binning(
    deltas: &[DiracDelta],
    exponent: u32,
    use_ttr_binning: bool,
) -> Result<BinPdf, UxError> {
    let m = deltas.len();
    if m < 2 {
        return Err(UxError::EmptyValue);
    }

    let (mut bp, _bm) = determine_boundary_positions(deltas, exponent, use_ttr_binning);
    let bins = 2 * m;
    let mut widths = vec![f64::NAN; bins];
    let mut heights = vec![0.0; bins];

    // internal bin widths from boundary differences
    for j in 1..bins - 1 {
        widths[j] = bp[j + 1] - bp[j];
    }

    // split each internal delta's mass across its straddling bins
    for (i, delta) in deltas.iter().enumerate().take(m - 1).skip(1) {
        let lo = 2 * i;
        let hi = lo + 1;
        let avg_h = delta.mass() / (widths[lo] + widths[hi]);
        heights[lo] = avg_h * widths[hi] / widths[lo];
        heights[hi] = avg_h * widths[lo] / widths[hi];
    }

    handle_extremal_bins(&mut bp, &mut widths, &mut heights, deltas);

    Ok(BinPdf {
        boundary_positions: bp,
        bin_widths: widths,
        bin_heights: heights,
    })
}

// ============================================================================
// TTR of a Bin PDF
// ============================================================================

/// Compute the `order`-th telescoping-torque representation of a bin PDF.
///
/// Returns `2^order` deltas in ascending position order.
pub fn bin_pdf_to_ttr(pdf: &BinPdf, order: u32) -> Vec<DiracDelta> {
    let mut out = Vec::with_capacity(1 << order);
    ttr_recurse(&pdf.boundary_positions, &pdf.bin_heights, order, &mut out);
    out
}

/// Expected delta of a histogram slice: total mass at the centre of mass.
fn expected_delta(bounds: &[f64], heights: &[f64]) -> (f64, f64) {
    let mut total = 0.0;
    let mut first_moment = 0.0;
    for (j, &h) in heights.iter().enumerate() {
        let w = bounds[j + 1] - bounds[j];
        let mid = 0.5 * (bounds[j] + bounds[j + 1]);
        total += w * h;
        first_moment += w * h * mid;
    }
    (first_moment / total, total)
}

fn ttr_recurse(bounds: &[f64], heights: &[f64], order: u32, out: &mut Vec<DiracDelta>) {
    let (position, mass) = expected_delta(bounds, heights);
    if order == 0 {
        out.push(DiracDelta::new(position, mass));
        return;
    }

    let n = heights.len();

    // split exactly on an interior boundary when the centre of mass lands
    // on one
    if let Some(j) = (1..n).find(|&j| bounds[j] == position) {
        ttr_recurse(&bounds[..=j], &heights[..j], order - 1, out);
        ttr_recurse(&bounds[j..], &heights[j..], order - 1, out);
        return;
    }

    // otherwise insert the centre of mass as a new boundary inside bin i-1
    let i = match bounds.iter().position(|&b| b > position) {
        Some(i) if i > 0 => i,
        _ => {
            // degenerate slice (zero mass or collapsed support)
            out.push(DiracDelta::new(position, mass));
            return;
        }
    };

    let mut left_bounds = bounds[..i].to_vec();
    left_bounds.push(position);
    let left_heights = &heights[..i];

    let mut right_bounds = Vec::with_capacity(bounds.len() - i + 1);
    right_bounds.push(position);
    right_bounds.extend_from_slice(&bounds[i..]);
    let mut right_heights = Vec::with_capacity(n - i + 1);
    right_heights.push(heights[i - 1]);
    right_heights.extend_from_slice(&heights[i..]);

    ttr_recurse(&left_bounds, left_heights, order - 1, out);
    ttr_recurse(&right_bounds, &right_heights, order - 1, out);
}

// ============================================================================
// Top-Level Reconstruction
// ============================================================================

/// Normalize a value and reconstruct its plotting histogram.
///
/// The effective resolution is the requested one clamped to twice the
/// largest power of two at or below `UR_order`, and must be a power of
/// two.
pub fn get_binning(
    value: &mut DistributionalValue,
    resolution: Option<u32>,
) -> Result<Binning, UxError> {
    value.drop_zero_mass();
    value.combine_dirac_deltas(
        DEFAULT_RELATIVE_MEAN_THRESHOLD,
        DEFAULT_RELATIVE_RANGE_THRESHOLD,
    );

    let finite = value.finite_deltas();
    match finite.len() {
        0 => {
            tracing::warn!("no finite mass left after normalization; nothing to bin");
            return Ok(Binning::Empty);
        }
        1 => {
            return Ok(Binning::SingleDelta {
                position: finite[0].position(),
                mass: finite[0].mass(),
            });
        }
        _ => {}
    }

    let machine_representation = 1u32 << (value.ur_order() as u32).ilog2();
    let default_resolution = 2 * machine_representation;
    let effective = resolution
        .map(|r| r.min(default_resolution))
        .unwrap_or(default_resolution);
    Validator::validate_resolution(effective)?;
    let plotting_ttr_order = effective.ilog2().saturating_sub(1);

    let seed = create_binning(&finite, 0, false)?;
    let ttr_deltas = bin_pdf_to_ttr(&seed, plotting_ttr_order);
    let binned = create_binning(&ttr_deltas, plotting_ttr_order, true)?;
    Ok(Binning::Histogram(binned))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn deltas(points: &[(f64, f64)]) -> Vec<DiracDelta> {
        points.iter().map(|&(p, m)| DiracDelta::new(p, m)).collect()
    }

    fn integral(pdf: &BinPdf) -> f64 {
        pdf.bin_widths
            .iter()
            .zip(&pdf.bin_heights)
            .map(|(w, h)| w * h)
            .sum()
    }

    #[test]
    fn plain_mode_three_deltas_matches_hand_computation() {
        let ds = deltas(&[(0.0, 0.5), (1.0, 0.25), (3.0, 0.25)]);
        let pdf = create_binning(&ds, 0, false).unwrap();

        let expected_bounds = [-1.0 / 3.0, 0.0, 1.0 / 3.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(pdf.boundary_positions.len(), 7);
        for (got, want) in pdf.boundary_positions.iter().zip(expected_bounds) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);

        // inner boundaries are the mass-weighted means of adjacent deltas
        assert_relative_eq!(pdf.boundary_positions[2], 0.25 / 0.75, epsilon = 1e-12);
        assert_relative_eq!(pdf.boundary_positions[4], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn mass_split_centres_each_internal_delta() {
        let ds = deltas(&[(0.0, 0.5), (1.0, 0.25), (3.0, 0.25)]);
        let pdf = create_binning(&ds, 0, false).unwrap();

        // bins 2 and 3 straddle the delta at 1.0 with mass 0.25
        let lo_mass = pdf.bin_widths[2] * pdf.bin_heights[2];
        let hi_mass = pdf.bin_widths[3] * pdf.bin_heights[3];
        assert_relative_eq!(lo_mass + hi_mass, 0.25, epsilon = 1e-12);

        let lo_mid = 0.5 * (pdf.boundary_positions[2] + pdf.boundary_positions[3]);
        let hi_mid = 0.5 * (pdf.boundary_positions[3] + pdf.boundary_positions[4]);
        let centre = (lo_mass * lo_mid + hi_mass * hi_mid) / (lo_mass + hi_mass);
        assert_relative_eq!(centre, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ttr_mode_reproduces_a_valid_second_order_set() {
        let ds = deltas(&[(-1.0, 0.25), (0.0, 0.25), (1.0, 0.25), (2.0, 0.25)]);
        let pdf = create_binning(&ds, 2, true).unwrap();
        assert_eq!(pdf.bin_heights.len(), 8);
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));

        let reproduced = bin_pdf_to_ttr(&pdf, 2);
        assert_eq!(reproduced.len(), 4);
        for (got, want) in reproduced.iter().zip(&ds) {
            assert_relative_eq!(got.position(), want.position(), epsilon = 1e-12);
            assert_relative_eq!(got.mass(), want.mass(), epsilon = 1e-12);
        }
    }

    #[test]
    fn ttr_round_trip_with_uneven_masses() {
        // a full valid set: the telescoped balance points stay ascending
        let ds = deltas(&[(0.0, 0.2), (1.0, 0.3), (2.0, 0.3), (4.0, 0.2)]);
        let pdf = create_binning(&ds, 2, true).unwrap();
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);

        let reproduced = bin_pdf_to_ttr(&pdf, 2);
        for (got, want) in reproduced.iter().zip(&ds) {
            assert_relative_eq!(got.position(), want.position(), epsilon = 1e-9);
            assert_relative_eq!(got.mass(), want.mass(), epsilon = 1e-9);
        }
    }

    #[test]
    fn repair_pass_restores_boundary_order() {
        // the top-level torque of this set lands outside its bracketing
        // deltas, so the sweep result must be repaired
        let ds = deltas(&[(0.0, 0.001), (1.0, 0.001), (2.0, 0.9), (100.0, 0.098)]);
        let pdf = create_binning(&ds, 2, true).unwrap();
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn two_deltas_produce_four_bins() {
        let ds = deltas(&[(0.0, 0.5), (1.0, 0.5)]);
        let pdf = create_binning(&ds, 1, true).unwrap();
        assert_eq!(pdf.bin_heights.len(), 4);
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn quadratic_end_condition_engages_with_six_deltas() {
        // heavy outer masses make the end quadratic solvable, so the
        // extremal width differs from the plain reflection
        let ds = deltas(&[
            (0.0, 0.3),
            (1.0, 0.1),
            (2.0, 0.1),
            (3.0, 0.1),
            (4.0, 0.1),
            (5.0, 0.3),
        ]);
        let pdf = create_binning(&ds, 0, false).unwrap();
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);
        assert!(pdf.bin_heights.iter().all(|h| *h >= 0.0));
        assert!((pdf.bin_widths[0] - pdf.bin_widths[1]).abs() > 1e-6);
    }

    #[test]
    fn light_outer_masses_fall_back_to_reflection() {
        let ds = deltas(&[
            (0.0, 0.1),
            (1.0, 0.2),
            (2.0, 0.2),
            (3.0, 0.2),
            (4.0, 0.2),
            (5.0, 0.1),
        ]);
        let pdf = create_binning(&ds, 0, false).unwrap();
        assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
        assert_relative_eq!(pdf.bin_widths[0], pdf.bin_widths[1], epsilon = 1e-12);
        assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn single_delta_is_not_binnable() {
        let ds = deltas(&[(0.0, 1.0)]);
        assert!(matches!(
            create_binning(&ds, 0, false),
            Err(UxError::EmptyValue)
        ));
    }

    #[test]
    fn bin_pdf_to_ttr_order_zero_is_the_expected_delta() {
        let pdf = BinPdf {
            boundary_positions: vec![0.0, 1.0, 2.0],
            bin_widths: vec![1.0, 1.0],
            bin_heights: vec![0.75, 0.25],
        };
        let ttr = bin_pdf_to_ttr(&pdf, 0);
        assert_eq!(ttr.len(), 1);
        assert_relative_eq!(ttr[0].mass(), 1.0);
        assert_relative_eq!(ttr[0].position(), 0.75 * 0.5 + 0.25 * 1.5);
    }

    #[test]
    fn reconstruction_resolution_is_clamped() {
        let points: Vec<(f64, f64)> = (0..8).map(|i| (i as f64, 0.125)).collect();
        let mut value = DistributionalValue::from_deltas(None, 0, true, deltas(&points));

        match get_binning(&mut value, Some(64)).unwrap() {
            Binning::Histogram(pdf) => {
                // min(64, 2 * 8) = 16 bins, so 17 boundaries
                assert_eq!(pdf.bin_heights.len(), 16);
                assert_eq!(pdf.boundary_positions.len(), 17);
                assert!(ttr::is_strictly_ascending(&pdf.boundary_positions));
                assert_relative_eq!(integral(&pdf), 1.0, epsilon = 1e-12);
            }
            other => panic!("expected a histogram, got {other:?}"),
        }
    }

    #[test]
    fn reconstruction_rejects_odd_resolutions() {
        let points: Vec<(f64, f64)> = (0..8).map(|i| (i as f64, 0.125)).collect();
        let mut value = DistributionalValue::from_deltas(None, 0, true, deltas(&points));
        assert!(matches!(
            get_binning(&mut value, Some(12)),
            Err(UxError::ResolutionNotPowerOfTwo { got: 12 })
        ));
    }

    #[test]
    fn reconstruction_of_special_only_values_is_empty() {
        let mut value = DistributionalValue::from_deltas(
            None,
            0,
            true,
            deltas(&[(f64::NAN, 0.5), (f64::INFINITY, 0.5)]),
        );
        assert_eq!(get_binning(&mut value, None).unwrap(), Binning::Empty);
    }

    #[test]
    fn reconstruction_of_one_finite_delta_is_an_arrow() {
        let mut value =
            DistributionalValue::from_deltas(None, 0, true, deltas(&[(2.5, 1.0)]));
        assert_eq!(
            get_binning(&mut value, None).unwrap(),
            Binning::SingleDelta {
                position: 2.5,
                mass: 1.0
            }
        );
    }
}
