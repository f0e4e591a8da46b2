//! The distributional value container and its normalization pipeline.
//!
//! ## Purpose
//!
//! This module provides [`DistributionalValue`]: an ordered collection of
//! Dirac deltas plus producer metadata, summary statistics, and the cached
//! normalization state the rest of the crate relies on.
//!
//! ## Design notes
//!
//! * The canonical normalization order is `drop_zero_mass` → `sort` →
//!   `combine_dirac_deltas`. Each operation is idempotent on its own.
//! * Three reservoir deltas (NaN, -inf, +inf) are always present as fields.
//!   `sort` re-derives them from the current delta list and materializes
//!   whichever carry positive mass at the tail, in that order. Re-deriving
//!   on every sort keeps `sort ∘ sort = sort`.
//! * Normalization state is cached as tri-state flags (`Option<bool>`,
//!   `None` = not yet checked). Every mutation resets exactly the flags and
//!   scalar caches it can break.
//! * The mean cache doubles as the wire mean: the decoder stores what the
//!   producer wrote so re-encoding reproduces the input byte-for-byte.
//!
//! ## Key concepts
//!
//! ### Summary ladder
//!
//! Any NaN-position mass makes the mean NaN. Mass on both infinities makes
//! it NaN as well. Mass on exactly one infinity pins the mean there. Only a
//! purely finite value gets the mass-weighted mean, and the variance exists
//! only when that mean is finite.
//!
//! ### Full valid TTR
//!
//! A normalized delta set is a full valid k-th-order telescoping-torques
//! representation when every position is finite, the count is `2^k`, and
//! the upward coalescence of the set produces strictly ascending balance
//! points. Such a set is exactly reproducible from a bin PDF.
//!
//! ## Invariants (after full normalization)
//!
//! * No delta has zero mass.
//! * Finite deltas are strictly ascending by position with no duplicates.
//! * At most one delta sits at each of NaN, -inf, +inf, at the tail in
//!   that order.
//!
//! ## Non-goals
//!
//! * No arithmetic between distributional values.
//! * No wire knowledge; the codec layer owns encodings.
//!
//! ## Visibility
//!
//! Part of the public API.

use core::fmt;

use crate::math::{moments, ttr};
use crate::primitives::delta::{total_position_order, DiracDelta};

/// Default relative-to-mean closeness threshold for merging deltas.
pub const DEFAULT_RELATIVE_MEAN_THRESHOLD: f64 = 1e-14;

/// Default relative-to-range closeness threshold for merging deltas.
pub const DEFAULT_RELATIVE_RANGE_THRESHOLD: f64 = 1e-12;

/// A discrete probability measure: weighted points plus metadata.
#[derive(Debug, Clone)]
pub struct DistributionalValue {
    /// Scalar point estimate supplied by the producer.
    particle_value: Option<f64>,

    /// Opaque producer representation tag, carried end-to-end.
    ur_type: u8,

    /// Whether wire positions are 8 bytes (true) or 4 (false).
    double_precision: bool,

    /// The weighted points, specials at the tail once sorted.
    deltas: Vec<DiracDelta>,

    /// Reservoir for mass at NaN.
    nan_delta: DiracDelta,

    /// Reservoir for mass at -inf.
    neg_inf_delta: DiracDelta,

    /// Reservoir for mass at +inf.
    pos_inf_delta: DiracDelta,

    /// Cached mean; outer `None` = not computed, inner `None` = no deltas.
    cached_mean: Option<Option<f64>>,

    /// Cached variance, same convention.
    cached_variance: Option<Option<f64>>,

    has_no_zero_mass: Option<bool>,
    is_finite: Option<bool>,
    is_sorted: Option<bool>,
    is_cured: Option<bool>,
    is_full_valid_ttr: Option<bool>,
}

impl Default for DistributionalValue {
    fn default() -> Self {
        Self::new(None, 0, true)
    }
}

impl DistributionalValue {
    /// Create an empty value.
    pub fn new(particle_value: Option<f64>, ur_type: u8, double_precision: bool) -> Self {
        Self {
            particle_value,
            ur_type,
            double_precision,
            deltas: Vec::new(),
            nan_delta: DiracDelta::new(f64::NAN, 0.0),
            neg_inf_delta: DiracDelta::new(f64::NEG_INFINITY, 0.0),
            pos_inf_delta: DiracDelta::new(f64::INFINITY, 0.0),
            cached_mean: None,
            cached_variance: None,
            has_no_zero_mass: None,
            is_finite: None,
            is_sorted: None,
            is_cured: None,
            is_full_valid_ttr: None,
        }
    }

    /// Create a value from an existing delta list.
    pub fn from_deltas(
        particle_value: Option<f64>,
        ur_type: u8,
        double_precision: bool,
        deltas: Vec<DiracDelta>,
    ) -> Self {
        let mut value = Self::new(particle_value, ur_type, double_precision);
        value.deltas = deltas;
        value
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn particle_value(&self) -> Option<f64> {
        self.particle_value
    }

    pub fn set_particle_value(&mut self, particle_value: Option<f64>) {
        self.particle_value = particle_value;
    }

    pub fn ur_type(&self) -> u8 {
        self.ur_type
    }

    pub fn set_ur_type(&mut self, ur_type: u8) {
        self.ur_type = ur_type;
    }

    pub fn double_precision(&self) -> bool {
        self.double_precision
    }

    pub fn set_double_precision(&mut self, double_precision: bool) {
        self.double_precision = double_precision;
    }

    /// Number of deltas currently held.
    pub fn ur_order(&self) -> usize {
        self.deltas.len()
    }

    pub fn deltas(&self) -> &[DiracDelta] {
        &self.deltas
    }

    /// The reservoir delta at NaN (meaningful after `sort`).
    pub fn nan_delta(&self) -> &DiracDelta {
        &self.nan_delta
    }

    /// The reservoir delta at -inf (meaningful after `sort`).
    pub fn neg_inf_delta(&self) -> &DiracDelta {
        &self.neg_inf_delta
    }

    /// The reservoir delta at +inf (meaningful after `sort`).
    pub fn pos_inf_delta(&self) -> &DiracDelta {
        &self.pos_inf_delta
    }

    /// All positions, in delta order.
    pub fn positions(&self) -> Vec<f64> {
        self.deltas.iter().map(|d| d.position()).collect()
    }

    /// All float masses, in delta order.
    pub fn masses(&self) -> Vec<f64> {
        self.deltas.iter().map(|d| d.mass()).collect()
    }

    /// Total float mass over every delta.
    pub fn total_mass(&self) -> f64 {
        moments::total_mass(&self.deltas)
    }

    /// The finite-position deltas, in delta order.
    pub fn finite_deltas(&self) -> Vec<DiracDelta> {
        self.deltas.iter().filter(|d| d.is_finite()).copied().collect()
    }

    /// True when any delta sits at NaN or an infinity.
    pub fn has_special_values(&self) -> bool {
        self.deltas.iter().any(|d| !d.is_finite())
    }

    /// Append a delta, invalidating all cached state.
    pub fn push_delta(&mut self, delta: DiracDelta) {
        self.deltas.push(delta);
        self.invalidate_all();
    }

    fn invalidate_all(&mut self) {
        self.cached_mean = None;
        self.cached_variance = None;
        self.has_no_zero_mass = None;
        self.is_finite = None;
        self.is_sorted = None;
        self.is_cured = None;
        self.is_full_valid_ttr = None;
    }

    /// Store the producer's wire mean so re-encoding is byte-faithful.
    pub(crate) fn set_cached_mean(&mut self, mean: f64) {
        self.cached_mean = Some(Some(mean));
    }

    // ========================================================================
    // Normalization Pipeline
    // ========================================================================

    /// Remove every delta whose float mass is exactly zero.
    pub fn drop_zero_mass(&mut self) {
        if self.has_no_zero_mass == Some(true) {
            return;
        }
        self.deltas.retain(|d| d.mass() != 0.0);
        self.has_no_zero_mass = Some(true);
        // the count changed, the moments did not
        self.is_full_valid_ttr = None;
    }

    /// Partition, order, and materialize the special tail.
    ///
    /// Finite deltas are sorted ascending. Mass at NaN and the infinities
    /// is pooled into the reservoirs, which are appended in the order
    /// [NaN, -inf, +inf] when positive.
    pub fn sort(&mut self) {
        if self.is_sorted == Some(true) {
            return;
        }

        let mut finite = Vec::with_capacity(self.deltas.len());
        let mut nan_raw = 0u64;
        let mut neg_raw = 0u64;
        let mut pos_raw = 0u64;

        for delta in self.deltas.drain(..) {
            let p = delta.position();
            if p.is_nan() {
                nan_raw = nan_raw.saturating_add(delta.raw_mass());
            } else if p == f64::NEG_INFINITY {
                neg_raw = neg_raw.saturating_add(delta.raw_mass());
            } else if p == f64::INFINITY {
                pos_raw = pos_raw.saturating_add(delta.raw_mass());
            } else {
                finite.push(delta);
            }
        }

        finite.sort_by(total_position_order);

        self.nan_delta = DiracDelta::from_raw(f64::NAN, nan_raw);
        self.neg_inf_delta = DiracDelta::from_raw(f64::NEG_INFINITY, neg_raw);
        self.pos_inf_delta = DiracDelta::from_raw(f64::INFINITY, pos_raw);

        self.deltas = finite;
        for special in [self.nan_delta, self.neg_inf_delta, self.pos_inf_delta] {
            if special.mass() > 0.0 {
                self.deltas.push(special);
            }
        }

        self.is_sorted = Some(true);
        self.is_finite = Some(nan_raw == 0 && neg_raw == 0 && pos_raw == 0);
        // a permutation preserves moments, so the scalar caches stand
    }

    /// Merge finite deltas closer together than a data-derived threshold.
    ///
    /// The threshold is
    /// `max(|finite_mean| * relative_mean, range * relative_range)`; passing
    /// `(0, 0)` merges exact duplicates only. Sorts first when needed, and
    /// re-appends the special tail afterwards.
    pub fn combine_dirac_deltas(&mut self, relative_mean: f64, relative_range: f64) {
        if self.is_sorted != Some(true) {
            self.sort();
        }

        let finite_len = self.deltas.iter().take_while(|d| d.is_finite()).count();
        if finite_len >= 2 {
            let finite = &self.deltas[..finite_len];
            let mean = moments::weighted_mean(finite).unwrap_or(0.0);
            let range = finite[finite_len - 1].position() - finite[0].position();
            let threshold = (mean.abs() * relative_mean).max(range * relative_range);

            let mut merged: Vec<DiracDelta> = Vec::with_capacity(finite_len);
            let mut current = finite[0];
            for next in &finite[1..] {
                if (next.position() - current.position()).abs() <= threshold {
                    current = current.combine(next);
                } else {
                    merged.push(current);
                    current = *next;
                }
            }
            merged.push(current);

            let tail = self.deltas.split_off(finite_len);
            self.deltas = merged;
            self.deltas.extend(tail);
        }

        self.is_cured = Some(true);
        self.cached_mean = None;
        self.cached_variance = None;
        self.is_full_valid_ttr = None;
    }

    /// Merge exact duplicate positions.
    pub fn cure(&mut self) {
        if self.is_cured == Some(true) {
            return;
        }
        self.combine_dirac_deltas(0.0, 0.0);
    }

    // ========================================================================
    // Summary Statistics
    // ========================================================================

    /// The summary mean, `None` only when the value holds no deltas.
    ///
    /// NaN-position mass dominates; two-sided infinite mass is NaN;
    /// one-sided infinite mass pins the mean to that infinity.
    pub fn mean(&mut self) -> Option<f64> {
        if let Some(cached) = self.cached_mean {
            return cached;
        }

        let mean = if self.deltas.is_empty() {
            None
        } else {
            Some(self.compute_mean())
        };
        self.cached_mean = Some(mean);
        mean
    }

    fn compute_mean(&self) -> f64 {
        let mut nan_mass = 0.0;
        let mut neg_mass = 0.0;
        let mut pos_mass = 0.0;
        let mut finite = Vec::with_capacity(self.deltas.len());

        for delta in &self.deltas {
            let p = delta.position();
            if p.is_nan() {
                nan_mass += delta.mass();
            } else if p == f64::NEG_INFINITY {
                neg_mass += delta.mass();
            } else if p == f64::INFINITY {
                pos_mass += delta.mass();
            } else {
                finite.push(*delta);
            }
        }

        if nan_mass > 0.0 {
            f64::NAN
        } else if neg_mass > 0.0 && pos_mass > 0.0 {
            f64::NAN
        } else if neg_mass > 0.0 {
            f64::NEG_INFINITY
        } else if pos_mass > 0.0 {
            f64::INFINITY
        } else {
            moments::weighted_mean(&finite).unwrap_or(f64::NAN)
        }
    }

    /// The mass-weighted second central moment of the finite deltas.
    ///
    /// `None` when the mean is missing or not finite.
    pub fn variance(&mut self) -> Option<f64> {
        if let Some(cached) = self.cached_variance {
            return cached;
        }

        let variance = match self.mean() {
            Some(mean) if mean.is_finite() => {
                let finite = self.finite_deltas();
                Some(moments::weighted_variance(&finite, mean))
            }
            _ => None,
        };
        self.cached_variance = Some(variance);
        variance
    }

    // ========================================================================
    // Validity Checks
    // ========================================================================

    /// Whether every delta position is finite. Cached.
    pub fn check_is_finite(&mut self) -> bool {
        if let Some(cached) = self.is_finite {
            return cached;
        }
        let finite = self.deltas.iter().all(|d| d.position().is_finite());
        self.is_finite = Some(finite);
        finite
    }

    /// Whether the delta list is in normalized order. Cached.
    ///
    /// The finite prefix must be non-decreasing and the tail must be a
    /// subsequence of [NaN, -inf, +inf].
    pub fn check_is_sorted(&mut self) -> bool {
        if let Some(cached) = self.is_sorted {
            return cached;
        }

        let finite_len = self.deltas.iter().take_while(|d| d.position().is_finite()).count();
        let finite_ok = self.deltas[..finite_len]
            .windows(2)
            .all(|w| w[0].position() <= w[1].position());

        let mut rank = 0u8;
        let mut tail_ok = true;
        for delta in &self.deltas[finite_len..] {
            let class = if delta.position().is_nan() {
                1
            } else if delta.position() == f64::NEG_INFINITY {
                2
            } else if delta.position() == f64::INFINITY {
                3
            } else {
                0
            };
            if class == 0 || class <= rank {
                tail_ok = false;
                break;
            }
            rank = class;
        }

        let sorted = finite_ok && tail_ok;
        self.is_sorted = Some(sorted);
        sorted
    }

    /// Whether the normalized set is a full valid `2^k`-point telescoping
    /// torques representation. Cached. Normalizes the receiver first.
    pub fn check_is_full_valid_ttr(&mut self) -> bool {
        if let Some(cached) = self.is_full_valid_ttr {
            return cached;
        }

        self.drop_zero_mass();
        self.cure();

        let valid = self.check_is_finite() && self.coalescence_is_ascending();
        self.is_full_valid_ttr = Some(valid);
        valid
    }

    fn coalescence_is_ascending(&self) -> bool {
        let count = self.deltas.len();
        if count == 0 || !count.is_power_of_two() {
            return false;
        }

        let order = count.trailing_zeros();
        let (mut bp, mut bm) = ttr::layout_even(&self.deltas);
        ttr::telescope(&mut bp, &mut bm, order, 0);
        ttr::is_strictly_ascending(&bp)
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for DistributionalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DistributionalValue:")?;
        writeln!(f, "  UR_type: {}", self.ur_type)?;
        writeln!(f, "  Deltas: {}", self.deltas.len())?;
        if let Some(particle) = self.particle_value {
            writeln!(f, "  Particle: {}", particle)?;
        }
        if let Some(Some(mean)) = self.cached_mean {
            writeln!(f, "  Mean: {}", mean)?;
        }
        if let Some(Some(variance)) = self.cached_variance {
            writeln!(f, "  Variance: {}", variance)?;
        }

        let n = self.deltas.len();
        let show_all = n <= 16;
        let rows: Vec<usize> = if show_all {
            (0..n).collect()
        } else {
            (0..8).chain(n - 8..n).collect()
        };

        writeln!(f, "{:>16} {:>16}", "Position", "Mass")?;
        let mut prev = 0;
        for (i, &idx) in rows.iter().enumerate() {
            if i > 0 && idx != prev + 1 {
                writeln!(f, "{:>16}", "...")?;
            }
            prev = idx;
            let d = &self.deltas[idx];
            writeln!(f, "{:>16.6} {:>16.6}", d.position(), d.mass())?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy mixing finite and special positions with small masses.
    fn point_list() -> impl Strategy<Value = Vec<(f64, f64)>> {
        proptest::collection::vec(
            (
                prop_oneof![
                    4 => -1.0e6_f64..1.0e6,
                    1 => Just(f64::NAN),
                    1 => Just(f64::NEG_INFINITY),
                    1 => Just(f64::INFINITY),
                ],
                0.0_f64..0.1,
            ),
            0..24,
        )
    }

    fn value_of(points: &[(f64, f64)]) -> DistributionalValue {
        let deltas = points.iter().map(|&(p, m)| DiracDelta::new(p, m)).collect();
        DistributionalValue::from_deltas(None, 0, true, deltas)
    }

    fn raw_masses(value: &DistributionalValue) -> Vec<u64> {
        value.deltas().iter().map(|d| d.raw_mass()).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        // --- sort ∘ sort = sort ---
        #[test]
        fn sort_is_idempotent(points in point_list()) {
            let mut v = value_of(&points);
            v.sort();
            let once = (v.positions(), raw_masses(&v));
            v.is_sorted = None;
            v.sort();
            let twice = (v.positions(), raw_masses(&v));
            prop_assert_eq!(format!("{once:?}"), format!("{twice:?}"));
        }

        // --- cure ∘ cure = cure ---
        #[test]
        fn cure_is_idempotent(points in point_list()) {
            let mut v = value_of(&points);
            v.cure();
            let once = (v.positions(), raw_masses(&v));
            v.is_cured = None;
            v.cure();
            let twice = (v.positions(), raw_masses(&v));
            prop_assert_eq!(format!("{once:?}"), format!("{twice:?}"));
        }

        // --- cure ∘ sort = sort ∘ cure ---
        #[test]
        fn cure_commutes_with_sort(points in point_list()) {
            let mut a = value_of(&points);
            a.cure();
            a.sort();
            let mut b = value_of(&points);
            b.sort();
            b.cure();
            prop_assert_eq!(
                format!("{:?}", (a.positions(), raw_masses(&a))),
                format!("{:?}", (b.positions(), raw_masses(&b)))
            );
        }

        // --- normalization invariants hold ---
        #[test]
        fn normalization_invariants(points in point_list()) {
            let mut v = value_of(&points);
            v.drop_zero_mass();
            v.sort();
            v.cure();

            let deltas = v.deltas();
            let finite_len = deltas.iter().take_while(|d| d.is_finite()).count();

            // finite prefix strictly ascending, no duplicates
            for w in deltas[..finite_len].windows(2) {
                prop_assert!(w[0].position() < w[1].position());
            }
            // specials at most once each, tail order [NaN, -inf, +inf]
            let mut rank = 0u8;
            for d in &deltas[finite_len..] {
                let class = if d.position().is_nan() {
                    1
                } else if d.position() == f64::NEG_INFINITY {
                    2
                } else {
                    3
                };
                prop_assert!(class > rank);
                rank = class;
            }
            // no zero masses after dropping (merging only adds mass)
            for d in deltas {
                prop_assert!(d.mass() != 0.0);
            }
        }
    }
}
