//! Weighted point masses on the extended real line.
//!
//! ## Purpose
//!
//! This module provides [`DiracDelta`], the atom of a distributional value:
//! a position (any IEEE-754 double, including NaN and the infinities) and a
//! non-negative probability mass kept in two synchronized forms.
//!
//! ## Design notes
//!
//! * The fixed-point `raw_mass` (Q0.63, [`FIXED_POINT_ONE`] = unit
//!   probability) is the authoritative wire form; the `f64` mirror exists
//!   for arithmetic. Setting either form updates the other.
//! * Setting the float mass to NaN forces `raw_mass` to 0; the float mirror
//!   keeps the NaN so callers can observe what they stored.
//! * Comparison and equality are defined on `position` alone, with raw IEEE
//!   semantics. Sorts must partition non-finite positions out first; the
//!   [`total_position_order`] comparator does exactly that.
//! * `combine` returns a new value rather than mutating either operand.
//!
//! ## Visibility
//!
//! Part of the public API.

use core::cmp::Ordering;

/// Fixed-point probability scale: this raw mass means probability 1.
pub const FIXED_POINT_ONE: u64 = 1 << 63;

/// `FIXED_POINT_ONE` as an `f64` factor.
const FIXED_POINT_ONE_F: f64 = FIXED_POINT_ONE as f64;

/// One weighted point: a position and a probability mass.
#[derive(Debug, Clone, Copy)]
pub struct DiracDelta {
    position: f64,
    raw_mass: u64,
    mass: f64,
}

impl DiracDelta {
    /// Build from a position and a float mass.
    pub fn new(position: f64, mass: f64) -> Self {
        let mut delta = Self {
            position,
            raw_mass: 0,
            mass: 0.0,
        };
        delta.set_mass(mass);
        delta
    }

    /// Build from a position and an authoritative fixed-point mass.
    pub fn from_raw(position: f64, raw_mass: u64) -> Self {
        Self {
            position,
            raw_mass,
            mass: raw_mass as f64 / FIXED_POINT_ONE_F,
        }
    }

    /// Position on the extended real line.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Probability mass as a float.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Probability mass in fixed-point Q0.63.
    pub fn raw_mass(&self) -> u64 {
        self.raw_mass
    }

    /// True when the position is an ordinary finite number.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
    }

    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// Set the float mass, resynchronizing the fixed-point form.
    ///
    /// NaN and negative masses carry no fixed-point weight.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.raw_mass = if mass.is_nan() || mass <= 0.0 {
            0
        } else {
            let scaled = mass * FIXED_POINT_ONE_F;
            if scaled >= u64::MAX as f64 {
                u64::MAX
            } else {
                scaled.round() as u64
            }
        };
    }

    /// Set the fixed-point mass, resynchronizing the float mirror.
    pub fn set_raw_mass(&mut self, raw_mass: u64) {
        self.raw_mass = raw_mass;
        self.mass = raw_mass as f64 / FIXED_POINT_ONE_F;
    }

    /// Mass-weighted merge of two deltas.
    ///
    /// The result carries the summed mass at the mass-weighted mean
    /// position. Only meaningful when at least one operand has positive
    /// mass; two zero-mass operands produce a NaN position.
    pub fn combine(&self, other: &DiracDelta) -> DiracDelta {
        let total = self.mass + other.mass;
        let position = (self.position * self.mass + other.position * other.mass) / total;
        DiracDelta {
            position,
            raw_mass: self.raw_mass.saturating_add(other.raw_mass),
            mass: total,
        }
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Position-keyed comparison shared by everything that orders deltas.
pub trait PositionOrd {
    /// The ordering key.
    fn position_key(&self) -> f64;

    /// Raw IEEE comparison on positions; `None` when either is NaN.
    fn cmp_position(&self, other: &Self) -> Option<Ordering> {
        self.position_key().partial_cmp(&other.position_key())
    }

    /// Position equality with IEEE semantics (NaN is equal to nothing).
    fn eq_position(&self, other: &Self) -> bool {
        self.position_key() == other.position_key()
    }

    /// Strict position order with IEEE semantics.
    fn lt_position(&self, other: &Self) -> bool {
        self.position_key() < other.position_key()
    }
}

impl PositionOrd for DiracDelta {
    fn position_key(&self) -> f64 {
        self.position
    }
}

impl PartialEq for DiracDelta {
    fn eq(&self, other: &Self) -> bool {
        self.eq_position(other)
    }
}

impl PartialOrd for DiracDelta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.cmp_position(other)
    }
}

/// Total order for sorting: finite positions ascending, non-finite after
/// them in their encounter order.
///
/// Callers that need the [NaN, -inf, +inf] tail discipline partition the
/// classes out before sorting; this comparator only has to keep the finite
/// segment correct and the pass stable.
pub fn total_position_order(a: &DiracDelta, b: &DiracDelta) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => a.cmp_position(b).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

// ============================================================================
// Tests
// ============================================================================
