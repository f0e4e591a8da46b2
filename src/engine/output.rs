//! Output containers for reconstructed histograms.
//!
//! ## Purpose
//!
//! This module defines [`BinPdf`], the piecewise-constant PDF produced by
//! the binning engine, and [`PlotData`], the render-ready view of a
//! distributional value: bin geometry, plot ranges, and the three
//! special-value masses. A thin adaptor turns plot data into plain
//! rectangle and bar records for a chart layer to consume.
//!
//! ## Design notes
//!
//! * These types store results; they perform no reconstruction themselves.
//! * `PlotData::build` is the one entry point that chains normalization,
//!   binning, and range derivation. A value with no deltas at all is a
//!   caller error; a value whose finite mass vanishes during normalization
//!   is not, and yields empty plot data after a warning.
//! * A single finite delta has no histogram; it is exposed as one
//!   position/mass pair with a unit plot range centred on it.
//! * The adaptor output is pure data. No colors, no scales, no rendering
//!   policy.
//!
//! ## Invariants
//!
//! * For a histogram, `positions` has one more entry than `masses` and
//!   `widths`, and is strictly ascending.
//! * `total_range = max_range - min_range`.
//!
//! ## Visibility
//!
//! [`BinPdf`], [`PlotData`], [`BinRect`], and [`SpecialBars`] are part of
//! the public API.

use core::fmt;

use crate::engine::binning::{get_binning, Binning};
use crate::engine::validator::Validator;
use crate::model::value::DistributionalValue;
use crate::primitives::errors::UxError;

// ============================================================================
// Histogram Container
// ============================================================================

/// A piecewise-constant PDF over a finite support.
#[derive(Debug, Clone, PartialEq)]
pub struct BinPdf {
    /// Bin edges, strictly ascending; one more entry than bins.
    pub boundary_positions: Vec<f64>,

    /// Bin widths; `bin_widths[i]` spans `boundary_positions[i..i+2]`.
    pub bin_widths: Vec<f64>,

    /// Bin heights (probability density), all non-negative.
    pub bin_heights: Vec<f64>,
}

impl BinPdf {
    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bin_heights.len()
    }

    /// True when the PDF has no bins.
    pub fn is_empty(&self) -> bool {
        self.bin_heights.is_empty()
    }

    /// Total probability covered by the bins.
    pub fn integral(&self) -> f64 {
        self.bin_widths
            .iter()
            .zip(&self.bin_heights)
            .map(|(w, h)| w * h)
            .sum()
    }
}

// ============================================================================
// Plot Data
// ============================================================================

/// Render-ready view of a distributional value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotData {
    /// Bin edges for a histogram, or the single delta position.
    pub positions: Vec<f64>,

    /// Bin heights for a histogram, or the single delta mass.
    pub masses: Vec<f64>,

    /// Bin widths; empty for the degenerate cases.
    pub widths: Vec<f64>,

    /// Largest plotted height or mass.
    pub max_value: f64,

    /// Width of the plot range.
    pub total_range: f64,

    /// Left edge of the plot range.
    pub min_range: f64,

    /// Right edge of the plot range.
    pub max_range: f64,

    /// Probability mass at NaN.
    pub nan_mass: f64,

    /// Probability mass at -inf.
    pub neg_inf_mass: f64,

    /// Probability mass at +inf.
    pub pos_inf_mass: f64,
}

impl PlotData {
    /// Normalize `value`, reconstruct its histogram, and derive the plot
    /// geometry.
    ///
    /// `resolution` requests a bin count; it is clamped to twice the
    /// largest power of two at or below `UR_order` and must come out a
    /// power of two. A value with no deltas at all is rejected; a value
    /// whose finite mass vanishes during normalization yields empty plot
    /// data with a warning.
    pub fn build(
        value: &mut DistributionalValue,
        resolution: Option<u32>,
    ) -> Result<PlotData, UxError> {
        Validator::validate_plottable(value)?;

        let binning = get_binning(value, resolution)?;
        let nan_mass = value.nan_delta().mass();
        let neg_inf_mass = value.neg_inf_delta().mass();
        let pos_inf_mass = value.pos_inf_delta().mass();

        let data = match binning {
            Binning::Empty => PlotData {
                positions: Vec::new(),
                masses: Vec::new(),
                widths: Vec::new(),
                max_value: 0.0,
                total_range: 0.0,
                min_range: 0.0,
                max_range: 0.0,
                nan_mass,
                neg_inf_mass,
                pos_inf_mass,
            },
            Binning::SingleDelta { position, mass } => PlotData {
                positions: vec![position],
                masses: vec![mass],
                widths: vec![1.0],
                max_value: mass,
                total_range: 1.0,
                min_range: position - 0.5,
                max_range: position + 0.5,
                nan_mass,
                neg_inf_mass,
                pos_inf_mass,
            },
            Binning::Histogram(pdf) => {
                let min_range = pdf.boundary_positions[0];
                let max_range = pdf.boundary_positions[pdf.boundary_positions.len() - 1];
                let max_value = pdf.bin_heights.iter().copied().fold(0.0, f64::max);
                PlotData {
                    positions: pdf.boundary_positions,
                    masses: pdf.bin_heights,
                    widths: pdf.bin_widths,
                    max_value,
                    total_range: max_range - min_range,
                    min_range,
                    max_range,
                    nan_mass,
                    neg_inf_mass,
                    pos_inf_mass,
                }
            }
        };

        Ok(data)
    }

    /// True when any special-value mass is positive.
    pub fn has_special_masses(&self) -> bool {
        self.nan_mass > 0.0 || self.neg_inf_mass > 0.0 || self.pos_inf_mass > 0.0
    }

    /// The finite-support rectangles a chart layer draws.
    ///
    /// Empty for the degenerate shapes (no bins, or a single delta).
    pub fn rectangles(&self) -> Vec<BinRect> {
        if self.positions.len() != self.masses.len() + 1 {
            return Vec::new();
        }
        self.masses
            .iter()
            .enumerate()
            .map(|(i, &height)| {
                let x0 = self.positions[i];
                let x1 = self.positions[i + 1];
                BinRect {
                    x0,
                    x1,
                    height,
                    area: (x1 - x0) * height,
                }
            })
            .collect()
    }

    /// The three scalar bars for NaN and the infinities.
    pub fn special_bars(&self) -> SpecialBars {
        SpecialBars {
            nan: self.nan_mass,
            neg_inf: self.neg_inf_mass,
            pos_inf: self.pos_inf_mass,
        }
    }
}

/// One histogram rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinRect {
    pub x0: f64,
    pub x1: f64,
    pub height: f64,
    pub area: f64,
}

/// The scalar bars for the three special positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecialBars {
    pub nan: f64,
    pub neg_inf: f64,
    pub pos_inf: f64,
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for PlotData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PlotData:")?;
        writeln!(f, "  Bins: {}", self.masses.len())?;
        writeln!(f, "  Range: [{}, {}]", self.min_range, self.max_range)?;
        writeln!(f, "  Max value: {}", self.max_value)?;
        if self.has_special_masses() {
            writeln!(
                f,
                "  Special masses: nan={} -inf={} +inf={}",
                self.nan_mass, self.neg_inf_mass, self.pos_inf_mass
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
