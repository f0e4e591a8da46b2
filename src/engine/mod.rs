//! Layer 5: Engine
//!
//! Histogram reconstruction and plot-ready output.
//!
//! # Module Organization
//!
//! - **validator**: Fail-fast checks for plot construction
//! - **binning**: TTR ↔ histogram reconstruction
//! - **output**: `BinPdf`, `PlotData`, and the chart adaptor shapes

/// Plot-side validation checks.
pub mod validator;

/// Boundary placement, extremal bins, and the TTR of a bin PDF.
pub mod binning;

/// Output containers and the chart adaptor.
pub mod output;
