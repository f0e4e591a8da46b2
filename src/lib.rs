//! Decode, normalize, and re-binify distributional values.
//!
//! ## Purpose
//!
//! A distributional value is a discrete probability measure: weighted
//! points on the extended real line (finite positions plus NaN and the
//! infinities), a scalar particle estimate, and producer metadata. This
//! crate reads and writes the two Ux wire encodings of such values,
//! maintains their normalization invariants, and reconstructs a
//! piecewise-constant histogram consistent with the points under the
//! telescoping-torques moment reduction.
//!
//! ## Quick start
//!
//! ```
//! use uxdist::prelude::*;
//!
//! let mut value = DistributionalValue::from_deltas(
//!     Some(1.5),
//!     0,
//!     true,
//!     vec![
//!         DiracDelta::from_raw(1.0, FIXED_POINT_ONE / 2),
//!         DiracDelta::from_raw(2.0, FIXED_POINT_ONE / 2),
//!     ],
//! );
//!
//! // round-trip through the string wire form
//! let text = match encode(&mut value, true).unwrap() {
//!     UxOutput::Text(text) => text,
//!     _ => unreachable!(),
//! };
//! let mut decoded = decode(text.as_str(), true).unwrap();
//! assert_eq!(decoded.ur_order(), 2);
//!
//! // reconstruct the plotting histogram
//! let plot = PlotData::build(&mut decoded, None).unwrap();
//! assert!(plot.positions.len() > plot.masses.len());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Layer 6: API (decode, encode, PlotData)
//!   ↓
//! Layer 5: Engine (validator, binning, output)
//!   ↓
//! Layer 4: Codec (Ux-bytes, Ux-string)
//!   ↓
//! Layer 3: Model (DistributionalValue)
//!   ↓
//! Layer 2: Math (moments, telescoping torques)
//!   ↓
//! Layer 1: Primitives (errors, packer, DiracDelta)
//! ```
//!
//! ## Concurrency
//!
//! Everything is synchronous and single-threaded. A value owns its deltas
//! exclusively; the cached statistics and validity flags are plain mutable
//! state, so sharing a value across contexts requires external exclusion.

pub mod api;
pub mod codec;
pub mod engine;
pub mod math;
pub mod model;
pub mod primitives;

pub use api::{decode, encode, Result, UxInput, UxOutput};
pub use engine::binning::{bin_pdf_to_ttr, create_binning, get_binning, Binning};
pub use engine::output::{BinPdf, BinRect, PlotData, SpecialBars};
pub use model::value::DistributionalValue;
pub use primitives::delta::{DiracDelta, PositionOrd, FIXED_POINT_ONE};
pub use primitives::errors::UxError;

/// Everything most callers need, in one import.
pub mod prelude {
    pub use crate::api::{decode, encode, UxInput, UxOutput};
    pub use crate::engine::binning::{bin_pdf_to_ttr, create_binning, get_binning, Binning};
    pub use crate::engine::output::{BinPdf, BinRect, PlotData, SpecialBars};
    pub use crate::model::value::DistributionalValue;
    pub use crate::primitives::delta::{DiracDelta, PositionOrd, FIXED_POINT_ONE};
    pub use crate::primitives::errors::UxError;
}
