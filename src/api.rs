//! High-level API for the Ux distributional-value toolkit.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry points: one `decode`
//! that accepts either wire form, one `encode` that produces either wire
//! form, and the re-export block the prelude draws from.
//!
//! ## Design notes
//!
//! * `decode` follows the wire contract: any failure returns `None` after
//!   exactly one diagnostic line. Callers that need the failure kind use
//!   the `try_` functions in the codec layer.
//! * `encode` keeps the error kind; for a well-formed value it cannot
//!   fail, but the packer contract is surfaced rather than swallowed.
//! * Plot construction is reached through [`PlotData::build`], which
//!   raises validation failures to the caller instead of returning `None`.
//!
//! ## Visibility
//!
//! This is the primary public API. Types re-exported here are considered
//! stable.

use crate::codec::ux::{
    encode_ux_bytes, encode_ux_string, try_decode_ux_bytes, try_decode_ux_string,
};
use crate::model::value::DistributionalValue;
use crate::primitives::errors::UxError;

// Publicly re-exported types
pub use crate::engine::binning::{bin_pdf_to_ttr, create_binning, get_binning, Binning};
pub use crate::engine::output::{BinPdf, BinRect, PlotData, SpecialBars};
pub use crate::primitives::delta::{DiracDelta, PositionOrd, FIXED_POINT_ONE};
pub use crate::primitives::packer::PackValue;

/// Result type alias for Ux operations.
pub type Result<T> = core::result::Result<T, UxError>;

/// Either wire form, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub enum UxInput<'a> {
    /// A Ux-string: `[particle]Ux<hex>`.
    Text(&'a str),
    /// A Ux-bytes buffer.
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for UxInput<'a> {
    fn from(text: &'a str) -> Self {
        UxInput::Text(text)
    }
}

impl<'a> From<&'a [u8]> for UxInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        UxInput::Bytes(bytes)
    }
}

/// Either wire form, produced by [`encode`].
#[derive(Debug, Clone, PartialEq)]
pub enum UxOutput {
    /// A Ux-string.
    Text(String),
    /// A Ux-bytes buffer.
    Bytes(Vec<u8>),
}

impl UxOutput {
    /// The string form, when this output is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            UxOutput::Text(text) => Some(text),
            UxOutput::Bytes(_) => None,
        }
    }

    /// The byte form, when this output is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            UxOutput::Text(_) => None,
            UxOutput::Bytes(bytes) => Some(bytes),
        }
    }
}

/// Decode a distributional value from either wire form.
///
/// `double_precision` selects the wire width of support positions. Any
/// failure returns `None` after one warning line describing the cause.
pub fn decode<'a>(
    input: impl Into<UxInput<'a>>,
    double_precision: bool,
) -> Option<DistributionalValue> {
    let result = match input.into() {
        UxInput::Text(text) => try_decode_ux_string(text, double_precision),
        UxInput::Bytes(bytes) => try_decode_ux_bytes(bytes, double_precision),
    };
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("Ux decode failed: {err}");
            None
        }
    }
}

/// Encode a distributional value, as a Ux-string when `as_string` is set,
/// otherwise as Ux-bytes.
///
/// Takes the value mutably because the wire mean is served from its cache,
/// computed on first use.
pub fn encode(value: &mut DistributionalValue, as_string: bool) -> Result<UxOutput> {
    if as_string {
        encode_ux_string(value).map(UxOutput::Text)
    } else {
        encode_ux_bytes(value).map(UxOutput::Bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
