//! Shared error types for decoding, validation, and binning.
//!
//! ## Purpose
//!
//! This module provides the unified [`UxError`] enum used across the crate.
//! Every fallible operation returns `Result<T, UxError>`, and variants carry
//! the specific values that triggered the failure so messages are useful
//! without a debugger.
//!
//! ## Design notes
//!
//! * One enum for the whole crate; callers match on kind, not on strings.
//! * Wire-level failures (underflow, malformed header, order range) are
//!   converted to `None` plus a single warning line at the public decode
//!   boundary. Validation failures during plot construction propagate to the
//!   caller as errors.
//! * Error messages include the offending values and the relevant limit.
//!
//! ## Visibility
//!
//! [`UxError`] is part of the public API.

use thiserror::Error;

/// Unified error type for wire decoding, packing, and plot construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UxError {
    /// A packer format string matched zero groups.
    #[error("format string matched no pack groups")]
    MalformedFormat,

    /// A read would run past the end of the buffer.
    #[error("buffer underflow: needed {needed} bytes, got {got}")]
    BufferUnderflow { needed: usize, got: usize },

    /// Unpack consumed every group but bytes remained.
    #[error("unpack left {extra} trailing bytes")]
    TrailingBytes { extra: usize },

    /// A Ux-string did not match the `<particle>Ux<hex>` shape.
    #[error("malformed Ux header")]
    MalformedHeader,

    /// The declared delta count exceeds the wire limit.
    #[error("UR_order {got} out of range (max 10000)")]
    OrderOutOfRange { got: u64 },

    /// The effective plotting resolution must be a power of two.
    #[error("plotting resolution {got} is not a power of two")]
    ResolutionNotPowerOfTwo { got: u32 },

    /// Plot construction was attempted on a value with no deltas.
    #[error("cannot build plot data from a value with no deltas")]
    EmptyValue,

    /// A float was supplied for an integer slot but is not losslessly
    /// convertible.
    #[error("value {value} is not losslessly convertible to a {width}-byte integer")]
    NonConvertibleValue { value: f64, width: usize },
}
