//! Layer 4: Codec
//!
//! The two interoperable wire encodings of a distributional value.
//!
//! # Module Organization
//!
//! - **ux**: Ux-bytes (binary, little-endian) and Ux-string (hex,
//!   big-endian) encode/decode

/// Ux wire formats.
pub mod ux;

/// Largest delta count a wire value may declare.
pub const MAX_UR_ORDER: u64 = 10_000;
