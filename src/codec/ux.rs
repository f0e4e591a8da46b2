//! Encode and decode distributional values on the Ux wire.
//!
//! ## Purpose
//!
//! This module implements the two concrete encodings sharing one logical
//! schema: Ux-bytes (binary) and Ux-string (a decimal particle prefix, the
//! literal `Ux`, then the same fields as ASCII hex). It is the only place
//! in the crate that knows wire offsets.
//!
//! ## Design notes
//!
//! * Byte order is asymmetric on purpose: Ux-bytes is little-endian in
//!   every numeric field, Ux-string is big-endian in every numeric field.
//!   Producers emit both forms this way; neither side may be "fixed".
//! * The `sample_count` field is reserved. It is always written as
//!   `UR_order` widened to 8 bytes and is ignored on read.
//! * The wire `mean` is captured into the value's mean cache on decode, so
//!   encoding a freshly decoded value reproduces the input byte-for-byte
//!   even when the producer's mean differs from a recomputation in the
//!   last bits.
//! * Validation is fail-fast and ordered cheap to expensive: header shape,
//!   then declared order, then payload length.
//! * Hex is emitted uppercase and accepted in either case.
//!
//! ## Wire layout
//!
//! ```text
//! bytes:  particle f64 | UR_type u8 | sample_count u64 | mean f64 |
//!         UR_order u32 | UR_order x (position f64|f32, raw_mass u64)
//! string: [particle decimal] "Ux" hex(UR_type u8 | sample_count u64 |
//!         mean f64 | UR_order u32 | pairs)
//! ```
//!
//! ## Visibility
//!
//! The `try_` functions return error kinds and back the public
//! `Option`-returning API entry points.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::MAX_UR_ORDER;
use crate::model::value::DistributionalValue;
use crate::primitives::delta::DiracDelta;
use crate::primitives::errors::UxError;
use crate::primitives::packer::{try_pack, try_unpack, PackValue};

/// Header bytes past the particle: UR_type + sample_count + mean + UR_order.
const HEADER_LEN: usize = 1 + 8 + 8 + 4;

/// Offset of the header inside a Ux-bytes buffer.
const BYTES_HEADER_OFFSET: usize = 8;

/// The `<particle>Ux<hex>` shape. Only `nan`/`inf` are case-insensitive.
static UX_STRING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?\d*\.?\d+|(?i:nan)|[-+]?(?i:inf))?Ux([0-9A-Fa-f]+)$")
        .expect("static pattern")
});

// ============================================================================
// Decoding
// ============================================================================

/// Decode a Ux-bytes buffer.
pub fn try_decode_ux_bytes(
    bytes: &[u8],
    double_precision: bool,
) -> Result<DistributionalValue, UxError> {
    // Check 1: room for particle and header
    let header_end = BYTES_HEADER_OFFSET + HEADER_LEN;
    if bytes.len() < header_end {
        return Err(UxError::BufferUnderflow {
            needed: header_end,
            got: bytes.len(),
        });
    }

    let particle = try_unpack("<d", &bytes[..8])?[0].as_f64();
    let header = try_unpack("<B<Q<d<I", &bytes[BYTES_HEADER_OFFSET..header_end])?;
    let ur_type = header[0].as_u64() as u8;
    let mean = header[2].as_f64();
    let ur_order = header[3].as_u64();

    // Check 2: declared order within the wire limit
    if ur_order > MAX_UR_ORDER {
        return Err(UxError::OrderOutOfRange { got: ur_order });
    }

    // Check 3: room for the declared pairs
    let pair_len = position_len(double_precision) + 8;
    let needed = header_end + ur_order as usize * pair_len;
    if bytes.len() < needed {
        return Err(UxError::BufferUnderflow {
            needed,
            got: bytes.len(),
        });
    }

    let deltas = decode_pairs(
        &bytes[header_end..],
        ur_order as usize,
        double_precision,
        false,
    )?;

    let particle = if particle.is_nan() { None } else { Some(particle) };
    let mut value =
        DistributionalValue::from_deltas(particle, ur_type, double_precision, deltas);
    if ur_order > 0 {
        value.set_cached_mean(mean);
    }
    Ok(value)
}

/// Decode a Ux-string.
pub fn try_decode_ux_string(
    text: &str,
    double_precision: bool,
) -> Result<DistributionalValue, UxError> {
    // Check 1: overall shape
    let captures = UX_STRING_RE.captures(text).ok_or(UxError::MalformedHeader)?;

    let particle = match captures.get(1) {
        Some(m) => Some(m.as_str().parse::<f64>().map_err(|_| UxError::MalformedHeader)?),
        None => None,
    };

    let hex = captures
        .get(2)
        .ok_or(UxError::MalformedHeader)?
        .as_str();
    let payload = hex_to_bytes(hex)?;

    // Check 2: room for the header
    if payload.len() < HEADER_LEN {
        return Err(UxError::BufferUnderflow {
            needed: HEADER_LEN,
            got: payload.len(),
        });
    }

    let header = try_unpack(">B>Q>d>I", &payload[..HEADER_LEN])?;
    let ur_type = header[0].as_u64() as u8;
    let mean = header[2].as_f64();
    let ur_order = header[3].as_u64();

    // Check 3: declared order within the wire limit
    if ur_order > MAX_UR_ORDER {
        return Err(UxError::OrderOutOfRange { got: ur_order });
    }

    // Check 4: room for the declared pairs
    let pair_len = position_len(double_precision) + 8;
    let needed = HEADER_LEN + ur_order as usize * pair_len;
    if payload.len() < needed {
        return Err(UxError::BufferUnderflow {
            needed,
            got: payload.len(),
        });
    }

    let deltas = decode_pairs(
        &payload[HEADER_LEN..],
        ur_order as usize,
        double_precision,
        true,
    )?;

    let mut value =
        DistributionalValue::from_deltas(particle, ur_type, double_precision, deltas);
    if ur_order > 0 {
        value.set_cached_mean(mean);
    }
    Ok(value)
}

/// Read `count` (position, raw_mass) pairs from the head of `bytes`.
fn decode_pairs(
    bytes: &[u8],
    count: usize,
    double_precision: bool,
    big_endian: bool,
) -> Result<Vec<DiracDelta>, UxError> {
    let pos_len = position_len(double_precision);
    let pair_len = pos_len + 8;
    let (pos_format, mass_format) = match (double_precision, big_endian) {
        (true, true) => (">d", ">Q"),
        (true, false) => ("<d", "<Q"),
        (false, true) => (">f", ">Q"),
        (false, false) => ("<f", "<Q"),
    };

    let mut deltas = Vec::with_capacity(count);
    for i in 0..count {
        let at = i * pair_len;
        let position = try_unpack(pos_format, &bytes[at..at + pos_len])?[0].as_f64();
        let raw_mass = try_unpack(mass_format, &bytes[at + pos_len..at + pair_len])?[0].as_u64();
        deltas.push(DiracDelta::from_raw(position, raw_mass));
    }
    Ok(deltas)
}

fn position_len(double_precision: bool) -> usize {
    if double_precision {
        8
    } else {
        4
    }
}

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, UxError> {
    if hex.len() % 2 != 0 {
        return Err(UxError::MalformedHeader);
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let text = core::str::from_utf8(pair).map_err(|_| UxError::MalformedHeader)?;
            u8::from_str_radix(text, 16).map_err(|_| UxError::MalformedHeader)
        })
        .collect()
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value as Ux-bytes.
///
/// Takes the receiver mutably because the wire mean comes from the value's
/// mean cache, computing it on first use.
pub fn encode_ux_bytes(value: &mut DistributionalValue) -> Result<Vec<u8>, UxError> {
    let mut out = try_pack(
        "<d",
        &[PackValue::Float(value.particle_value().unwrap_or(f64::NAN))],
    )?;
    out.extend(header_fields(value, "<B<Q<d<I")?);
    out.extend(pair_fields(value, false)?);
    Ok(out)
}

/// Encode a value as a Ux-string.
pub fn encode_ux_string(value: &mut DistributionalValue) -> Result<String, UxError> {
    let mut payload = header_fields(value, ">B>Q>d>I")?;
    payload.extend(pair_fields(value, true)?);

    let mut text = match value.particle_value() {
        Some(p) => format_particle(p),
        None => String::new(),
    };
    text.push_str("Ux");
    for byte in payload {
        text.push_str(&format!("{byte:02X}"));
    }
    Ok(text)
}

fn header_fields(value: &mut DistributionalValue, format: &str) -> Result<Vec<u8>, UxError> {
    let order = value.ur_order() as u64;
    let mean = value.mean().unwrap_or(f64::NAN);
    try_pack(
        format,
        &[
            PackValue::Uint(value.ur_type() as u64),
            PackValue::Uint(order),
            PackValue::Float(mean),
            PackValue::Uint(order),
        ],
    )
}

fn pair_fields(value: &DistributionalValue, big_endian: bool) -> Result<Vec<u8>, UxError> {
    let format = match (value.double_precision(), big_endian) {
        (true, true) => ">d>Q",
        (true, false) => "<d<Q",
        (false, true) => ">f>Q",
        (false, false) => "<f<Q",
    };

    let mut out = Vec::new();
    for delta in value.deltas() {
        out.extend(try_pack(
            format,
            &[
                PackValue::Float(delta.position()),
                PackValue::Uint(delta.raw_mass()),
            ],
        )?);
    }
    Ok(out)
}

/// Render a particle the way the string form spells floats: plain decimal,
/// lowercase `nan` and `inf`.
fn format_particle(p: f64) -> String {
    if p.is_nan() {
        "nan".to_string()
    } else if p == f64::INFINITY {
        "inf".to_string()
    } else if p == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{p}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::delta::FIXED_POINT_ONE;
    use approx::assert_relative_eq;

    fn two_delta_value() -> DistributionalValue {
        let half = FIXED_POINT_ONE / 2;
        DistributionalValue::from_deltas(
            Some(1.5),
            0,
            true,
            vec![
                DiracDelta::from_raw(1.0, half),
                DiracDelta::from_raw(2.0, half),
            ],
        )
    }

    #[test]
    fn string_round_trip_two_finite_deltas() {
        let mut v = two_delta_value();
        let text = encode_ux_string(&mut v).unwrap();
        assert!(text.starts_with("1.5Ux00"), "got {text}");

        let decoded = try_decode_ux_string(&text, true).unwrap();
        assert_eq!(decoded.particle_value(), Some(1.5));
        assert_eq!(decoded.ur_order(), 2);
        assert_eq!(decoded.deltas()[0].position(), 1.0);
        assert_eq!(decoded.deltas()[0].raw_mass(), FIXED_POINT_ONE / 2);
        assert_eq!(decoded.deltas()[1].position(), 2.0);
        assert_eq!(decoded.deltas()[1].raw_mass(), FIXED_POINT_ONE / 2);
    }

    #[test]
    fn bytes_with_specials_encode_to_61_bytes() {
        let half = FIXED_POINT_ONE / 2;
        let mut v = DistributionalValue::from_deltas(
            None,
            0,
            true,
            vec![
                DiracDelta::from_raw(0.0, half),
                DiracDelta::from_raw(f64::NAN, half),
            ],
        );
        v.sort();
        assert_eq!(v.deltas()[0].position(), 0.0);
        assert!(v.deltas()[1].position().is_nan());
        assert_relative_eq!(v.nan_delta().mass(), 0.5);
        assert!(v.mean().unwrap().is_nan());

        let bytes = encode_ux_bytes(&mut v).unwrap();
        assert_eq!(bytes.len(), 8 + 1 + 8 + 8 + 4 + 2 * (8 + 8));
    }

    #[test]
    fn bytes_round_trip_is_byte_identical() {
        let mut v = two_delta_value();
        let bytes = encode_ux_bytes(&mut v).unwrap();
        let mut decoded = try_decode_ux_bytes(&bytes, true).unwrap();
        let again = encode_ux_bytes(&mut decoded).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn string_round_trip_is_identical_up_to_case() {
        let mut v = two_delta_value();
        let text = encode_ux_string(&mut v).unwrap();

        // lowercase the hex payload only; the `Ux` literal is fixed case
        let at = text.find("Ux").unwrap() + 2;
        let relaxed = format!("{}{}", &text[..at], text[at..].to_lowercase());

        let mut decoded = try_decode_ux_string(&relaxed, true).unwrap();
        let again = encode_ux_string(&mut decoded).unwrap();
        assert_eq!(text, again);
    }

    #[test]
    fn single_precision_positions_survive() {
        let mut v = DistributionalValue::from_deltas(
            None,
            3,
            false,
            vec![DiracDelta::from_raw(0.25, FIXED_POINT_ONE)],
        );
        let bytes = encode_ux_bytes(&mut v).unwrap();
        assert_eq!(bytes.len(), 8 + 21 + 4 + 8);

        let decoded = try_decode_ux_bytes(&bytes, false).unwrap();
        assert_eq!(decoded.deltas()[0].position(), 0.25);
        assert_eq!(decoded.ur_type(), 3);
    }

    #[test]
    fn order_above_limit_is_rejected() {
        let mut v = two_delta_value();
        let mut bytes = encode_ux_bytes(&mut v).unwrap();
        // overwrite UR_order (offset 25, little-endian u32) with 10001
        bytes[25..29].copy_from_slice(&10_001u32.to_le_bytes());
        assert!(matches!(
            try_decode_ux_bytes(&bytes, true),
            Err(UxError::OrderOutOfRange { got: 10_001 })
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut v = two_delta_value();
        let bytes = encode_ux_bytes(&mut v).unwrap();
        assert!(matches!(
            try_decode_ux_bytes(&bytes[..bytes.len() - 1], true),
            Err(UxError::BufferUnderflow { .. })
        ));
        assert!(matches!(
            try_decode_ux_bytes(&bytes[..12], true),
            Err(UxError::BufferUnderflow { needed: 29, got: 12 })
        ));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for text in ["", "U", "1.5Ux", "xyzUx00", "1.5UxGG", "1.5ux00"] {
            assert!(try_decode_ux_string(text, true).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn particle_spellings() {
        for (particle, prefix) in [
            (Some(f64::NAN), "nan"),
            (Some(f64::INFINITY), "inf"),
            (Some(f64::NEG_INFINITY), "-inf"),
            (Some(-2.25), "-2.25"),
            (None, ""),
        ] {
            let mut v = DistributionalValue::from_deltas(
                particle,
                0,
                true,
                vec![DiracDelta::from_raw(0.0, FIXED_POINT_ONE)],
            );
            let text = encode_ux_string(&mut v).unwrap();
            assert!(text.starts_with(&format!("{prefix}Ux")), "got {text}");

            let decoded = try_decode_ux_string(&text, true).unwrap();
            match particle {
                Some(p) if p.is_nan() => assert!(decoded.particle_value().unwrap().is_nan()),
                other => assert_eq!(decoded.particle_value(), other),
            }
        }
    }

    #[test]
    fn wire_mean_survives_round_trip_unchanged() {
        let mut v = two_delta_value();
        let mut bytes = encode_ux_bytes(&mut v).unwrap();
        // perturb the producer mean (offset 17, little-endian f64)
        bytes[17..25].copy_from_slice(&9.75f64.to_le_bytes());

        let mut decoded = try_decode_ux_bytes(&bytes, true).unwrap();
        assert_eq!(decoded.mean(), Some(9.75));
        let again = encode_ux_bytes(&mut decoded).unwrap();
        assert_eq!(bytes, again);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::primitives::delta::FIXED_POINT_ONE;
    use proptest::prelude::*;

    /// Strategy for wire-plausible delta lists: finite positions, raw
    /// masses that sum below unit probability.
    fn delta_list(max_len: usize) -> impl Strategy<Value = Vec<DiracDelta>> {
        proptest::collection::vec(
            (
                prop::num::f64::NORMAL.prop_filter("finite", |p| p.is_finite()),
                0..=FIXED_POINT_ONE / 16,
            ),
            0..=max_len,
        )
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(p, raw)| DiracDelta::from_raw(p, raw))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        // --- Bytes round-trip is byte-identical ---
        #[test]
        fn bytes_round_trip(deltas in delta_list(24)) {
            let mut value = DistributionalValue::from_deltas(None, 7, true, deltas);
            let bytes = encode_ux_bytes(&mut value).unwrap();
            let mut decoded = try_decode_ux_bytes(&bytes, true).unwrap();

            prop_assert_eq!(decoded.ur_order(), value.ur_order());
            for (got, want) in decoded.deltas().iter().zip(value.deltas()) {
                prop_assert_eq!(got.position().to_bits(), want.position().to_bits());
                prop_assert_eq!(got.raw_mass(), want.raw_mass());
            }

            let again = encode_ux_bytes(&mut decoded).unwrap();
            prop_assert_eq!(bytes, again);
        }

        // --- String round-trip preserves raw masses and position bits ---
        #[test]
        fn string_round_trip(deltas in delta_list(24)) {
            let mut value = DistributionalValue::from_deltas(None, 1, true, deltas);
            let text = encode_ux_string(&mut value).unwrap();
            let mut decoded = try_decode_ux_string(&text, true).unwrap();

            for (got, want) in decoded.deltas().iter().zip(value.deltas()) {
                prop_assert_eq!(got.position().to_bits(), want.position().to_bits());
                prop_assert_eq!(got.raw_mass(), want.raw_mass());
            }

            let again = encode_ux_string(&mut decoded).unwrap();
            prop_assert_eq!(text, again);
        }

        // --- Single-precision wire width survives its own round-trip ---
        #[test]
        fn single_precision_round_trip(deltas in delta_list(12)) {
            let narrowed: Vec<DiracDelta> = deltas
                .iter()
                .map(|d| DiracDelta::from_raw(d.position() as f32 as f64, d.raw_mass()))
                .collect();
            let mut value = DistributionalValue::from_deltas(None, 0, false, narrowed);
            let bytes = encode_ux_bytes(&mut value).unwrap();
            let decoded = try_decode_ux_bytes(&bytes, false).unwrap();

            for (got, want) in decoded.deltas().iter().zip(value.deltas()) {
                prop_assert_eq!(got.position().to_bits(), want.position().to_bits());
                prop_assert_eq!(got.raw_mass(), want.raw_mass());
            }
        }
    }
}
