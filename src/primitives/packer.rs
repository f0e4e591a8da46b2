//! Format-string packing of primitive numeric values.
//!
//! ## Purpose
//!
//! This module encodes and decodes flat sequences of numbers against a
//! compact format-string grammar: zero or more groups of
//! `[endian]?[count]?type`. It is the lowest layer of the wire codec and
//! knows nothing about distributional values.
//!
//! ## Design notes
//!
//! * The endian-marker table and the size table reproduce the producer's
//!   tables bit-for-bit. Two entries look wrong on purpose and MUST stay as
//!   they are, or existing producer output becomes unreadable:
//!   - `@`, `=`, and `!` all select big-endian (only `<` is little-endian);
//!   - `h`/`H` are **one** byte wide, not two.
//! * Characters that cannot start a group are skipped, and scanning resumes
//!   at the next character. Only a format that yields zero groups is an
//!   error.
//! * `pack` treats a missing or null slot value as numeric zero of the
//!   declared type.
//! * 64-bit integer slots accept an integer or a float that is losslessly
//!   convertible; anything else is rejected rather than silently rounded.
//! * `unpack` is strict: it fails on a short buffer and on trailing bytes.
//!
//! ## Invariants
//!
//! * `unpack(f, pack(f, v))` reproduces `v` up to the declared widths.
//! * Group expansion is deterministic; a count of `n` contributes exactly
//!   `n` slots of the group's type and endianness.
//!
//! ## Non-goals
//!
//! * No strings, padding, or alignment directives.
//! * No streaming; both directions operate on complete buffers.
//!
//! ## Visibility
//!
//! Used by the Ux codec. The `Option`-returning wrappers mirror the wire
//! contract (`None` plus one diagnostic line); the `try_` forms are for
//! callers that want the error kind.

use num_traits::ToPrimitive;

use crate::primitives::errors::UxError;

// ============================================================================
// Value Model
// ============================================================================

/// A single packable slot value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PackValue {
    /// Absent value; encodes as numeric zero of the declared type.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// IEEE-754 double.
    Float(f64),
}

impl PackValue {
    /// Numeric view as `f64`. `Null` reads as 0.
    pub fn as_f64(&self) -> f64 {
        match *self {
            PackValue::Null => 0.0,
            PackValue::Int(v) => v as f64,
            PackValue::Uint(v) => v as f64,
            PackValue::Float(v) => v,
        }
    }

    /// Numeric view as `u64`, truncating floats. `Null` reads as 0.
    pub fn as_u64(&self) -> u64 {
        match *self {
            PackValue::Null => 0,
            PackValue::Int(v) => v as u64,
            PackValue::Uint(v) => v,
            PackValue::Float(v) => v as u64,
        }
    }

    /// Numeric view as `i64`, truncating floats. `Null` reads as 0.
    pub fn as_i64(&self) -> i64 {
        match *self {
            PackValue::Null => 0,
            PackValue::Int(v) => v,
            PackValue::Uint(v) => v as i64,
            PackValue::Float(v) => v as i64,
        }
    }
}

impl From<u64> for PackValue {
    fn from(v: u64) -> Self {
        PackValue::Uint(v)
    }
}

impl From<i64> for PackValue {
    fn from(v: i64) -> Self {
        PackValue::Int(v)
    }
}

impl From<f64> for PackValue {
    fn from(v: f64) -> Self {
        PackValue::Float(v)
    }
}

// ============================================================================
// Format Grammar
// ============================================================================

/// Byte order of one format group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Numeric kind of one format type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Signed,
    Unsigned,
    Float,
}

/// One parsed `[endian]?[count]?type` group.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Group {
    endian: Endian,
    count: usize,
    kind: Kind,
    size: usize,
}

/// The legacy type table: kind and width per code.
///
/// `h`/`H` are deliberately 1 byte wide on this wire.
fn type_entry(code: char) -> Option<(Kind, usize)> {
    match code {
        'c' => Some((Kind::Unsigned, 1)),
        'b' => Some((Kind::Signed, 1)),
        'B' => Some((Kind::Unsigned, 1)),
        'h' => Some((Kind::Signed, 1)),
        'H' => Some((Kind::Unsigned, 1)),
        'i' => Some((Kind::Signed, 4)),
        'I' => Some((Kind::Unsigned, 4)),
        'l' => Some((Kind::Signed, 4)),
        'L' => Some((Kind::Unsigned, 4)),
        'q' => Some((Kind::Signed, 8)),
        'Q' => Some((Kind::Unsigned, 8)),
        'f' => Some((Kind::Float, 4)),
        'd' => Some((Kind::Float, 8)),
        _ => None,
    }
}

/// The legacy endian-marker table. Only `<` selects little-endian.
fn endian_entry(code: char) -> Option<Endian> {
    match code {
        '<' => Some(Endian::Little),
        '@' | '=' | '>' | '!' => Some(Endian::Big),
        _ => None,
    }
}

/// Parse every group occurrence out of a format string.
///
/// Scanning skips characters that cannot start a group, matching the
/// original global-match behavior.
fn parse_format(format: &str) -> Vec<Group> {
    let chars: Vec<char> = format.chars().collect();
    let mut groups = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match parse_group_at(&chars, i) {
            Some((group, next)) => {
                groups.push(group);
                i = next;
            }
            None => i += 1,
        }
    }

    groups
}

/// Try to match one group starting exactly at `start`.
fn parse_group_at(chars: &[char], start: usize) -> Option<(Group, usize)> {
    let mut i = start;

    let endian = match endian_entry(chars[i]) {
        Some(e) => {
            i += 1;
            e
        }
        None => Endian::Big,
    };

    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let count = if i > digits_start {
        let text: String = chars[digits_start..i].iter().collect();
        text.parse::<usize>().ok()?
    } else {
        1
    };

    let (kind, size) = type_entry(*chars.get(i)?)?;
    Some((
        Group {
            endian,
            count,
            kind,
            size,
        },
        i + 1,
    ))
}

/// Total byte length a group list describes.
fn packed_size(groups: &[Group]) -> usize {
    groups.iter().map(|g| g.count * g.size).sum()
}

// ============================================================================
// Packing
// ============================================================================

/// Encode `values` against `format`.
///
/// Returns the error kind; see [`pack`] for the `Option` wire contract.
pub fn try_pack(format: &str, values: &[PackValue]) -> Result<Vec<u8>, UxError> {
    let groups = parse_format(format);
    if groups.is_empty() {
        return Err(UxError::MalformedFormat);
    }

    let mut out = Vec::with_capacity(packed_size(&groups));
    let mut slot = 0usize;
    for group in &groups {
        for _ in 0..group.count {
            let value = values.get(slot).copied().unwrap_or(PackValue::Null);
            write_slot(&mut out, group, value)?;
            slot += 1;
        }
    }

    Ok(out)
}

/// Decode `bytes` against `format`.
///
/// Fails on a short buffer and on trailing bytes beyond the last group.
pub fn try_unpack(format: &str, bytes: &[u8]) -> Result<Vec<PackValue>, UxError> {
    let groups = parse_format(format);
    if groups.is_empty() {
        return Err(UxError::MalformedFormat);
    }

    let needed = packed_size(&groups);
    if needed > bytes.len() {
        return Err(UxError::BufferUnderflow {
            needed,
            got: bytes.len(),
        });
    }
    if bytes.len() > needed {
        return Err(UxError::TrailingBytes {
            extra: bytes.len() - needed,
        });
    }

    let mut values = Vec::new();
    let mut offset = 0usize;
    for group in &groups {
        for _ in 0..group.count {
            values.push(read_slot(&bytes[offset..offset + group.size], group));
            offset += group.size;
        }
    }

    Ok(values)
}

/// Encode `values` against `format`, or `None` with one warning line.
pub fn pack(format: &str, values: &[PackValue]) -> Option<Vec<u8>> {
    match try_pack(format, values) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::warn!("pack({format:?}) failed: {err}");
            None
        }
    }
}

/// Decode `bytes` against `format`, or `None` with one warning line.
pub fn unpack(format: &str, bytes: &[u8]) -> Option<Vec<PackValue>> {
    match try_unpack(format, bytes) {
        Ok(values) => Some(values),
        Err(err) => {
            tracing::warn!("unpack({format:?}) failed: {err}");
            None
        }
    }
}

// ============================================================================
// Slot Encoding
// ============================================================================

fn write_slot(out: &mut Vec<u8>, group: &Group, value: PackValue) -> Result<(), UxError> {
    match group.kind {
        Kind::Float => {
            let v = value.as_f64();
            match (group.size, group.endian) {
                (4, Endian::Big) => out.extend_from_slice(&(v as f32).to_be_bytes()),
                (4, Endian::Little) => out.extend_from_slice(&(v as f32).to_le_bytes()),
                (_, Endian::Big) => out.extend_from_slice(&v.to_be_bytes()),
                (_, Endian::Little) => out.extend_from_slice(&v.to_le_bytes()),
            }
        }
        Kind::Unsigned => {
            let v = integer_slot_value(value, group.size)? as u64;
            extend_truncated(out, &v.to_be_bytes(), group.size, group.endian);
        }
        Kind::Signed => {
            let v = integer_slot_value(value, group.size)?;
            extend_truncated(out, &(v as u64).to_be_bytes(), group.size, group.endian);
        }
    }
    Ok(())
}

/// Resolve a value destined for an integer slot.
///
/// Floats must be losslessly convertible; 64-bit slots get a checked cast,
/// narrower slots truncate like the original wire writer did.
fn integer_slot_value(value: PackValue, size: usize) -> Result<i64, UxError> {
    match value {
        PackValue::Null => Ok(0),
        PackValue::Int(v) => Ok(v),
        PackValue::Uint(v) => Ok(v as i64),
        PackValue::Float(v) => {
            if !v.is_finite() || v.fract() != 0.0 {
                return Err(UxError::NonConvertibleValue { value: v, width: size });
            }
            if size == 8 {
                // range-checked cast; the u64 view covers the upper half bit-wise
                v.to_i64()
                    .or_else(|| v.to_u64().map(|u| u as i64))
                    .ok_or(UxError::NonConvertibleValue { value: v, width: size })
            } else {
                Ok(v as i64)
            }
        }
    }
}

/// Append the low `size` bytes of a big-endian u64 image in the requested
/// byte order.
fn extend_truncated(out: &mut Vec<u8>, be: &[u8; 8], size: usize, endian: Endian) {
    let tail = &be[8 - size..];
    match endian {
        Endian::Big => out.extend_from_slice(tail),
        Endian::Little => out.extend(tail.iter().rev()),
    }
}

// ============================================================================
// Slot Decoding
// ============================================================================

fn read_slot(bytes: &[u8], group: &Group) -> PackValue {
    let mut be = [0u8; 8];
    match group.endian {
        Endian::Big => be[8 - group.size..].copy_from_slice(bytes),
        Endian::Little => {
            for (i, b) in bytes.iter().rev().enumerate() {
                be[8 - group.size + i] = *b;
            }
        }
    }
    let raw = u64::from_be_bytes(be);

    match group.kind {
        Kind::Float => {
            if group.size == 4 {
                PackValue::Float(f32::from_bits(raw as u32) as f64)
            } else {
                PackValue::Float(f64::from_bits(raw))
            }
        }
        Kind::Unsigned => PackValue::Uint(raw),
        Kind::Signed => {
            let shift = 64 - 8 * group.size as u32;
            PackValue::Int(((raw << shift) as i64) >> shift)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
