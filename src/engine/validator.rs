//! Validation for plot construction.
//!
//! ## Purpose
//!
//! This module gathers the fail-fast checks that gate histogram
//! reconstruction. Wire-level validation lives with the codec; what is
//! validated here is whether a decoded value can be binned and plotted at
//! the requested resolution.
//!
//! ## Design notes
//!
//! * All validation is performed upfront before binning begins.
//! * Validation is fail-fast: returns on the first violation.
//! * Checks are ordered from cheap to expensive.
//!
//! ## Visibility
//!
//! Internal to the engine and the API layer.

use crate::model::value::DistributionalValue;
use crate::primitives::errors::UxError;

/// Validation utility for plot construction.
pub struct Validator;

impl Validator {
    /// A value must hold at least one delta to be plottable.
    pub fn validate_plottable(value: &DistributionalValue) -> Result<(), UxError> {
        if value.ur_order() == 0 {
            return Err(UxError::EmptyValue);
        }
        Ok(())
    }

    /// The effective plotting resolution must be a power of two.
    pub fn validate_resolution(resolution: u32) -> Result<(), UxError> {
        if resolution == 0 || !resolution.is_power_of_two() {
            return Err(UxError::ResolutionNotPowerOfTwo { got: resolution });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::delta::DiracDelta;

    #[test]
    fn empty_values_are_not_plottable() {
        let empty = DistributionalValue::default();
        assert!(matches!(
            Validator::validate_plottable(&empty),
            Err(UxError::EmptyValue)
        ));

        let mut one = DistributionalValue::default();
        one.push_delta(DiracDelta::new(0.0, 1.0));
        assert!(Validator::validate_plottable(&one).is_ok());
    }

    #[test]
    fn resolution_must_be_a_power_of_two() {
        for good in [1u32, 2, 16, 1024] {
            assert!(Validator::validate_resolution(good).is_ok());
        }
        for bad in [0u32, 3, 24, 1000] {
            assert!(matches!(
                Validator::validate_resolution(bad),
                Err(UxError::ResolutionNotPowerOfTwo { .. })
            ));
        }
    }
}
