use crate::BfError;

/// Floating point type used throughout the workspace.
pub type Real = f64;

/// Lower bound of every duty cycle / power percentage.
pub const PERCENT_MIN: Real = 0.0;
/// Upper bound of every duty cycle / power percentage.
pub const PERCENT_MAX: Real = 100.0;

/// Reject NaN and infinities, naming the offending quantity.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, BfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(BfError::NonFinite { what, value: v })
    }
}

/// Accept `v` only if it is finite and within `[min, max]`.
pub fn ensure_in_range(v: Real, min: Real, max: Real, what: &'static str) -> Result<Real, BfError> {
    let v = ensure_finite(v, what)?;
    if v < min || v > max {
        return Err(BfError::OutOfRange {
            what,
            value: v,
            min,
            max,
        });
    }
    Ok(v)
}

/// Clamp a percentage into `[0, 100]`. NaN maps to 0.
pub fn clamp_percent(v: Real) -> Real {
    if v.is_nan() {
        return PERCENT_MIN;
    }
    v.clamp(PERCENT_MIN, PERCENT_MAX)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn clamp_percent_is_idempotent(v in prop::num::f64::ANY) {
            let once = clamp_percent(v);
            prop_assert!((PERCENT_MIN..=PERCENT_MAX).contains(&once));
            prop_assert_eq!(clamp_percent(once), once);
        }
    }
}
