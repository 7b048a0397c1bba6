//! Student's t distribution: CDF and critical values.
//!
//! Thin wrappers over `statrs` that take integer degrees of freedom and
//! return NaN instead of an error for undefined inputs, so the accumulator
//! can stay total.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Standard Student's t with `df` degrees of freedom, if `df > 0`.
fn standard_t(df: usize) -> Option<StudentsT> {
    if df == 0 {
        return None;
    }
    StudentsT::new(0.0, 1.0, df as f64).ok()
}

/// Cumulative distribution function of Student's t with `df` degrees of freedom.
///
/// Returns NaN when `df == 0`.
#[must_use]
pub fn students_t_cdf(t: f64, df: usize) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    standard_t(df).map_or(f64::NAN, |dist| dist.cdf(t))
}

/// Quantile (inverse CDF) of Student's t: the value `t` with `P(T ≤ t) = p`.
///
/// Returns NaN when `p` is outside the open interval (0, 1) or `df == 0`.
///
/// # Example
///
/// ```rust
/// use simrep::stats::t_dist::t_quantile;
///
/// let t = t_quantile(0.975, 10);
/// assert!((t - 2.228_138_85).abs() < 1e-6);
/// ```
#[must_use]
pub fn t_quantile(p: f64, df: usize) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    standard_t(df).map_or(f64::NAN, |dist| dist.inverse_cdf(p))
}

/// Two-sided critical value `t_{1-α/2, df}` for a confidence level `1 - α`.
#[must_use]
pub fn two_sided_critical(confidence_level: f64, df: usize) -> f64 {
    t_quantile(1.0 - (1.0 - confidence_level) / 2.0, df)
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: the quantile is monotone in p.
        #[test]
        fn prop_quantile_monotone(p in 0.51f64..0.99, dp in 0.001f64..0.009, df in 1usize..200) {
            let lo = t_quantile(p, df);
            let hi = t_quantile(p + dp, df);
            prop_assert!(hi > lo, "t({}) = {} not above t({}) = {}", p + dp, hi, p, lo);
        }

        /// Falsification test: heavier tails at lower degrees of freedom.
        #[test]
        fn prop_critical_value_decreases_with_df(df in 1usize..500) {
            let fewer = two_sided_critical(0.95, df);
            let more = two_sided_critical(0.95, df + 1);
            prop_assert!(fewer > more);
        }
    }
}
