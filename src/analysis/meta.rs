//! Fixed-effect inverse-variance meta-analysis.
//!
//! Pools any number of (estimate, standard error) pairs into a single
//! estimate with its standard error, Z-score and two-sided p-value.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// Result of pooling a set of estimates.
///
/// Every statistic is `None` exactly when `n_valid == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaResult {
    pub theta: Option<f64>,
    pub se: Option<f64>,
    pub z: Option<f64>,
    pub p: Option<f64>,
    pub n_valid: usize,
}

impl MetaResult {
    /// Pools `(estimate, standard_error)` pairs, skipping invalid ones.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
    {
        let valid: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter_map(|(estimate, se)| valid_pair(estimate, se))
            .collect();

        match valid.as_slice() {
            [] => Self::default(),
            // Return the lone study untouched; w * est / w is not bit-exact.
            [(theta, se)] => Self::complete(*theta, *se, 1),
            _ => {
                // Weights relative to the most precise study lie in (0, 1],
                // so 1 / se² never overflows for tiny standard errors.
                let se_min = valid.iter().map(|&(_, se)| se).fold(f64::INFINITY, f64::min);
                let mut sum_w = 0.0;
                let mut sum_w_est = 0.0;
                for &(estimate, se) in &valid {
                    let ratio = se_min / se;
                    let w = ratio * ratio;
                    sum_w += w;
                    sum_w_est += w * estimate;
                }
                Self::complete(sum_w_est / sum_w, se_min / sum_w.sqrt(), valid.len())
            }
        }
    }

    fn complete(theta: f64, se: f64, n_valid: usize) -> Self {
        let z = theta / se;
        Self {
            theta: Some(theta),
            se: Some(se),
            z: Some(z),
            p: Some(two_sided_p(z)),
            n_valid,
        }
    }
}

/// Pools parallel slices of estimates and standard errors.
///
/// Slices of different length are a caller bug and are rejected rather
/// than truncated.
pub fn meta_analyze(estimates: &[Option<f64>], standard_errors: &[Option<f64>]) -> Result<MetaResult> {
    if estimates.len() != standard_errors.len() {
        return Err(GraphError::LengthMismatch {
            estimates: estimates.len(),
            standard_errors: standard_errors.len(),
        });
    }

    Ok(MetaResult::from_pairs(
        estimates.iter().copied().zip(standard_errors.iter().copied()),
    ))
}

/// Two-sided normal p-value, `2 * (1 - Φ(|z|))`.
pub fn two_sided_p(z: f64) -> f64 {
    // erfc keeps precision far into the tail where 1 - Φ underflows.
    erfc(z.abs() / SQRT_2)
}

fn valid_pair(estimate: Option<f64>, se: Option<f64>) -> Option<(f64, f64)> {
    let estimate = estimate.filter(|v| v.is_finite())?;
    let se = se.filter(|v| v.is_finite() && *v > 0.0)?;
    Some((estimate, se))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_single_study_is_returned_unchanged() {
        for (est, se) in [(0.4, 0.1), (-0.37, 0.013), (1e-6, 3.3), (0.123456789, 0.0987654321)] {
            let result = meta_analyze(&[Some(est)], &[Some(se)]).unwrap();
            assert_eq!(result.theta, Some(est));
            assert_eq!(result.se, Some(se));
            assert_eq!(result.n_valid, 1);
        }
    }

    #[test]
    fn test_two_study_pooling() {
        let result = meta_analyze(&[Some(0.4), Some(0.6)], &[Some(0.1), Some(0.2)]).unwrap();

        assert_eq!(result.n_valid, 2);
        assert!(approx(result.theta.unwrap(), 0.44, 1e-12));
        assert!(approx(result.se.unwrap(), 1.0 / 125f64.sqrt(), 1e-12));
        assert!(approx(result.z.unwrap(), 4.919, 1e-3));
        assert!(result.p.unwrap() < 1e-5);
    }

    #[test]
    fn test_all_invalid_inputs() {
        let cases: Vec<(Vec<Option<f64>>, Vec<Option<f64>>)> = vec![
            (vec![], vec![]),
            (vec![Some(0.3), Some(0.2)], vec![Some(0.0), Some(-1.0)]),
            (vec![Some(f64::NAN)], vec![Some(0.1)]),
            (vec![Some(0.3)], vec![Some(f64::NAN)]),
            (vec![None, Some(0.2)], vec![Some(0.1), None]),
        ];

        for (estimates, ses) in cases {
            let result = meta_analyze(&estimates, &ses).unwrap();
            assert_eq!(result, MetaResult::default());
            assert_eq!(result.theta, None);
        }
    }

    #[test]
    fn test_invalid_pairs_are_skipped() {
        let result = meta_analyze(
            &[Some(0.5), Some(9.0), None],
            &[Some(0.05), Some(0.0), Some(0.1)],
        )
        .unwrap();

        assert_eq!(result.n_valid, 1);
        assert_eq!(result.theta, Some(0.5));
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = meta_analyze(&[Some(0.1), Some(0.3), Some(0.7)], &[Some(0.05), Some(0.2), Some(0.1)]).unwrap();
        let b = meta_analyze(&[Some(0.7), Some(0.1), Some(0.3)], &[Some(0.1), Some(0.05), Some(0.2)]).unwrap();

        assert!(approx(a.theta.unwrap(), b.theta.unwrap(), 1e-12));
        assert!(approx(a.se.unwrap(), b.se.unwrap(), 1e-12));
    }

    #[test]
    fn test_tiny_standard_errors_stay_finite() {
        let result = meta_analyze(&[Some(0.3), Some(0.5)], &[Some(1e-170), Some(1e-170)]).unwrap();

        assert_eq!(result.n_valid, 2);
        assert!(approx(result.theta.unwrap(), 0.4, 1e-12));
        let se = result.se.unwrap();
        assert!(se > 0.0 && se.is_finite());
        assert!(((se / 1e-170) - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        assert!(result.z.unwrap().is_finite());
        assert!(result.p.unwrap() < 1e-100);
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let err = meta_analyze(&[Some(0.1), Some(0.2)], &[Some(0.1)]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::LengthMismatch {
                estimates: 2,
                standard_errors: 1
            }
        ));
    }

    #[test]
    fn test_two_sided_p() {
        assert!(approx(two_sided_p(0.0), 1.0, 1e-12));
        assert!(approx(two_sided_p(1.959964), 0.05, 1e-6));
        assert!(approx(two_sided_p(-1.959964), 0.05, 1e-6));
    }
}
