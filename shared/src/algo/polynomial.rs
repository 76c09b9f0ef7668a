//! Polynomial evaluation and least-squares fitting.
//!
//! Coefficients are ordered highest degree first, the convention used by
//! trace and dispersion tables.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolyfitError {
    #[error("Need at least {needed} points to fit degree {degree}, got {got}")]
    InsufficientData {
        degree: usize,
        needed: usize,
        got: usize,
    },
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("Least-squares solve failed: {0}")]
    SolveFailed(String),
}

/// Evaluate `coeffs[0]·x^(n-1) + … + coeffs[n-1]` with Horner's rule.
///
/// An empty coefficient list evaluates to zero.
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Least-squares polynomial fit of the given degree.
///
/// Returns coefficients highest degree first, suitable for [`polyval`].
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Vec<f64>, PolyfitError> {
    if xs.len() != ys.len() {
        return Err(PolyfitError::MismatchedLengths);
    }
    let needed = degree + 1;
    if xs.len() < needed {
        return Err(PolyfitError::InsufficientData {
            degree,
            needed,
            got: xs.len(),
        });
    }

    let mut design = DMatrix::from_fn(xs.len(), needed, |i, j| xs[i].powi((degree - j) as i32));

    // Equilibrate columns; raw powers of pixel coordinates span many decades
    let norms: Vec<f64> = design
        .column_iter()
        .map(|col| col.norm())
        .map(|n| if n > 0.0 { n } else { 1.0 })
        .collect();
    for (j, norm) in norms.iter().enumerate() {
        design.column_mut(j).unscale_mut(*norm);
    }

    let rhs = DVector::from_column_slice(ys);
    let solution = design
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|e| PolyfitError::SolveFailed(e.to_string()))?;

    Ok(solution
        .iter()
        .zip(&norms)
        .map(|(c, norm)| c / norm)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polyval_order() {
        // 2x^2 + 3x + 4
        assert_eq!(polyval(&[2.0, 3.0, 4.0], 2.0), 18.0);
        assert_eq!(polyval(&[5.0], 100.0), 5.0);
        assert_eq!(polyval(&[], 1.0), 0.0);
    }

    #[test]
    fn test_polyfit_recovers_quadratic() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 0.3 * x * x - 1.2 * x + 7.0).collect();

        let coeffs = polyfit(&xs, &ys, 2).unwrap();
        assert_eq!(coeffs.len(), 3);
        assert_relative_eq!(coeffs[0], 0.3, epsilon = 1e-9);
        assert_relative_eq!(coeffs[1], -1.2, epsilon = 1e-9);
        assert_relative_eq!(coeffs[2], 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_polyfit_rejects_short_input() {
        let err = polyfit(&[1.0, 2.0], &[1.0, 2.0], 2).unwrap_err();
        assert!(matches!(err, PolyfitError::InsufficientData { needed: 3, .. }));
    }
}
