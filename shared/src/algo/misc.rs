//! Miscellaneous numerical helpers.
//!
//! - **Linear interpolation**: strict, clamped and fill-value variants over a
//!   sorted abscissa
//! - **Quadrature**: trapezoidal integration over sampled data
//! - **Grids**: evenly spaced sample generation

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
}

fn check_table(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[1] < w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Interpolate inside the table without validating it.
///
/// Caller guarantees `xs[0] <= x <= xs[n-1]` and a sorted table.
fn interp_inside(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let idx = xs.partition_point(|&val| val <= x);
    if idx == 0 {
        return ys[0];
    }
    if idx == xs.len() {
        return ys[xs.len() - 1];
    }

    let (x1, x2) = (xs[idx - 1], xs[idx]);
    let (y1, y2) = (ys[idx - 1], ys[idx]);
    if x2 == x1 {
        return y2;
    }
    let t = (x - x1) / (x2 - x1);
    y1 + t * (y2 - y1)
}

/// Performs linear interpolation, rejecting points outside the table.
///
/// Uses a binary search over `xs`, so lookups are O(log n).
///
/// # Examples
///
/// ```rust
/// use shared::algo::misc::interp;
///
/// let xs = vec![0.0, 1.0, 2.0, 3.0];
/// let ys = vec![0.0, 2.0, 4.0, 6.0];
/// assert_eq!(interp(1.5, &xs, &ys).unwrap(), 3.0);
/// assert!(interp(3.5, &xs, &ys).is_err());
/// ```
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    check_table(xs, ys)?;

    let (lo, hi) = (xs[0], xs[xs.len() - 1]);
    if x < lo || x > hi {
        return Err(InterpError::OutOfBounds(x, lo, hi));
    }
    Ok(interp_inside(x, xs, ys))
}

/// Linear interpolation returning `left`/`right` outside the table.
///
/// Mirrors the fill-value convention used for spectra: a flux density
/// sampled outside its defined range is usually zero, not the edge value.
///
/// ```rust
/// use shared::algo::misc::interp_or;
///
/// let xs = [1.0, 2.0];
/// let ys = [10.0, 20.0];
/// assert_eq!(interp_or(0.5, &xs, &ys, 0.0, 0.0).unwrap(), 0.0);
/// assert_eq!(interp_or(1.5, &xs, &ys, 0.0, 0.0).unwrap(), 15.0);
/// ```
pub fn interp_or(
    x: f64,
    xs: &[f64],
    ys: &[f64],
    left: f64,
    right: f64,
) -> Result<f64, InterpError> {
    check_table(xs, ys)?;

    if x < xs[0] {
        return Ok(left);
    }
    if x > xs[xs.len() - 1] {
        return Ok(right);
    }
    Ok(interp_inside(x, xs, ys))
}

/// Linear interpolation holding the edge values outside the table.
pub fn interp_clamped(x: f64, xs: &[f64], ys: &[f64]) -> Result<f64, InterpError> {
    check_table(xs, ys)?;
    let n = xs.len();
    interp_or(x, xs, ys, ys[0], ys[n - 1])
}

/// Trapezoidal integral of `ys` sampled at `xs`.
///
/// Returns 0.0 for fewer than two samples.
pub fn trapz(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}

/// `n` evenly spaced samples over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_match() {
        let xs = vec![1.0, 2.0, 3.0, 4.0];
        let ys = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(interp(2.0, &xs, &ys).unwrap(), 20.0);
        assert_eq!(interp(4.0, &xs, &ys).unwrap(), 40.0);
    }

    #[test]
    fn test_strict_rejects_out_of_range() {
        let xs = vec![1.0, 2.0];
        let ys = vec![1.0, 2.0];
        assert_eq!(
            interp(0.0, &xs, &ys),
            Err(InterpError::OutOfBounds(0.0, 1.0, 2.0))
        );
    }

    #[test]
    fn test_table_validation() {
        assert_eq!(
            interp(1.0, &[1.0], &[1.0]),
            Err(InterpError::InsufficientData)
        );
        assert_eq!(
            interp(1.0, &[1.0, 2.0], &[1.0]),
            Err(InterpError::MismatchedLengths)
        );
        assert_eq!(
            interp(1.0, &[2.0, 1.0], &[1.0, 2.0]),
            Err(InterpError::UnsortedData)
        );
    }

    #[test]
    fn test_fill_and_clamp() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [5.0, 7.0, 9.0];
        assert_eq!(interp_or(0.0, &xs, &ys, -1.0, -2.0).unwrap(), -1.0);
        assert_eq!(interp_or(4.0, &xs, &ys, -1.0, -2.0).unwrap(), -2.0);
        assert_eq!(interp_clamped(0.0, &xs, &ys).unwrap(), 5.0);
        assert_eq!(interp_clamped(10.0, &xs, &ys).unwrap(), 9.0);
        assert_relative_eq!(interp_clamped(2.5, &xs, &ys).unwrap(), 8.0);
    }

    #[test]
    fn test_trapz_linear() {
        let xs = linspace(0.0, 2.0, 21);
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x).collect();
        assert_relative_eq!(trapz(&xs, &ys), 6.0, epsilon = 1e-12);
        assert_eq!(trapz(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_linspace_endpoints() {
        let pts = linspace(0.5, 2.9, 1000);
        assert_eq!(pts.len(), 1000);
        assert_eq!(pts[0], 0.5);
        assert_relative_eq!(pts[999], 2.9, epsilon = 1e-12);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 1.0, 1), vec![3.0]);
    }
}
