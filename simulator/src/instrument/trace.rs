//! Trace center-line polynomials.

use std::ops::Range;

use shared::algo::{polyfit, polyval, PolyfitError};

use super::{SpectralOrder, Subarray};

/// Row of the trace center as a polynomial in detector column
///
/// Coefficients are highest degree first. Rows are expressed in the frame of
/// the subarray the polynomial was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct TracePolynomial {
    coeffs: Vec<f64>,
    valid_columns: Range<usize>,
}

impl TracePolynomial {
    pub fn new(coeffs: Vec<f64>, valid_columns: Range<usize>) -> Self {
        Self {
            coeffs,
            valid_columns,
        }
    }

    /// Fit a trace to measured (column, row) centers.
    pub fn fit(
        columns: &[f64],
        rows: &[f64],
        degree: usize,
        valid_columns: Range<usize>,
    ) -> Result<Self, PolyfitError> {
        Ok(Self::new(polyfit(columns, rows, degree)?, valid_columns))
    }

    /// Built-in trace for an order, shifted into the subarray's row frame.
    pub fn synthetic(order: SpectralOrder, subarray: Subarray) -> Self {
        let (mut coeffs, valid) = match order {
            SpectralOrder::First => (vec![-1.6e-9, 7.5e-6, -1.15e-2, 86.0], 4..2044),
            SpectralOrder::Second => (vec![2.0e-9, -1.0e-6, 0.05, 130.0], 4..1750),
        };
        if let Some(c0) = coeffs.last_mut() {
            *c0 += subarray.row_offset_from_substrip256();
        }
        Self::new(coeffs, valid)
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn valid_columns(&self) -> Range<usize> {
        self.valid_columns.clone()
    }

    pub fn is_valid(&self, column: usize) -> bool {
        self.valid_columns.contains(&column)
    }

    /// Center row of the trace at `column`.
    pub fn row_at(&self, column: f64) -> f64 {
        polyval(&self.coeffs, column)
    }
}
