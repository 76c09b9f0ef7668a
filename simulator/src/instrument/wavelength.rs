//! Pixel-to-wavelength solutions.

use ndarray::{Array2, Axis};
use shared::algo::{polyfit, polyval, PolyfitError};

use super::trace::TracePolynomial;
use super::{SpectralOrder, SubarrayGeometry};

/// Half-height in rows of the synthetic trace footprint
const FOOTPRINT_HALF_ROWS: f64 = 20.0;

/// Wavelength in µm of every detector pixel for one order
///
/// Pixels outside the order's footprint hold 0.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthMap {
    map: Array2<f64>,
}

impl WavelengthMap {
    pub fn new(map: Array2<f64>) -> Self {
        Self { map }
    }

    /// Built-in dispersion solution: a quadratic in column, constant along
    /// the cross-dispersion direction within the footprint of the trace.
    pub fn synthetic(
        order: SpectralOrder,
        geometry: &SubarrayGeometry,
        trace: &TracePolynomial,
    ) -> Self {
        let (c0, c1, c2) = match order {
            SpectralOrder::First => (2.833, -9.2e-4, -2.5e-8),
            SpectralOrder::Second => (1.42, -4.6e-4, -1.0e-8),
        };

        let map = Array2::from_shape_fn(geometry.shape(), |(row, col)| {
            let x = col as f64;
            let center = trace.row_at(x);
            let wavelength = c0 + c1 * x + c2 * x * x;
            if (row as f64 - center).abs() <= FOOTPRINT_HALF_ROWS && wavelength > 0.0 {
                wavelength
            } else {
                0.0
            }
        });
        Self { map }
    }

    pub fn map(&self) -> &Array2<f64> {
        &self.map
    }

    pub fn shape(&self) -> (usize, usize) {
        self.map.dim()
    }

    /// One wavelength per column: the mean over the column's illuminated
    /// (non-zero) pixels, or 0 for a dark column.
    pub fn column_wavelengths(&self) -> Vec<f64> {
        self.map
            .axis_iter(Axis(1))
            .map(|column| {
                let (sum, n) = column
                    .iter()
                    .filter(|v| v.is_finite() && **v > 0.0)
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n == 0 {
                    0.0
                } else {
                    sum / n as f64
                }
            })
            .collect()
    }
}

/// Wavelength interval in Ångström covered by each column.
///
/// A straight line is fitted to the column-to-column wavelength step as a
/// function of wavelength and evaluated at each column, which smooths out
/// pixel-level jitter in the map. Columns with no wavelength get 0.
///
/// Fails when fewer than two adjacent illuminated columns exist.
pub fn column_dispersion_angstrom(column_wavelengths: &[f64]) -> Result<Vec<f64>, PolyfitError> {
    let (waves, steps): (Vec<f64>, Vec<f64>) = column_wavelengths
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[0], w[1] - w[0]))
        .unzip();

    let coeffs = polyfit(&waves, &steps, 1)?;

    Ok(column_wavelengths
        .iter()
        .map(|&w| {
            if w > 0.0 {
                // µm -> Å
                polyval(&coeffs, w).abs() * 1e4
            } else {
                0.0
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Subarray;
    use approx::assert_relative_eq;

    fn synthetic(order: SpectralOrder) -> WavelengthMap {
        let geometry = Subarray::Substrip256.geometry();
        let trace = TracePolynomial::synthetic(order, Subarray::Substrip256);
        WavelengthMap::synthetic(order, &geometry, &trace)
    }

    #[test]
    fn test_footprint_is_zero_outside() {
        let map = synthetic(SpectralOrder::First);
        assert_eq!(map.shape(), (256, 2048));
        assert_eq!(map.map()[[0, 100]], 0.0);
        assert_eq!(map.map()[[255, 100]], 0.0);
        assert!(map.map()[[85, 100]] > 0.0);
    }

    #[test]
    fn test_column_wavelengths_decrease() {
        let waves = synthetic(SpectralOrder::First).column_wavelengths();
        assert_eq!(waves.len(), 2048);
        assert_relative_eq!(waves[0], 2.833, epsilon = 1e-12);
        assert!(waves.windows(2).all(|w| w[1] < w[0]));
        assert!(waves[2047] > 0.8 && waves[2047] < 1.0);
    }

    #[test]
    fn test_dark_column_has_zero_wavelength() {
        let mut raw = Array2::<f64>::zeros((4, 3));
        raw[[1, 0]] = 2.0;
        raw[[2, 0]] = 4.0;
        raw[[0, 2]] = 1.0;
        let waves = WavelengthMap::new(raw).column_wavelengths();
        assert_eq!(waves, vec![3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_dispersion_matches_derivative() {
        let waves = synthetic(SpectralOrder::First).column_wavelengths();
        let disp = column_dispersion_angstrom(&waves).unwrap();
        // dλ/dx = -9.2e-4 - 5e-8 x  µm/px
        let expected = (9.2e-4 + 5e-8 * 1000.0) * 1e4;
        assert_relative_eq!(disp[1000], expected, max_relative = 1e-3);
        assert!(disp.iter().all(|&d| d > 0.0));
    }

    #[test]
    fn test_dispersion_needs_adjacent_columns() {
        let mut waves = vec![0.0; 2048];
        waves[1000] = 1.5;
        assert!(matches!(
            column_dispersion_angstrom(&waves),
            Err(PolyfitError::InsufficientData { got: 0, .. })
        ));
    }
}
