//! Relative spectral response of each order through the optics and filter.

use once_cell::sync::Lazy;
use shared::algo::interp_or;

use crate::error::TsoError;

use super::{Filter, SpectralOrder};

/// Tabulated grism + detector throughput for order 1, (µm, relative response)
static ORDER1_THROUGHPUT: Lazy<SpectralResponse> = Lazy::new(|| {
    SpectralResponse::from_knots(&[
        (0.80, 0.05),
        (0.90, 0.22),
        (1.00, 0.38),
        (1.20, 0.55),
        (1.40, 0.62),
        (1.60, 0.64),
        (1.80, 0.63),
        (2.00, 0.60),
        (2.20, 0.55),
        (2.40, 0.49),
        (2.60, 0.42),
        (2.80, 0.33),
        (3.00, 0.20),
    ])
});

/// Tabulated grism + detector throughput for order 2, (µm, relative response)
static ORDER2_THROUGHPUT: Lazy<SpectralResponse> = Lazy::new(|| {
    SpectralResponse::from_knots(&[
        (0.45, 0.02),
        (0.55, 0.10),
        (0.65, 0.21),
        (0.75, 0.28),
        (0.85, 0.30),
        (0.95, 0.28),
        (1.10, 0.22),
        (1.25, 0.14),
        (1.40, 0.06),
        (1.50, 0.02),
    ])
});

/// Throughput curve sampled on an ascending wavelength grid
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralResponse {
    wavelength_um: Vec<f64>,
    throughput: Vec<f64>,
}

impl SpectralResponse {
    pub fn new(wavelength_um: Vec<f64>, throughput: Vec<f64>) -> Result<Self, TsoError> {
        if wavelength_um.len() != throughput.len() || wavelength_um.len() < 2 {
            return Err(TsoError::MalformedReferenceData(format!(
                "response table needs matching columns of at least 2 samples, got {} and {}",
                wavelength_um.len(),
                throughput.len()
            )));
        }
        if wavelength_um.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TsoError::MalformedReferenceData(
                "response wavelengths must be strictly increasing".to_string(),
            ));
        }
        if throughput.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(TsoError::MalformedReferenceData(
                "response values must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self {
            wavelength_um,
            throughput,
        })
    }

    fn from_knots(knots: &[(f64, f64)]) -> Self {
        let (wavelength_um, throughput) = knots.iter().copied().unzip();
        Self {
            wavelength_um,
            throughput,
        }
    }

    /// Built-in response of `order` seen through `filter`.
    ///
    /// Narrow-band filters multiply the grism throughput by a soft-edged
    /// top hat over their passband.
    pub fn synthetic(order: SpectralOrder, filter: Filter) -> Self {
        let base = match order {
            SpectralOrder::First => &*ORDER1_THROUGHPUT,
            SpectralOrder::Second => &*ORDER2_THROUGHPUT,
        };
        let Some((lo, hi)) = filter.passband_um() else {
            return base.clone();
        };

        // Resample onto a fine grid so the filter edges are resolved
        let n = 400;
        let (start, end) = (base.wavelength_um[0], base.wavelength_um[base.wavelength_um.len() - 1]);
        let step = (end - start) / (n - 1) as f64;
        let edge = 0.01;
        let (wavelength_um, throughput) = (0..n)
            .map(|i| {
                let w = start + step * i as f64;
                let filter_t = 0.92 / (1.0 + (-(w - lo) / edge).exp())
                    / (1.0 + ((w - hi) / edge).exp());
                (w, base.at(w) * filter_t)
            })
            .unzip();
        Self {
            wavelength_um,
            throughput,
        }
    }

    /// Relative response at `wavelength_um`, zero outside the table.
    pub fn at(&self, wavelength_um: f64) -> f64 {
        interp_or(
            wavelength_um,
            &self.wavelength_um,
            &self.throughput,
            0.0,
            0.0,
        )
        .unwrap_or(0.0)
    }

    pub fn wavelength_um(&self) -> &[f64] {
        &self.wavelength_um
    }

    pub fn throughput(&self) -> &[f64] {
        &self.throughput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clear_response_shape() {
        let r1 = SpectralResponse::synthetic(SpectralOrder::First, Filter::Clear);
        assert_relative_eq!(r1.at(1.6), 0.64);
        assert_relative_eq!(r1.at(1.5), 0.63, epsilon = 1e-12);
        assert_eq!(r1.at(0.5), 0.0);
        assert_eq!(r1.at(3.5), 0.0);

        let r2 = SpectralResponse::synthetic(SpectralOrder::Second, Filter::Clear);
        assert!(r2.at(0.85) > r2.at(1.4));
    }

    #[test]
    fn test_f277w_blocks_outside_passband() {
        let r = SpectralResponse::synthetic(SpectralOrder::First, Filter::F277W);
        let clear = SpectralResponse::synthetic(SpectralOrder::First, Filter::Clear);
        assert!(r.at(1.5) < 1e-10);
        assert!(r.at(2.8) > 0.8 * clear.at(2.8));
        assert!(r.at(2.8) <= clear.at(2.8));
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(SpectralResponse::new(vec![1.0], vec![1.0]).is_err());
        assert!(SpectralResponse::new(vec![2.0, 1.0], vec![1.0, 1.0]).is_err());
        assert!(SpectralResponse::new(vec![1.0, 2.0], vec![1.0, -1.0]).is_err());
        assert!(SpectralResponse::new(vec![1.0, 2.0], vec![1.0, 0.5]).is_ok());
    }
}
