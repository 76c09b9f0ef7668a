//! Detector calibration maps consumed by the noise model.
//!
//! - **Dark signal**: dark current per frame (ADU), negatives clamped to 0
//! - **Non-linearity**: forward polynomial coefficients per pixel, ascending powers
//! - **Pedestal**: per-pixel bias (ADU)
//! - **Zodiacal background**: e⁻/s per pixel at unit scale
//! - **Photon yield**: per-order, per-pixel electrons per detected photon

use log::debug;
use ndarray::{s, Array1, Array2, Array3, Axis};
use shared::image_proc::gaussian_field;

use crate::error::TsoError;

use super::wavelength::WavelengthMap;
use super::{SpectralOrder, SubarrayGeometry};

/// Columns read out by one amplifier
const AMPLIFIER_WIDTH: usize = 512;

/// Seed for the built-in calibration patterns
pub const SYNTHETIC_CALIBRATION_SEED: u64 = 0x5055_5353;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSet {
    dark_signal: Array2<f64>,
    nonlinearity: Array3<f64>,
    pedestal: Array2<f64>,
    zodiacal: Array2<f64>,
    photon_yield: Array3<f64>,
}

fn check_finite(name: &str, values: impl IntoIterator<Item = f64>) -> Result<(), TsoError> {
    if values.into_iter().any(|v| !v.is_finite()) {
        return Err(TsoError::MalformedReferenceData(format!(
            "{name} contains non-finite values"
        )));
    }
    Ok(())
}

fn check_shape(name: &str, got: &[usize], expected: &[usize]) -> Result<(), TsoError> {
    if got != expected {
        return Err(TsoError::MalformedReferenceData(format!(
            "{name} has shape {got:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

impl CalibrationSet {
    /// Validate maps against the subarray shape `(rows, cols)`.
    pub fn new(
        shape: (usize, usize),
        mut dark_signal: Array2<f64>,
        nonlinearity: Array3<f64>,
        pedestal: Array2<f64>,
        zodiacal: Array2<f64>,
        photon_yield: Array3<f64>,
    ) -> Result<Self, TsoError> {
        let (rows, cols) = shape;
        check_shape("dark signal", dark_signal.shape(), &[rows, cols])?;
        check_shape("pedestal", pedestal.shape(), &[rows, cols])?;
        check_shape("zodiacal background", zodiacal.shape(), &[rows, cols])?;

        let ncoeff = nonlinearity.len_of(Axis(0));
        if ncoeff == 0 {
            return Err(TsoError::MalformedReferenceData(
                "non-linearity map has no coefficients".to_string(),
            ));
        }
        check_shape("non-linearity", nonlinearity.shape(), &[ncoeff, rows, cols])?;
        check_shape(
            "photon yield",
            photon_yield.shape(),
            &[SpectralOrder::ALL.len(), rows, cols],
        )?;

        check_finite("dark signal", dark_signal.iter().copied())?;
        check_finite("non-linearity", nonlinearity.iter().copied())?;
        check_finite("pedestal", pedestal.iter().copied())?;
        check_finite("zodiacal background", zodiacal.iter().copied())?;
        check_finite("photon yield", photon_yield.iter().copied())?;

        let negatives = dark_signal.iter().filter(|&&v| v < 0.0).count();
        if negatives > 0 {
            debug!("Clamping {negatives} negative dark signal pixels to zero");
            dark_signal.mapv_inplace(|v| v.max(0.0));
        }

        Ok(Self {
            dark_signal,
            nonlinearity,
            pedestal,
            zodiacal,
            photon_yield,
        })
    }

    /// Built-in calibration maps for a subarray.
    ///
    /// `order_maps` provides the wavelength maps of orders 1 and 2, used to
    /// lay out the photon-yield map (yield rises toward short wavelengths).
    pub fn synthetic(
        geometry: &SubarrayGeometry,
        order_maps: [&WavelengthMap; 2],
        seed: u64,
    ) -> Result<Self, TsoError> {
        let shape = geometry.shape();
        let (rows, cols) = shape;

        let dark_signal = gaussian_field(shape, 0.02, 0.005, seed);

        let mut nonlinearity = Array3::zeros((3, rows, cols));
        nonlinearity.index_axis_mut(Axis(0), 1).fill(1.0);
        nonlinearity.index_axis_mut(Axis(0), 2).fill(-1.5e-6);

        let amp_levels = [0.0, 3.0, -2.0, 1.5];
        let mut pedestal = gaussian_field(shape, 0.0, 0.5, seed.wrapping_add(1));
        for (amp, level) in amp_levels.iter().enumerate() {
            let lo = (amp * AMPLIFIER_WIDTH).min(cols);
            let hi = ((amp + 1) * AMPLIFIER_WIDTH).min(cols);
            pedestal.slice_mut(s![.., lo..hi]).mapv_inplace(|v| v + level);
        }

        // Gentle gradient along rows around 0.5 e⁻/s
        let row_scale = Array1::from_shape_fn(rows, |r| 1.0 + 0.1 * r as f64 / rows.max(1) as f64);
        let mut zodiacal = Array2::from_elem(shape, 0.5);
        zodiacal *= &row_scale.insert_axis(Axis(1));

        let mut photon_yield = Array3::ones((SpectralOrder::ALL.len(), rows, cols));
        for (mut layer, map) in photon_yield.axis_iter_mut(Axis(0)).zip(order_maps) {
            check_shape("wavelength map", &[map.shape().0, map.shape().1], &[rows, cols])?;
            layer.zip_mut_with(map.map(), |py, &w| {
                if w > 0.0 {
                    *py = photon_yield_at(w);
                }
            });
        }

        Self::new(
            shape,
            dark_signal,
            nonlinearity,
            pedestal,
            zodiacal,
            photon_yield,
        )
    }

    pub fn shape(&self) -> (usize, usize) {
        self.dark_signal.dim()
    }

    pub fn dark_signal(&self) -> &Array2<f64> {
        &self.dark_signal
    }

    pub fn nonlinearity(&self) -> &Array3<f64> {
        &self.nonlinearity
    }

    pub fn pedestal(&self) -> &Array2<f64> {
        &self.pedestal
    }

    pub fn zodiacal(&self) -> &Array2<f64> {
        &self.zodiacal
    }

    pub fn photon_yield(&self) -> &Array3<f64> {
        &self.photon_yield
    }
}

/// Mean electrons per absorbed photon; photons above ~2.5x the band gap
/// can free a second carrier.
fn photon_yield_at(wavelength_um: f64) -> f64 {
    const THRESHOLD_UM: f64 = 1.7;
    if wavelength_um >= THRESHOLD_UM {
        1.0
    } else {
        1.0 + 0.3 * (THRESHOLD_UM - wavelength_um) / THRESHOLD_UM
    }
}
