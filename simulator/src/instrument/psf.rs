//! Point-spread functions of the dispersed orders.
//!
//! The spectrograph is heavily defocused in the cross-dispersion direction,
//! so the monochromatic PSF is a flat-topped profile across rows and a
//! diffraction-limited core (growing with wavelength) along the dispersion
//! direction. [`PsfCube`] tabulates normalized kernels on a wavelength grid
//! for fast lookup during frame assembly.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use shared::algo::linspace;

use crate::error::TsoError;

/// Tolerance on the unit sum of each cube slice
const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// A monochromatic PSF generator
pub trait PsfModel: Send + Sync {
    /// Kernel shape (rows, cols); both odd so the kernel has a center pixel.
    fn shape(&self) -> (usize, usize);

    /// Kernel at `wavelength_um`, normalized to unit sum.
    fn kernel(&self, wavelength_um: f64) -> Array2<f64>;
}

/// Flat-topped cross-dispersion profile times a Gaussian dispersion core
#[derive(Debug, Clone, PartialEq)]
pub struct DefocusedPsf {
    /// Kernel side length in pixels (odd)
    pub size: usize,
    /// Full width of the flat top in rows
    pub plateau_rows: f64,
    /// Logistic softening length of the plateau edges in rows
    pub edge_softness: f64,
    /// Gaussian sigma along the dispersion direction per µm of wavelength
    pub sigma_px_per_um: f64,
}

impl Default for DefocusedPsf {
    fn default() -> Self {
        Self {
            size: 41,
            plateau_rows: 11.0,
            edge_softness: 1.0,
            sigma_px_per_um: 0.9,
        }
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl PsfModel for DefocusedPsf {
    fn shape(&self) -> (usize, usize) {
        (self.size, self.size)
    }

    fn kernel(&self, wavelength_um: f64) -> Array2<f64> {
        let half = (self.size / 2) as f64;
        let sigma = (self.sigma_px_per_um * wavelength_um).max(0.3);
        let half_plateau = self.plateau_rows / 2.0;
        let soft = self.edge_softness.max(1e-3);

        let row_profile: Vec<f64> = (0..self.size)
            .map(|i| {
                let dy = i as f64 - half;
                logistic((dy + half_plateau) / soft) - logistic((dy - half_plateau) / soft)
            })
            .collect();
        let col_profile: Vec<f64> = (0..self.size)
            .map(|j| {
                let dx = j as f64 - half;
                (-0.5 * (dx / sigma).powi(2)).exp()
            })
            .collect();

        let mut kernel = Array2::from_shape_fn((self.size, self.size), |(i, j)| {
            row_profile[i] * col_profile[j]
        });
        let total = kernel.sum();
        if total > 0.0 {
            kernel /= total;
        }
        kernel
    }
}

/// Normalized PSF kernels tabulated on an ascending wavelength grid
#[derive(Debug, Clone, PartialEq)]
pub struct PsfCube {
    wavelengths_um: Vec<f64>,
    cube: Array3<f64>,
}

impl PsfCube {
    /// Wrap externally supplied kernels, checking shape and normalization.
    pub fn new(wavelengths_um: Vec<f64>, cube: Array3<f64>) -> Result<Self, TsoError> {
        let (n, rows, cols) = cube.dim();
        if n == 0 || n != wavelengths_um.len() {
            return Err(TsoError::MalformedReferenceData(format!(
                "PSF cube has {n} slices for {} wavelengths",
                wavelengths_um.len()
            )));
        }
        if rows % 2 == 0 || cols % 2 == 0 {
            return Err(TsoError::MalformedReferenceData(format!(
                "PSF kernel shape ({rows}, {cols}) must be odd in both axes"
            )));
        }
        if wavelengths_um.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TsoError::MalformedReferenceData(
                "PSF wavelength grid must be strictly increasing".to_string(),
            ));
        }
        for (idx, slice) in cube.axis_iter(Axis(0)).enumerate() {
            if slice.iter().any(|v| !v.is_finite()) {
                return Err(TsoError::MalformedReferenceData(format!(
                    "PSF slice {idx} contains non-finite values"
                )));
            }
            let total = slice.sum();
            if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
                return Err(TsoError::MalformedReferenceData(format!(
                    "PSF slice {idx} sums to {total}, expected 1"
                )));
            }
        }
        Ok(Self {
            wavelengths_um,
            cube,
        })
    }

    /// Tabulate a PSF model on the given wavelength grid.
    pub fn from_model(model: &dyn PsfModel, wavelengths_um: Vec<f64>) -> Self {
        let (rows, cols) = model.shape();
        let mut cube = Array3::zeros((wavelengths_um.len(), rows, cols));
        for (mut slice, &w) in cube.axis_iter_mut(Axis(0)).zip(&wavelengths_um) {
            slice.assign(&model.kernel(w));
        }
        Self {
            wavelengths_um,
            cube,
        }
    }

    /// Default defocused PSF sampled every 0.02 µm over 0.4–3.0 µm.
    pub fn synthetic() -> Self {
        Self::from_model(&DefocusedPsf::default(), linspace(0.4, 3.0, 131))
    }

    pub fn wavelengths_um(&self) -> &[f64] {
        &self.wavelengths_um
    }

    pub fn kernel_shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.cube.dim();
        (rows, cols)
    }

    /// Index of the slice whose wavelength is closest to `wavelength_um`.
    pub fn nearest_index(&self, wavelength_um: f64) -> usize {
        let idx = self.wavelengths_um.partition_point(|&w| w < wavelength_um);
        if idx == 0 {
            return 0;
        }
        if idx == self.wavelengths_um.len() {
            return idx - 1;
        }
        if (wavelength_um - self.wavelengths_um[idx - 1]) <= (self.wavelengths_um[idx] - wavelength_um)
        {
            idx - 1
        } else {
            idx
        }
    }

    pub fn slice(&self, index: usize) -> ArrayView2<'_, f64> {
        self.cube.index_axis(Axis(0), index)
    }

    pub fn kernel(&self, wavelength_um: f64) -> ArrayView2<'_, f64> {
        self.slice(self.nearest_index(wavelength_um))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_normalized_and_centered() {
        let psf = DefocusedPsf::default();
        let k = psf.kernel(1.5);
        assert_eq!(k.dim(), (41, 41));
        assert_relative_eq!(k.sum(), 1.0, epsilon = 1e-12);

        let max = k.iter().cloned().fold(f64::MIN, f64::max);
        assert_relative_eq!(k[[20, 20]], max, epsilon = 1e-15);
        // symmetric in both axes
        assert_relative_eq!(k[[15, 18]], k[[25, 22]], epsilon = 1e-12);
    }

    #[test]
    fn test_plateau_is_flat() {
        let k = DefocusedPsf::default().kernel(1.0);
        assert_relative_eq!(k[[18, 20]], k[[22, 20]], epsilon = 1e-12);
        assert!(k[[20, 20]] / k[[23, 20]] < 1.1);
        assert!(k[[40, 20]] < 1e-4 * k[[20, 20]]);
    }

    #[test]
    fn test_core_widens_with_wavelength() {
        let psf = DefocusedPsf::default();
        let blue = psf.kernel(0.8);
        let red = psf.kernel(2.8);
        assert!(red[[20, 23]] / red[[20, 20]] > blue[[20, 23]] / blue[[20, 20]]);
    }

    #[test]
    fn test_nearest_lookup() {
        let cube = PsfCube::from_model(&DefocusedPsf::default(), vec![1.0, 2.0, 3.0]);
        assert_eq!(cube.nearest_index(0.2), 0);
        assert_eq!(cube.nearest_index(1.4), 0);
        assert_eq!(cube.nearest_index(1.6), 1);
        assert_eq!(cube.nearest_index(2.0), 1);
        assert_eq!(cube.nearest_index(9.0), 2);
    }

    #[test]
    fn test_validation() {
        let good = PsfCube::synthetic();
        assert!(PsfCube::new(good.wavelengths_um().to_vec(), good.cube.clone()).is_ok());

        let mut bad = good.cube.clone();
        bad[[0, 20, 20]] += 0.5;
        assert!(matches!(
            PsfCube::new(good.wavelengths_um().to_vec(), bad),
            Err(TsoError::MalformedReferenceData(_))
        ));

        assert!(PsfCube::new(vec![1.0], Array3::zeros((2, 3, 3))).is_err());
        assert!(PsfCube::new(vec![1.0], Array3::from_elem((1, 2, 2), 0.25)).is_err());
    }
}
