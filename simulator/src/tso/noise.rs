//! Detector noise model applied to the ideal ramps.
//!
//! Each integration is processed independently, group by group:
//!
//! 1. **Dark ramp**: `dark × (g+1)` frames of dark signal, plus optional read noise
//! 2. **Signal**: ideal counts in electrons, optionally scaled by photon yield
//!    and scattered at the requested SNR; plus zodiacal background
//! 3. **Bias**: back to ADU and offset
//! 4. **Non-linearity**: per-pixel forward polynomial about the offset
//! 5. **Pedestal**: per-pixel bias pattern
//! 6. **Clamp** at zero
//!
//! Integrations run in parallel, each with an RNG seeded from the base seed
//! plus its index so output is reproducible for a fixed seed.

use log::{debug, warn};
use ndarray::{s, Array2, Array3, Array4, ArrayView4, Axis, Zip};
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use shared::algo::process_axis_chunks_seeded;
use shared::image_proc::add_gaussian_noise;

use crate::config::NoiseConfig;
use crate::instrument::{
    CalibrationSet, SpectralOrder, SubarrayGeometry, TimeAxis, FULL_WELL_ADU,
};

use super::report::NoiseReport;

pub struct NoiseModel<'a> {
    calibration: &'a CalibrationSet,
    time: &'a TimeAxis,
    gain: f64,
    config: &'a NoiseConfig,
}

impl<'a> NoiseModel<'a> {
    pub fn new(
        calibration: &'a CalibrationSet,
        time: &'a TimeAxis,
        gain: f64,
        config: &'a NoiseConfig,
    ) -> Self {
        Self {
            calibration,
            time,
            gain,
            config,
        }
    }

    /// Per-pixel electrons per photon, averaged over orders weighted by
    /// their mean ideal signal. Pixels without signal get 1.
    pub fn photon_yield_factor(&self, order_ideals: &[(SpectralOrder, ArrayView4<'_, f64>)]) -> Array2<f64> {
        let shape = self.calibration.shape();
        let mut weighted = Array2::<f64>::zeros(shape);
        let mut weights = Array2::<f64>::zeros(shape);

        for (order, ideal) in order_ideals {
            let weight = ideal.sum_axis(Axis(0)).sum_axis(Axis(0));
            let yield_map = self
                .calibration
                .photon_yield()
                .index_axis(Axis(0), order.index());
            Zip::from(&mut weighted)
                .and(&weight)
                .and(&yield_map)
                .for_each(|acc, &w, &py| *acc += w * py);
            weights += &weight;
        }

        Zip::from(&mut weighted).and(&weights).for_each(|acc, &w| {
            *acc = if w > 0.0 { *acc / w } else { 1.0 };
        });
        weighted
    }

    /// Noise-free dark ramp in electrons, (groups, rows, cols).
    fn dark_ramp_electrons(&self) -> Array3<f64> {
        let dark = self.calibration.dark_signal();
        let mut ramp = Array3::zeros((self.time.ngroups(), dark.nrows(), dark.ncols()));
        for (g, mut frame) in ramp.axis_iter_mut(Axis(0)).enumerate() {
            let frames = (g + 1) as f64;
            frame.zip_mut_with(dark, |e, &d| *e = d * self.gain * frames);
        }
        ramp
    }

    /// Produce noisy ramps from `ideal` (integrations, groups, rows, cols).
    pub fn apply(
        &self,
        ideal: &Array4<f64>,
        photon_yield: Option<&Array2<f64>>,
        seed: u64,
    ) -> (Array4<f64>, NoiseReport) {
        let dark_ramp = self.dark_ramp_electrons();
        let zodiacal = self.calibration.zodiacal();
        let nonlinearity = self.calibration.nonlinearity();
        let pedestal = self.calibration.pedestal();
        let gain = self.gain;
        let offset = self.config.offset;
        let zodi_scale = self.config.zodi_scale;
        let read_noise = self.config.read_noise;
        let snr = self.config.snr;
        let elapsed: Vec<f64> = (0..self.time.ngroups())
            .map(|g| self.time.group_elapsed_s(g))
            .collect();
        let ncoeff = nonlinearity.len_of(Axis(0));

        let mut data = Array4::zeros(ideal.raw_dim());

        process_axis_chunks_seeded(&mut data, seed, 1, |n, mut chunk, rng| {
            let ideal_n = ideal.index_axis(Axis(0), n);
            let mut out = chunk.index_axis_mut(Axis(0), 0);
            let (_, rows, cols) = out.dim();

            // Noisy cumulative signal and the ideal signal it was built from
            let mut signal = Array2::<f64>::zeros((rows, cols));
            let mut previous_ideal = Array2::<f64>::zeros((rows, cols));

            for (g, mut frame) in out.axis_iter_mut(Axis(0)).enumerate() {
                frame.assign(&dark_ramp.index_axis(Axis(0), g));
                add_gaussian_noise(frame.view_mut(), read_noise, rng);

                let mut current = ideal_n.index_axis(Axis(0), g).mapv(|v| v * gain);
                if let Some(pyf) = photon_yield {
                    current *= pyf;
                }
                match snr {
                    Some(snr) => {
                        Zip::from(&mut signal)
                            .and(&current)
                            .and(&previous_ideal)
                            .for_each(|acc, &now, &before| {
                                let step = now - before;
                                let sigma = step.abs() / snr;
                                let z: f64 = rng.sample(StandardNormal);
                                *acc += (step + sigma * z).max(0.0);
                            });
                    }
                    None => signal.assign(&current),
                }
                previous_ideal = current;

                let zodi_time = zodi_scale * elapsed[g];
                Zip::from(&mut frame)
                    .and(&signal)
                    .and(zodiacal)
                    .for_each(|px, &sig, &zodi| {
                        *px = (*px + sig + zodi * zodi_time) / gain;
                    });

                // Non-linearity acts on counts above the bias, then pedestal and clamp
                for ((r, c), px) in frame.indexed_iter_mut() {
                    let x = *px;
                    let y = (0..ncoeff)
                        .rev()
                        .fold(0.0, |acc, k| acc * x + nonlinearity[[k, r, c]]);
                    *px = (offset + y + pedestal[[r, c]]).max(0.0);
                }
            }
        });

        let saturated_pixels = data.par_iter().filter(|&&v| v > FULL_WELL_ADU).count();
        if saturated_pixels > 0 {
            warn!("{saturated_pixels} pixels exceed the {FULL_WELL_ADU} ADU full well");
        }
        debug!(
            "Applied noise to {} integrations with seed {seed}",
            data.len_of(Axis(0))
        );

        (
            data,
            NoiseReport {
                seed,
                saturated_pixels,
            },
        )
    }
}

/// Overwrite the reference-pixel border of every frame with `counts`.
pub fn apply_reference_pixels(data: &mut Array4<f64>, geometry: &SubarrayGeometry, counts: f64) {
    let (_, _, rows, cols) = data.dim();
    let ref_cols = geometry.reference_cols.min(cols);
    let ref_rows = geometry.reference_rows.min(rows);

    data.slice_mut(s![.., .., .., ..ref_cols]).fill(counts);
    data.slice_mut(s![.., .., .., cols - ref_cols..]).fill(counts);
    data.slice_mut(s![.., .., rows - ref_rows.., ..]).fill(counts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Subarray;
    use approx::assert_relative_eq;

    fn flat_calibration(shape: (usize, usize), dark: f64, nl: &[f64]) -> CalibrationSet {
        let (rows, cols) = shape;
        let mut nonlinearity = Array3::zeros((nl.len(), rows, cols));
        for (k, &c) in nl.iter().enumerate() {
            nonlinearity.index_axis_mut(Axis(0), k).fill(c);
        }
        CalibrationSet::new(
            shape,
            Array2::from_elem(shape, dark),
            nonlinearity,
            Array2::zeros(shape),
            Array2::zeros(shape),
            Array3::ones((2, rows, cols)),
        )
        .unwrap()
    }

    fn time(ngroups: usize, nints: usize) -> TimeAxis {
        TimeAxis::new(2.0, ngroups, nints, 1, 0.0).unwrap()
    }

    #[test]
    fn test_linear_detector_reproduces_ramp() {
        let cal = flat_calibration((4, 5), 0.5, &[0.0, 1.0]);
        let time = time(3, 2);
        let config = NoiseConfig::default();
        let model = NoiseModel::new(&cal, &time, 2.0, &config);

        let mut ideal = Array4::zeros((2, 3, 4, 5));
        for g in 0..3 {
            ideal.slice_mut(s![.., g, .., ..]).fill(10.0 * (g + 1) as f64);
        }
        let (data, report) = model.apply(&ideal, None, 1);
        for g in 0..3 {
            let expected = 500.0 + 0.5 * (g + 1) as f64 + 10.0 * (g + 1) as f64;
            assert_relative_eq!(data[[1, g, 2, 3]], expected, epsilon = 1e-9);
        }
        assert_eq!(report.saturated_pixels, 0);
        assert_eq!(report.seed, 1);
    }

    #[test]
    fn test_nonlinearity_about_offset() {
        let cal = flat_calibration((2, 2), 0.0, &[0.0, 1.0, -1e-3]);
        let time = time(1, 1);
        let config = NoiseConfig::default();
        let model = NoiseModel::new(&cal, &time, 1.0, &config);
        let ideal = Array4::from_elem((1, 1, 2, 2), 100.0);
        let (data, _) = model.apply(&ideal, None, 0);
        assert_relative_eq!(data[[0, 0, 0, 0]], 500.0 + 100.0 - 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let cal = flat_calibration((8, 8), 0.1, &[0.0, 1.0]);
        let time = time(4, 3);
        let config = NoiseConfig {
            snr: Some(50.0),
            read_noise: 3.0,
            ..NoiseConfig::default()
        };
        let model = NoiseModel::new(&cal, &time, 1.61, &config);
        let mut ideal = Array4::zeros((3, 4, 8, 8));
        for g in 0..4 {
            ideal.slice_mut(s![.., g, .., ..]).fill(1000.0 * (g + 1) as f64);
        }
        let (a, _) = model.apply(&ideal, None, 42);
        let (b, _) = model.apply(&ideal, None, 42);
        let (c, _) = model.apply(&ideal, None, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_snr_scatter_keeps_signal_monotonic() {
        let cal = flat_calibration((6, 6), 0.0, &[0.0, 1.0]);
        let time = time(5, 1);
        let config = NoiseConfig {
            snr: Some(5.0),
            ..NoiseConfig::default()
        };
        let model = NoiseModel::new(&cal, &time, 1.0, &config);
        let mut ideal = Array4::zeros((1, 5, 6, 6));
        for g in 0..5 {
            ideal.slice_mut(s![.., g, .., ..]).fill(200.0 * (g + 1) as f64);
        }
        let (data, _) = model.apply(&ideal, None, 9);
        for g in 1..5 {
            let diff = &data.slice(s![0, g, .., ..]) - &data.slice(s![0, g - 1, .., ..]);
            assert!(diff.iter().all(|&d| d >= 0.0));
        }
    }

    #[test]
    fn test_saturation_counted_and_clamped() {
        let cal = flat_calibration((2, 2), 0.0, &[0.0, 1.0]);
        let time = time(1, 1);
        let config = NoiseConfig {
            offset: -1000.0,
            ..NoiseConfig::default()
        };
        let model = NoiseModel::new(&cal, &time, 1.0, &config);
        let mut ideal = Array4::zeros((1, 1, 2, 2));
        ideal[[0, 0, 0, 0]] = 70_000.0;
        let (data, report) = model.apply(&ideal, None, 0);
        assert_eq!(report.saturated_pixels, 1);
        assert_eq!(data[[0, 0, 1, 1]], 0.0);
    }

    #[test]
    fn test_photon_yield_weighting() {
        let shape = (1, 2);
        let mut yields = Array3::ones((2, 1, 2));
        yields[[0, 0, 0]] = 1.2;
        yields[[1, 0, 0]] = 1.6;
        let cal = CalibrationSet::new(
            shape,
            Array2::zeros(shape),
            Array3::ones((1, 1, 2)),
            Array2::zeros(shape),
            Array2::zeros(shape),
            yields,
        )
        .unwrap();
        let time = time(1, 1);
        let config = NoiseConfig::default();
        let model = NoiseModel::new(&cal, &time, 1.0, &config);

        let mut first = Array4::zeros((1, 1, 1, 2));
        first[[0, 0, 0, 0]] = 3.0;
        let mut second = Array4::zeros((1, 1, 1, 2));
        second[[0, 0, 0, 0]] = 1.0;
        let pyf = model.photon_yield_factor(&[
            (SpectralOrder::First, first.view()),
            (SpectralOrder::Second, second.view()),
        ]);
        assert_relative_eq!(pyf[[0, 0]], (3.0 * 1.2 + 1.6) / 4.0, epsilon = 1e-12);
        assert_eq!(pyf[[0, 1]], 1.0);
    }

    #[test]
    fn test_reference_pixel_border() {
        let geometry = Subarray::Substrip96.geometry();
        let mut data = Array4::from_elem((1, 2, 96, 2048), 7.0);
        apply_reference_pixels(&mut data, &geometry, 0.0);
        assert!(data.slice(s![.., .., .., ..4]).iter().all(|&v| v == 0.0));
        assert!(data.slice(s![.., .., .., 2044..]).iter().all(|&v| v == 0.0));
        assert!(data.slice(s![.., .., 92.., ..]).iter().all(|&v| v == 0.0));
        assert_eq!(data[[0, 1, 50, 1000]], 7.0);
        assert_eq!(data[[0, 1, 91, 4]], 7.0);
    }
}
