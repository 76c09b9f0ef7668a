//! Per-column count-rate time series.
//!
//! Each detector column of an order sees one wavelength. The stellar flux
//! density there is converted to photons, then to ADU/s through the column
//! dispersion and collecting area. It is optionally dimmed by the transit
//! light curve and then weighted by the order throughput.

use log::{debug, warn};
use ndarray::{s, Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::error::{SkipReason, SkippedUnit};
use crate::instrument::{Filter, OrderModel};
use crate::photometry::{energy_to_photon_flux, Spectrum, TransmissionSpectrum};
use crate::transit::{LdcMap, LimbDarkeningLaw, TransitModel};

/// Planet radius source for the transit light curves
#[derive(Clone, Copy)]
pub enum PlanetRadius<'a> {
    /// One Rp/R* for every wavelength
    Gray(f64),
    Spectrum(&'a TransmissionSpectrum),
}

impl PlanetRadius<'_> {
    pub fn at(&self, wavelength_um: f64) -> f64 {
        match self {
            PlanetRadius::Gray(rp) => *rp,
            PlanetRadius::Spectrum(spectrum) => spectrum.radius_ratio_at(wavelength_um),
        }
    }
}

/// Everything needed to evaluate the transit at one column
#[derive(Clone, Copy)]
pub struct TransitInputs<'a> {
    pub model: &'a dyn TransitModel,
    /// Sky-projected separation at each frame (stellar radii)
    pub separations: &'a [f64],
    pub law: LimbDarkeningLaw,
    pub ldc: &'a LdcMap,
    pub planet: PlanetRadius<'a>,
}

pub struct LightcurveSynthesizer<'a> {
    pub star: &'a Spectrum,
    pub filter: Filter,
    /// Lower bound on every sample (ADU/s)
    pub floor: f64,
    pub nframes: usize,
    pub transit: Option<TransitInputs<'a>>,
}

impl<'a> LightcurveSynthesizer<'a> {
    pub fn new(star: &'a Spectrum, filter: Filter, floor: f64, nframes: usize) -> Self {
        Self {
            star,
            filter,
            floor,
            nframes,
            transit: None,
        }
    }

    pub fn with_transit(mut self, transit: TransitInputs<'a>) -> Self {
        self.transit = Some(transit);
        self
    }

    /// Columns at these wavelengths only ever receive the floor.
    pub fn is_background(&self, wavelength_um: f64) -> bool {
        wavelength_um <= 0.0 || !self.star.covers(wavelength_um) || !self.filter.transmits(wavelength_um)
    }

    /// Count rate (ADU/s) of `column` at every frame.
    pub fn column(&self, model: &OrderModel, column: usize) -> Result<Vec<f64>, SkipReason> {
        let wavelength = model.wavelength(column);
        if self.is_background(wavelength) {
            return Ok(vec![self.floor; self.nframes]);
        }

        let photons = energy_to_photon_flux(self.star.flux_at(wavelength), wavelength);
        let rate = photons * model.pfd2adu(column);
        let mut series = vec![rate; self.nframes];

        if let Some(transit) = &self.transit {
            let coeffs = transit.ldc.column(model.order(), column)?;
            let rp = transit.planet.at(wavelength);
            let curve = transit
                .model
                .light_curve(transit.separations, rp, transit.law, &coeffs);
            if curve.len() != self.nframes || curve.iter().any(|f| !f.is_finite()) {
                return Err(SkipReason::DegenerateTransit);
            }
            series.iter_mut().zip(curve).for_each(|(s, f)| *s *= f);
        }

        let response = model.response(column);
        series
            .iter_mut()
            .for_each(|s| *s = (*s * response).max(self.floor));
        Ok(series)
    }

    /// Rates of every column in the order's valid range, shaped (cols, frames).
    ///
    /// Columns outside the valid range and skipped columns stay zero.
    pub fn synthesize(&self, model: &OrderModel) -> (Array2<f64>, Vec<SkippedUnit>) {
        let mut rates = Array2::zeros((model.ncols(), self.nframes));
        let valid = model.valid_columns();
        let first = valid.start;

        let skipped: Vec<SkippedUnit> = rates
            .slice_mut(s![valid, ..])
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .filter_map(|(offset, mut row)| {
                let column = first + offset;
                match self.column(model, column) {
                    Ok(series) => {
                        row.assign(&ArrayView1::from(&series));
                        None
                    }
                    Err(reason) => Some(SkippedUnit {
                        order: model.order().number(),
                        column,
                        wavelength_um: model.wavelength(column),
                        reason,
                    }),
                }
            })
            .collect();

        if let Some(first_skip) = skipped.first() {
            warn!(
                "Skipped {} columns of {}; first: {}",
                skipped.len(),
                model.order(),
                first_skip
            );
        }
        debug!(
            "Synthesized {} light curves for {}",
            model.valid_columns().len() - skipped.len(),
            model.order()
        );
        (rates, skipped)
    }
}
