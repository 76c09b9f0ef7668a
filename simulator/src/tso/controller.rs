//! Simulation controller.
//!
//! A [`Tso`] owns the configuration, the stellar spectrum, the reference data
//! and the output tensors of one simulated exposure. [`Tso::run_simulation`]
//! recomputes every tensor from scratch:
//!
//! 1. light curves of every column of each order ([`LightcurveSynthesizer`])
//! 2. frames along the trace ([`FrameAssembler`]), summed over orders
//! 3. detector noise ([`NoiseModel`]) and the reference-pixel border
//!
//! All parallel work runs on a dedicated rayon pool sized by
//! [`SimulationConfig::max_workers`].

use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::{Array3, Array4, ArrayView4};
use rand::{thread_rng, RngCore};
use rayon::ThreadPool;
use shared::algo::build_worker_pool;

use crate::config::{NoiseConfig, SimulationConfig};
use crate::error::{TsoError, ValidationError};
use crate::instrument::{OrderModel, ReferenceData, SpectralOrder, TimeAxis};
use crate::photometry::{default_blackbody, Spectrum, TransmissionSpectrum};
use crate::transit::{
    derive_coefficient_map, GreyAtmosphere, IntegratedTransitModel, LdcMap, LimbDarkeningLaw,
    LimbDarkeningProvider, Orbit, StellarParameters, TransitModel, TransitParams,
};
use crate::units::Temperature;

use super::frames::FrameAssembler;
use super::lightcurve::{LightcurveSynthesizer, PlanetRadius, TransitInputs};
use super::metadata::ExposureMetadata;
use super::noise::{apply_reference_pixels, NoiseModel};
use super::report::{LdcSource, NoiseReport, RunReport};

/// Inputs of a single [`Tso::run_simulation`] call
#[derive(Debug, Clone)]
pub struct RunOptions {
    planet: Option<TransmissionSpectrum>,
    transit: Option<TransitParams>,
    ldc: Option<Array3<f64>>,
    noise: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            planet: None,
            transit: None,
            ldc: None,
            noise: true,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wavelength-dependent planet radius; needs [`RunOptions::with_transit`].
    pub fn with_planet(mut self, planet: TransmissionSpectrum) -> Self {
        self.planet = Some(planet);
        self
    }

    pub fn with_transit(mut self, params: TransitParams) -> Self {
        self.transit = Some(params);
        self
    }

    /// Explicit limb-darkening coefficients shaped (orders, columns, coefficients).
    pub fn with_ldc(mut self, coeffs: Array3<f64>) -> Self {
        self.ldc = Some(coeffs);
        self
    }

    /// Leave the exposure equal to the ideal ramps (plus the reference border).
    pub fn without_noise(mut self) -> Self {
        self.noise = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LdcCacheKey {
    stellar: StellarParameters,
    law: LimbDarkeningLaw,
}

/// A simulated time-series exposure
pub struct Tso {
    config: SimulationConfig,
    star: Spectrum,
    reference: ReferenceData,
    /// Order 1 then order 2
    models: [OrderModel; 2],
    orders: Vec<SpectralOrder>,
    time: TimeAxis,
    pool: ThreadPool,
    transit_model: Box<dyn TransitModel>,
    ldc_provider: Option<Arc<dyn LimbDarkeningProvider>>,
    ldc_cache: Option<(LdcCacheKey, LdcMap)>,
    planet: Option<TransmissionSpectrum>,
    transit: Option<TransitParams>,
    ideal: Array4<f64>,
    order_ideal: [Array4<f64>; 2],
    exposure: Array4<f64>,
    report: RunReport,
}

fn order_list(orders: &[SpectralOrder]) -> String {
    orders
        .iter()
        .map(|o| o.number().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Tso {
    /// Set up a simulation with the built-in reference data.
    pub fn initialize(config: SimulationConfig, star: Spectrum) -> Result<Self, TsoError> {
        config.validate()?;
        let reference = ReferenceData::synthetic(config.subarray, config.filter)?;
        Self::initialize_with_reference(config, star, reference)
    }

    /// Set up a simulation of a blackbody star on the default wavelength grid.
    pub fn blackbody(temperature: Temperature, config: SimulationConfig) -> Result<Self, TsoError> {
        let star = default_blackbody(temperature)?;
        Self::initialize(config, star)
    }

    pub fn initialize_with_reference(
        config: SimulationConfig,
        star: Spectrum,
        reference: ReferenceData,
    ) -> Result<Self, TsoError> {
        config.validate()?;
        reference.validate()?;

        let geometry = config.subarray.geometry();
        if reference.geometry != geometry {
            return Err(TsoError::MalformedReferenceData(format!(
                "reference data covers {:?} pixels, {} needs {:?}",
                reference.geometry.shape(),
                config.subarray,
                geometry.shape()
            )));
        }

        let requested = config.requested_orders()?;
        let orders = config.effective_orders()?;
        if orders != requested {
            info!(
                "{} only transmits order(s) {}; simulating those instead of {}",
                config.filter,
                order_list(&orders),
                order_list(&requested)
            );
        }

        let time = TimeAxis::for_subarray(
            config.subarray,
            config.ngroups,
            config.nints,
            config.start_time,
        )?;
        let models = [
            OrderModel::build(reference.order(SpectralOrder::First), &geometry, config.gain)?,
            OrderModel::build(reference.order(SpectralOrder::Second), &geometry, config.gain)?,
        ];
        let pool = build_worker_pool(config.max_workers)?;

        let shape = (config.nints, config.ngroups, geometry.rows, geometry.cols);
        info!(
            "Initialized {} {} exposure of '{}': {} integrations x {} groups, {}x{} pixels, order(s) {}",
            config.subarray,
            config.filter,
            config.target,
            config.nints,
            config.ngroups,
            geometry.rows,
            geometry.cols,
            order_list(&orders)
        );

        Ok(Self {
            config,
            star,
            reference,
            models,
            orders,
            time,
            pool,
            transit_model: Box::new(IntegratedTransitModel::default()),
            ldc_provider: Some(Arc::new(GreyAtmosphere::default())),
            ldc_cache: None,
            planet: None,
            transit: None,
            ideal: Array4::zeros(shape),
            order_ideal: std::array::from_fn(|_| Array4::zeros(shape)),
            exposure: Array4::zeros(shape),
            report: RunReport::default(),
        })
    }

    /// Replace the limb-darkening provider; `None` always broadcasts the
    /// transit parameters' own coefficients.
    pub fn set_ldc_provider(&mut self, provider: Option<Arc<dyn LimbDarkeningProvider>>) {
        self.ldc_provider = provider;
        self.ldc_cache = None;
    }

    pub fn set_transit_model(&mut self, model: Box<dyn TransitModel>) {
        self.transit_model = model;
    }

    /// Simulate the exposure, overwriting every output tensor.
    pub fn run_simulation(&mut self, options: RunOptions) -> Result<RunReport, TsoError> {
        let RunOptions {
            planet,
            transit,
            ldc,
            noise,
        } = options;

        if planet.is_some() && transit.is_none() {
            return Err(ValidationError::PlanetWithoutTransit.into());
        }
        let mut explicit_ldc = None;
        if let Some(params) = &transit {
            params.validate()?;
            if let Some(coeffs) = ldc {
                self.check_ldc_shape(&coeffs, params.limb_dark)?;
                explicit_ldc = Some(coeffs);
            }
        } else if ldc.is_some() {
            warn!("Limb-darkening coefficients supplied without transit parameters; ignoring them");
        }
        self.planet = planet;
        self.transit = transit.clone();

        let (ldc_map, ldc_source) = match &transit {
            Some(params) => {
                let (map, source) = self.resolve_ldc(params, explicit_ldc);
                (Some(map), source)
            }
            None => (None, LdcSource::None),
        };
        let separations = transit.as_ref().map(|params| self.separations(params));

        let elapsed = self.time.frame_elapsed_s();
        let (nints, ngroups, rows, cols) = self.ideal.dim();
        let mut skipped = Vec::new();
        self.ideal.fill(0.0);
        for cube in self.order_ideal.iter_mut() {
            cube.fill(0.0);
        }

        let transit_inputs = match (&transit, &separations, &ldc_map) {
            (Some(params), Some(separations), Some(ldc)) => Some(TransitInputs {
                model: self.transit_model.as_ref(),
                separations,
                law: params.limb_dark,
                ldc,
                planet: match &self.planet {
                    Some(spectrum) => PlanetRadius::Spectrum(spectrum),
                    None => PlanetRadius::Gray(params.rp),
                },
            }),
            _ => None,
        };
        let mut synth = LightcurveSynthesizer::new(
            &self.star,
            self.config.filter,
            self.config.noise_floor,
            self.time.nframes(),
        );
        if let Some(inputs) = transit_inputs {
            synth = synth.with_transit(inputs);
        }

        for &order in &self.orders {
            let model = &self.models[order.index()];
            let psf = &self.reference.order(order).psf;
            let (frames, order_skipped) = self.pool.install(|| {
                let (rates, skipped) = synth.synthesize(model);
                let frames = FrameAssembler::new(model, psf).assemble(&rates, &elapsed);
                (frames, skipped)
            });
            let frames = frames.into_shape_with_order((nints, ngroups, rows, cols))?;
            self.ideal += &frames;
            self.order_ideal[order.index()] = frames;
            skipped.extend(order_skipped);
            debug!("Assembled frames of {order}");
        }

        let noise_report = if noise {
            let config = self.config.noise.clone();
            Some(self.inject_noise(&config))
        } else {
            self.exposure = self.ideal.clone();
            apply_reference_pixels(
                &mut self.exposure,
                &self.reference.geometry,
                self.config.noise.refpix_counts,
            );
            None
        };

        self.report = RunReport {
            orders: self.orders.clone(),
            skipped,
            ldc_source,
            noise: noise_report,
        };
        info!(
            "Simulated {} frames; {} columns skipped",
            self.time.nframes(),
            self.report.skipped.len()
        );
        Ok(self.report.clone())
    }

    /// Regenerate the noisy exposure from the current ideal ramps.
    pub fn add_noise(&mut self, noise: &NoiseConfig) -> Result<NoiseReport, TsoError> {
        noise.validate()?;
        let report = self.inject_noise(noise);
        self.report.noise = Some(report);
        Ok(report)
    }

    /// Overwrite the reference border of the exposure with `counts`.
    pub fn add_reference_pixels(&mut self, counts: f64) {
        apply_reference_pixels(&mut self.exposure, &self.reference.geometry, counts);
    }

    /// Ideal count rate summed over the subarray at every frame (ADU/s).
    pub fn whitelight_curve(&self) -> Vec<f64> {
        self.ideal
            .outer_iter()
            .flat_map(|integration| {
                integration
                    .outer_iter()
                    .map(|frame| frame.sum())
                    .collect::<Vec<_>>()
            })
            .zip(self.time.frame_elapsed_s())
            .map(|(total, t)| total / t)
            .collect()
    }

    pub fn metadata(&self) -> ExposureMetadata {
        ExposureMetadata::new(&self.config, &self.reference.geometry, &self.time)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn star(&self) -> &Spectrum {
        &self.star
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn time(&self) -> &TimeAxis {
        &self.time
    }

    /// Orders simulated after the filter restriction
    pub fn orders(&self) -> &[SpectralOrder] {
        &self.orders
    }

    pub fn order_model(&self, order: SpectralOrder) -> &OrderModel {
        &self.models[order.index()]
    }

    pub fn planet(&self) -> Option<&TransmissionSpectrum> {
        self.planet.as_ref()
    }

    pub fn transit(&self) -> Option<&TransitParams> {
        self.transit.as_ref()
    }

    /// Noise-free ramps summed over orders, (integrations, groups, rows, cols)
    pub fn ideal(&self) -> &Array4<f64> {
        &self.ideal
    }

    pub fn order_ideal(&self, order: SpectralOrder) -> &Array4<f64> {
        &self.order_ideal[order.index()]
    }

    /// Final ramps in ADU, (integrations, groups, rows, cols)
    pub fn exposure(&self) -> &Array4<f64> {
        &self.exposure
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    fn check_ldc_shape(&self, coeffs: &Array3<f64>, law: LimbDarkeningLaw) -> Result<(), ValidationError> {
        let expected = (SpectralOrder::ALL.len(), self.reference.geometry.cols, law.n_coeffs());
        if coeffs.dim() != expected {
            return Err(ValidationError::LdcShape {
                expected,
                got: coeffs.dim(),
            });
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(ValidationError::TransitParameter {
                name: "ldc",
                reason: "coefficients must be finite".to_string(),
            });
        }
        Ok(())
    }

    fn resolve_ldc(&mut self, params: &TransitParams, explicit: Option<Array3<f64>>) -> (LdcMap, LdcSource) {
        let law = params.limb_dark;
        if let Some(coeffs) = explicit {
            return (LdcMap::explicit(law, coeffs), LdcSource::Explicit);
        }

        match (&self.ldc_provider, params.stellar) {
            (Some(provider), Some(stellar)) => {
                let key = LdcCacheKey { stellar, law };
                if let Some((cached, map)) = &self.ldc_cache {
                    if *cached == key {
                        debug!("Reusing {law} coefficients for Teff {}", stellar.teff);
                        return (map.clone(), LdcSource::Cached);
                    }
                }
                info!(
                    "Deriving {law} limb-darkening coefficients for Teff {} K, log g {}, [Fe/H] {}",
                    stellar.teff, stellar.logg, stellar.feh
                );
                let models: Vec<&OrderModel> =
                    self.orders.iter().map(|o| &self.models[o.index()]).collect();
                let map = self
                    .pool
                    .install(|| derive_coefficient_map(provider.as_ref(), &models, law, &stellar));
                self.ldc_cache = Some((key, map.clone()));
                (map, LdcSource::Derived)
            }
            _ => (
                LdcMap::broadcast(law, &params.u, self.reference.geometry.cols),
                LdcSource::Broadcast,
            ),
        }
    }

    /// Star-planet separation at every frame.
    fn separations(&self, params: &TransitParams) -> Vec<f64> {
        let unit = params.time_unit;
        let t0 = match params.t0 {
            Some(t0) => {
                if !self.time.contains(unit.to_days(t0)) {
                    warn!(
                        "Transit mid-point {t0} {unit} lies outside the exposure [{}, {}] days",
                        self.time.first(),
                        self.time.last()
                    );
                }
                t0
            }
            None => unit.from_days(self.time.mid()),
        };
        let times: Vec<f64> = self
            .time
            .timestamps()
            .iter()
            .map(|&t| unit.from_days(t))
            .collect();
        Orbit::new(params, t0).separations(&times)
    }

    fn inject_noise(&mut self, noise: &NoiseConfig) -> NoiseReport {
        let seed = noise.seed.unwrap_or(thread_rng().next_u64());
        let model = NoiseModel::new(
            &self.reference.calibration,
            &self.time,
            self.config.gain,
            noise,
        );

        let photon_yield = noise.photon_yield.then(|| {
            let views: Vec<(SpectralOrder, ArrayView4<'_, f64>)> = self
                .orders
                .iter()
                .map(|&o| (o, self.order_ideal[o.index()].view()))
                .collect();
            model.photon_yield_factor(&views)
        });

        let ideal = &self.ideal;
        let (data, report) = self
            .pool
            .install(|| model.apply(ideal, photon_yield.as_ref(), seed));
        self.exposure = data;
        apply_reference_pixels(
            &mut self.exposure,
            &self.reference.geometry,
            noise.refpix_counts,
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Subarray;
    use crate::error::SkipReason;
    use crate::instrument::Filter;
    use crate::transit::{LimbDarkeningError, StaticLdcTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::units::TemperatureExt;
    use approx::assert_relative_eq;

    fn tso(config: SimulationConfig) -> Tso {
        Tso::blackbody(Temperature::from_kelvin(3_000.0), config).unwrap()
    }

    fn small_config() -> SimulationConfig {
        SimulationConfig::new(2, 1)
            .with_subarray(Subarray::Substrip96)
            .with_orders(&[1])
    }

    #[test]
    fn test_planet_requires_transit() {
        let mut sim = tso(small_config());
        let planet =
            TransmissionSpectrum::from_radius_ratio(vec![0.5, 3.0], vec![0.1, 0.1]).unwrap();
        let err = sim
            .run_simulation(RunOptions::new().with_planet(planet))
            .unwrap_err();
        assert!(matches!(
            err,
            TsoError::Validation(ValidationError::PlanetWithoutTransit)
        ));
    }

    #[test]
    fn test_ldc_shape_is_checked() {
        let mut sim = tso(small_config());
        let params = TransitParams::circular(1.0, 0.1, 10.0, 90.0);
        let err = sim
            .run_simulation(
                RunOptions::new()
                    .with_transit(params)
                    .with_ldc(Array3::zeros((2, 2048, 3))),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TsoError::Validation(ValidationError::LdcShape {
                expected: (2, 2048, 2),
                got: (2, 2048, 3)
            })
        ));
    }

    #[test]
    fn test_ldc_sources() {
        let mut sim = tso(small_config());
        let params = TransitParams::circular(1.0, 0.1, 10.0, 90.0);

        let report = sim
            .run_simulation(RunOptions::new().with_transit(params.clone()).without_noise())
            .unwrap();
        assert_eq!(report.ldc_source, LdcSource::Broadcast);

        let report = sim
            .run_simulation(
                RunOptions::new()
                    .with_transit(params.clone())
                    .with_ldc(Array3::from_elem((2, 2048, 2), 0.2))
                    .without_noise(),
            )
            .unwrap();
        assert_eq!(report.ldc_source, LdcSource::Explicit);

        let table =
            StaticLdcTable::new(LimbDarkeningLaw::Quadratic, vec![(0.5, 3.5, vec![0.3, 0.1])])
                .unwrap();
        sim.set_ldc_provider(Some(Arc::new(table)));
        let stellar_params = params.with_stellar(StellarParameters {
            teff: 5_800.0,
            logg: 4.4,
            feh: 0.0,
        });
        let report = sim
            .run_simulation(
                RunOptions::new()
                    .with_transit(stellar_params.clone())
                    .without_noise(),
            )
            .unwrap();
        assert_eq!(report.ldc_source, LdcSource::Derived);
        let report = sim
            .run_simulation(RunOptions::new().with_transit(stellar_params).without_noise())
            .unwrap();
        assert_eq!(report.ldc_source, LdcSource::Cached);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_no_noise_leaves_ideal_and_border() {
        let mut sim = tso(small_config());
        let report = sim.run_simulation(RunOptions::new().without_noise()).unwrap();
        assert!(report.noise.is_none());
        assert_eq!(report.orders, vec![SpectralOrder::First]);

        let exposure = sim.exposure();
        assert_eq!(exposure.dim(), (1, 2, 96, 2048));
        assert_eq!(exposure[[0, 1, 40, 1000]], sim.ideal()[[0, 1, 40, 1000]]);
        assert_eq!(exposure[[0, 1, 40, 2]], 0.0);
    }

    #[test]
    fn test_add_noise_is_seeded() {
        let mut sim = tso(small_config());
        sim.run_simulation(RunOptions::new().without_noise()).unwrap();

        let noise = NoiseConfig::default().with_seed(7).with_snr(100.0);
        let report = sim.add_noise(&noise).unwrap();
        assert_eq!(report.seed, 7);
        let first = sim.exposure().clone();
        sim.add_noise(&noise).unwrap();
        assert_eq!(&first, sim.exposure());
        assert_eq!(sim.report().noise, Some(report));
    }

    #[test]
    fn test_add_reference_pixels() {
        let mut sim = tso(small_config());
        sim.run_simulation(RunOptions::new().without_noise()).unwrap();
        sim.add_reference_pixels(42.0);
        let exposure = sim.exposure();
        assert_eq!(exposure[[0, 0, 10, 0]], 42.0);
        assert_eq!(exposure[[0, 0, 10, 2047]], 42.0);
        assert_eq!(exposure[[0, 0, 95, 1000]], 42.0);
        assert_ne!(exposure[[0, 0, 0, 1000]], 42.0);
    }

    #[test]
    fn test_whitelight_curve_is_flat_without_transit() {
        let mut sim = tso(SimulationConfig::new(3, 2).with_subarray(Subarray::Substrip96));
        sim.run_simulation(RunOptions::new().without_noise()).unwrap();
        let curve = sim.whitelight_curve();
        assert_eq!(curve.len(), 6);
        for value in &curve {
            assert_relative_eq!(*value, curve[0], max_relative = 1e-9);
        }
    }

    #[test]
    fn test_mismatched_reference_rejected() {
        let config = small_config();
        let reference =
            ReferenceData::synthetic(Subarray::Substrip256, config.filter).unwrap();
        let star = default_blackbody(Temperature::from_kelvin(3_000.0)).unwrap();
        assert!(matches!(
            Tso::initialize_with_reference(config, star, reference),
            Err(TsoError::MalformedReferenceData(_))
        ));
    }

    struct NanTransit;

    impl TransitModel for NanTransit {
        fn light_curve(
            &self,
            separations: &[f64],
            _rp: f64,
            _law: LimbDarkeningLaw,
            _coeffs: &[f64],
        ) -> Vec<f64> {
            vec![f64::NAN; separations.len()]
        }
    }

    #[test]
    fn test_degenerate_transit_columns_are_reported() {
        let mut sim = tso(small_config());
        sim.set_transit_model(Box::new(NanTransit));
        let params = TransitParams::circular(1.0, 0.1, 10.0, 90.0);
        let report = sim
            .run_simulation(RunOptions::new().with_transit(params).without_noise())
            .unwrap();

        let valid = sim.order_model(SpectralOrder::First).valid_columns();
        assert_eq!(report.skipped.len(), valid.len());
        assert!(report
            .skipped
            .iter()
            .all(|s| s.order == 1 && s.reason == SkipReason::DegenerateTransit));
        assert!(sim.ideal().iter().all(|&v| v == 0.0));
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl LimbDarkeningProvider for CountingProvider {
        fn coefficients(
            &self,
            _wavelength_um: f64,
            law: LimbDarkeningLaw,
            _stellar: &StellarParameters,
        ) -> Result<Vec<f64>, LimbDarkeningError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![0.1; law.n_coeffs()])
        }
    }

    #[test]
    fn test_derivation_limited_to_simulated_columns() {
        let config = SimulationConfig::new(1, 1)
            .with_subarray(Subarray::Substrip96)
            .with_filter(Filter::F277W);
        let mut sim = tso(config);
        let provider = Arc::new(CountingProvider::default());
        let shared: Arc<dyn LimbDarkeningProvider> = provider.clone();
        sim.set_ldc_provider(Some(shared));

        let params = TransitParams::circular(1.0, 0.1, 10.0, 90.0).with_stellar(StellarParameters {
            teff: 5_800.0,
            logg: 4.4,
            feh: 0.0,
        });
        let report = sim
            .run_simulation(RunOptions::new().with_transit(params).without_noise())
            .unwrap();
        assert_eq!(report.ldc_source, LdcSource::Derived);

        let first = sim.order_model(SpectralOrder::First);
        let expected = first
            .valid_columns()
            .filter(|&c| first.wavelength(c) > 0.0)
            .count();
        assert_eq!(provider.calls.load(Ordering::Relaxed), expected);
    }
}
