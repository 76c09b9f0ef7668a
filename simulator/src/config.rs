//! Simulation configuration.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take the documented defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TsoError, ValidationError};
use crate::instrument::{Filter, SpectralOrder, Subarray, DEFAULT_GAIN};

/// Detector noise settings applied after the ideal ramps are built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Signal-to-noise ratio of each group increment; `None` disables photon scatter
    pub snr: Option<f64>,
    /// Multiplier on the zodiacal background map
    pub zodi_scale: f64,
    /// Bias level in ADU
    pub offset: f64,
    /// Gaussian read noise per frame in electrons
    pub read_noise: f64,
    /// Scale the signal by the photon-yield map
    pub photon_yield: bool,
    /// Value written to reference pixels
    pub refpix_counts: f64,
    /// Base RNG seed; `None` draws one per run
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            snr: None,
            zodi_scale: 1.0,
            offset: 500.0,
            read_noise: 0.0,
            photon_yield: false,
            refpix_counts: 0.0,
            seed: None,
        }
    }
}

impl NoiseConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_snr(mut self, snr: f64) -> Self {
        self.snr = Some(snr);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        fn bad(name: &'static str, reason: String) -> ValidationError {
            ValidationError::Config { name, reason }
        }
        if let Some(snr) = self.snr {
            if !(snr.is_finite() && snr > 0.0) {
                return Err(bad("snr", format!("must be positive, got {snr}")));
            }
        }
        if !(self.zodi_scale.is_finite() && self.zodi_scale >= 0.0) {
            return Err(bad(
                "zodi_scale",
                format!("must be non-negative, got {}", self.zodi_scale),
            ));
        }
        if !self.offset.is_finite() {
            return Err(bad("offset", format!("must be finite, got {}", self.offset)));
        }
        if !(self.read_noise.is_finite() && self.read_noise >= 0.0) {
            return Err(bad(
                "read_noise",
                format!("must be non-negative, got {}", self.read_noise),
            ));
        }
        if !self.refpix_counts.is_finite() {
            return Err(bad(
                "refpix_counts",
                format!("must be finite, got {}", self.refpix_counts),
            ));
        }
        Ok(())
    }
}

/// Exposure, detector and runtime settings of a simulation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ngroups: usize,
    pub nints: usize,
    pub subarray: Subarray,
    pub filter: Filter,
    /// Spectral orders to simulate (1 and/or 2)
    pub orders: Vec<u8>,
    /// Exposure start time (days)
    pub start_time: f64,
    pub target: String,
    /// Defaults to the target name
    pub title: Option<String>,
    pub obs_date: String,
    pub obs_time: String,
    /// e⁻/ADU
    pub gain: f64,
    /// Minimum count rate of any column (ADU/s)
    pub noise_floor: f64,
    /// Cap on worker threads; `None` uses every core
    pub max_workers: Option<usize>,
    pub noise: NoiseConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ngroups: 2,
            nints: 2,
            subarray: Subarray::Substrip256,
            filter: Filter::Clear,
            orders: vec![1, 2],
            start_time: 0.0,
            target: "Simulated Target".to_string(),
            title: None,
            obs_date: "2016-01-04".to_string(),
            obs_time: "23:37:52.226".to_string(),
            gain: DEFAULT_GAIN,
            noise_floor: 2.0,
            max_workers: None,
            noise: NoiseConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new(ngroups: usize, nints: usize) -> Self {
        Self {
            ngroups,
            nints,
            ..Self::default()
        }
    }

    pub fn with_subarray(mut self, subarray: Subarray) -> Self {
        self.subarray = subarray;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_orders(mut self, orders: &[u8]) -> Self {
        self.orders = orders.to_vec();
        self
    }

    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, TsoError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, TsoError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.target)
    }

    /// Requested orders, sorted and deduplicated, before any filter restriction.
    pub fn requested_orders(&self) -> Result<Vec<SpectralOrder>, ValidationError> {
        SpectralOrder::parse_list(&self.orders)
    }

    /// Requested orders the filter transmits, or every order it transmits
    /// when none of the requested ones survive.
    pub fn effective_orders(&self) -> Result<Vec<SpectralOrder>, ValidationError> {
        let allowed = self.filter.allowed_orders();
        let orders: Vec<SpectralOrder> = self
            .requested_orders()?
            .into_iter()
            .filter(|order| allowed.contains(order))
            .collect();
        if orders.is_empty() {
            return Ok(allowed.to_vec());
        }
        Ok(orders)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ngroups == 0 {
            return Err(ValidationError::ExposureCount("ngroups"));
        }
        if self.nints == 0 {
            return Err(ValidationError::ExposureCount("nints"));
        }
        self.requested_orders()?;
        if !self.start_time.is_finite() {
            return Err(ValidationError::Config {
                name: "start_time",
                reason: format!("must be finite, got {}", self.start_time),
            });
        }
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(ValidationError::Config {
                name: "gain",
                reason: format!("must be positive, got {}", self.gain),
            });
        }
        if !(self.noise_floor.is_finite() && self.noise_floor >= 0.0) {
            return Err(ValidationError::Config {
                name: "noise_floor",
                reason: format!("must be non-negative, got {}", self.noise_floor),
            });
        }
        if self.max_workers == Some(0) {
            return Err(ValidationError::Config {
                name: "max_workers",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        self.noise.validate()
    }
}
