//! Run summaries returned to callers.

use crate::error::SkippedUnit;
use crate::instrument::SpectralOrder;

/// Where the limb-darkening coefficients of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LdcSource {
    /// No transit was modelled
    #[default]
    None,
    /// Supplied by the caller
    Explicit,
    /// Derived from the provider for this run
    Derived,
    /// Reused from an earlier derivation with the same star and law
    Cached,
    /// The transit parameters' own coefficients, broadcast to every column
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseReport {
    /// Base seed of the noise RNGs
    pub seed: u64,
    /// Pixels above the full well after noise
    pub saturated_pixels: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    pub orders: Vec<SpectralOrder>,
    pub skipped: Vec<SkippedUnit>,
    pub ldc_source: LdcSource,
    /// `None` when noise was disabled for the run
    pub noise: Option<NoiseReport>,
}

impl RunReport {
    pub fn skipped_in(&self, order: SpectralOrder) -> impl Iterator<Item = &SkippedUnit> {
        self.skipped
            .iter()
            .filter(move |unit| unit.order == order.number())
    }
}
