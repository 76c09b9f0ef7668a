//! Occultation light curves of a limb-darkened star.

use std::f64::consts::PI;

use super::LimbDarkeningLaw;

/// Relative stellar flux as a planet crosses the disk
pub trait TransitModel: Send + Sync {
    /// Flux relative to the unocculted star at each sky-projected separation
    /// `separations` (stellar radii) for a planet of radius `rp` (stellar radii).
    fn light_curve(
        &self,
        separations: &[f64],
        rp: f64,
        law: LimbDarkeningLaw,
        coeffs: &[f64],
    ) -> Vec<f64>;
}

/// Numerical integration of the blocked intensity over stellar annuli
///
/// The occulted region at separation `z` is cut into thin annuli centred on
/// the star; each annulus contributes its limb-darkened intensity times the
/// fraction of its circumference behind the planet. The midpoint rule makes
/// the uniform-disk case exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratedTransitModel {
    /// Annuli across the occulted radial range
    pub annuli: usize,
}

impl Default for IntegratedTransitModel {
    fn default() -> Self {
        Self { annuli: 500 }
    }
}

/// Fraction of the annulus of radius `r` covered by a disk of radius `p` at distance `z`.
fn covered_arc_fraction(r: f64, z: f64, p: f64) -> f64 {
    if r <= p - z {
        return 1.0;
    }
    if r >= z + p || r <= z - p || z == 0.0 {
        return 0.0;
    }
    let cos_half_angle = ((r * r + z * z - p * p) / (2.0 * r * z)).clamp(-1.0, 1.0);
    cos_half_angle.acos() / PI
}

impl IntegratedTransitModel {
    /// Integral of `I(r)·2πr` over `[lo, hi]` weighted by `weight(r)`.
    fn integrate<W>(&self, lo: f64, hi: f64, law: LimbDarkeningLaw, coeffs: &[f64], weight: W) -> f64
    where
        W: Fn(f64) -> f64,
    {
        if hi <= lo {
            return 0.0;
        }
        let n = self.annuli.max(1);
        let dr = (hi - lo) / n as f64;
        (0..n)
            .map(|i| {
                let r = lo + (i as f64 + 0.5) * dr;
                let mu = (1.0 - r * r).max(0.0).sqrt();
                law.intensity(mu, coeffs) * weight(r) * 2.0 * PI * r * dr
            })
            .sum()
    }

    /// Total unocculted flux of the disk in the same units as [`Self::blocked_flux`].
    pub fn disk_flux(&self, law: LimbDarkeningLaw, coeffs: &[f64]) -> f64 {
        self.integrate(0.0, 1.0, law, coeffs, |_| 1.0)
    }

    pub fn blocked_flux(&self, z: f64, rp: f64, law: LimbDarkeningLaw, coeffs: &[f64]) -> f64 {
        if !(z.is_finite() && rp > 0.0) || z >= 1.0 + rp {
            return 0.0;
        }
        let lo = (z - rp).max(0.0);
        let hi = (z + rp).min(1.0);
        self.integrate(lo, hi, law, coeffs, |r| covered_arc_fraction(r, z, rp))
    }
}

impl TransitModel for IntegratedTransitModel {
    fn light_curve(
        &self,
        separations: &[f64],
        rp: f64,
        law: LimbDarkeningLaw,
        coeffs: &[f64],
    ) -> Vec<f64> {
        let total = self.disk_flux(law, coeffs);
        separations
            .iter()
            .map(|&z| 1.0 - self.blocked_flux(z, rp, law, coeffs) / total)
            .collect()
    }
}
