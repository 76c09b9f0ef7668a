//! Keplerian orbit geometry for the planet-star separation.

use std::f64::consts::{FRAC_PI_2, PI};

use super::TransitParams;

const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERATIONS: usize = 50;

/// Solve Kepler's equation `M = E − e sin E` for the eccentric anomaly.
pub fn eccentric_anomaly(mean_anomaly: f64, ecc: f64) -> f64 {
    if ecc == 0.0 {
        return mean_anomaly;
    }
    let m = mean_anomaly.rem_euclid(2.0 * PI);
    let mut e = if ecc > 0.8 { PI } else { m };
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let step = (e - ecc * e.sin() - m) / (1.0 - ecc * e.cos());
        e -= step;
        if step.abs() < KEPLER_TOLERANCE {
            break;
        }
    }
    e
}

pub fn true_anomaly(eccentric_anomaly: f64, ecc: f64) -> f64 {
    2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (eccentric_anomaly / 2.0).tan()).atan()
}

/// Planet orbit referenced to a time of inferior conjunction
#[derive(Debug, Clone, PartialEq)]
pub struct Orbit {
    period: f64,
    a: f64,
    ecc: f64,
    /// Argument of periastron (rad)
    omega: f64,
    sin_inc: f64,
    t_periastron: f64,
}

impl Orbit {
    /// `t0` is the conjunction time in the same unit as `params.period`.
    pub fn new(params: &TransitParams, t0: f64) -> Self {
        let ecc = params.ecc;
        let omega = params.w.to_radians();

        // True anomaly at conjunction, mapped back to a periastron passage time
        let f_conj = FRAC_PI_2 - omega;
        let e_conj = 2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (f_conj / 2.0).tan()).atan();
        let m_conj = e_conj - ecc * e_conj.sin();
        let t_periastron = t0 - params.period / (2.0 * PI) * m_conj;

        Self {
            period: params.period,
            a: params.a,
            ecc,
            omega,
            sin_inc: params.inc.to_radians().sin(),
            t_periastron,
        }
    }

    /// Sky-projected centre separation in stellar radii.
    ///
    /// Returns infinity while the planet is behind the star so that only the
    /// primary transit occults.
    pub fn separation(&self, t: f64) -> f64 {
        let mean = 2.0 * PI * (t - self.t_periastron) / self.period;
        let e = eccentric_anomaly(mean, self.ecc);
        let f = true_anomaly(e, self.ecc);
        let r = self.a * (1.0 - self.ecc * e.cos());
        let phase = (self.omega + f).sin();
        if phase <= 0.0 {
            return f64::INFINITY;
        }
        r * (1.0 - phase * phase * self.sin_inc * self.sin_inc).max(0.0).sqrt()
    }

    pub fn separations(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.separation(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kepler_solution_satisfies_equation() {
        for &ecc in &[0.0, 0.1, 0.5, 0.95] {
            for &m in &[0.1, 1.0, 2.5, 4.0, 6.0] {
                let e = eccentric_anomaly(m, ecc);
                assert_relative_eq!(e - ecc * e.sin(), m, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_central_transit_at_conjunction() {
        let params = TransitParams::circular(3.0, 0.1, 10.0, 90.0);
        let orbit = Orbit::new(&params, 1.0);
        assert!(orbit.separation(1.0) < 1e-9);
        // a sixth of an orbit later
        assert_relative_eq!(orbit.separation(1.5), 10.0 * 0.75_f64.sqrt(), epsilon = 1e-9);
        // behind the star half a period later
        assert!(orbit.separation(2.5).is_infinite());
    }

    #[test]
    fn test_impact_parameter() {
        let params = TransitParams::circular(3.0, 0.1, 10.0, 87.0);
        let orbit = Orbit::new(&params, 0.0);
        let b = 10.0 * 87.0_f64.to_radians().cos();
        assert_relative_eq!(orbit.separation(0.0), b, epsilon = 1e-9);
    }

    #[test]
    fn test_eccentric_conjunction() {
        let params = TransitParams {
            ecc: 0.3,
            w: 40.0,
            ..TransitParams::circular(5.0, 0.1, 12.0, 90.0)
        };
        let orbit = Orbit::new(&params, 2.0);
        assert!(orbit.separation(2.0) < 1e-8);
        assert!(orbit.separation(2.05) > orbit.separation(2.0));
    }
}
