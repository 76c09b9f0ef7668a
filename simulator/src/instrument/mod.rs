//! Instrument description: detector subarrays, filters, spectral orders and
//! the reference data (wavelength maps, traces, PSFs, throughput and
//! detector calibration) that the simulation engine consumes.

pub mod calibration;
pub mod order_model;
pub mod psf;
pub mod reference;
pub mod response;
pub mod timing;
pub mod trace;
pub mod wavelength;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use calibration::CalibrationSet;
pub use order_model::{ColumnPlacement, OrderModel};
pub use psf::{DefocusedPsf, PsfCube, PsfModel};
pub use reference::{OrderReference, ReferenceData};
pub use response::SpectralResponse;
pub use timing::TimeAxis;
pub use trace::TracePolynomial;
pub use wavelength::WavelengthMap;

/// Gain of the detector in e⁻/ADU
pub const DEFAULT_GAIN: f64 = 1.61;

/// Collecting area of the primary mirror in cm²
pub const MIRROR_AREA_CM2: f64 = 253_260.0;

/// Full well of the detector in ADU; exceeded pixels are reported, not clipped
pub const FULL_WELL_ADU: f64 = 65_535.0;

/// Detector subarray readout modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Subarray {
    Substrip96,
    Substrip256,
    Full,
}

/// Placement and readout timing of a subarray on the full detector
#[derive(Debug, Clone, PartialEq)]
pub struct SubarrayGeometry {
    pub rows: usize,
    pub cols: usize,
    /// 1-indexed first detector column
    pub xloc: usize,
    /// 1-indexed first detector row
    pub yloc: usize,
    /// Reference columns on each of the left and right edges
    pub reference_cols: usize,
    /// Reference rows along the top edge
    pub reference_rows: usize,
    /// Seconds between consecutive frames
    pub frame_time_s: f64,
}

impl SubarrayGeometry {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl Subarray {
    pub const ALL: [Subarray; 3] = [Subarray::Substrip96, Subarray::Substrip256, Subarray::Full];

    pub fn name(self) -> &'static str {
        match self {
            Subarray::Substrip96 => "SUBSTRIP96",
            Subarray::Substrip256 => "SUBSTRIP256",
            Subarray::Full => "FULL",
        }
    }

    pub fn geometry(self) -> SubarrayGeometry {
        let (rows, yloc, frame_time_s) = match self {
            Subarray::Substrip96 => (96, 1803, 2.213),
            Subarray::Substrip256 => (256, 1793, 5.491),
            Subarray::Full => (2048, 1, 10.737),
        };
        SubarrayGeometry {
            rows,
            cols: 2048,
            xloc: 1,
            yloc,
            reference_cols: 4,
            reference_rows: 4,
            frame_time_s,
        }
    }

    /// Row offset of this subarray relative to SUBSTRIP256, the frame in
    /// which the trace polynomials are tabulated.
    pub fn row_offset_from_substrip256(self) -> f64 {
        Subarray::Substrip256.geometry().yloc as f64 - self.geometry().yloc as f64
    }
}

impl fmt::Display for Subarray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subarray {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subarray::ALL
            .into_iter()
            .find(|sub| sub.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownSubarray(s.to_string()))
    }
}

/// Filter wheel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Filter {
    Clear,
    F277W,
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Filter::Clear => "CLEAR",
            Filter::F277W => "F277W",
        }
    }

    /// Orders that carry signal through this filter.
    pub fn allowed_orders(self) -> &'static [SpectralOrder] {
        match self {
            Filter::Clear => &SpectralOrder::ALL,
            Filter::F277W => &[SpectralOrder::First],
        }
    }

    /// Passband in µm for narrow-band filters.
    pub fn passband_um(self) -> Option<(f64, f64)> {
        match self {
            Filter::Clear => None,
            Filter::F277W => Some((2.36989, 3.22972)),
        }
    }

    /// True when the wavelength is transmitted by this filter.
    pub fn transmits(self, wavelength_um: f64) -> bool {
        self.passband_um()
            .map_or(true, |(lo, hi)| wavelength_um >= lo && wavelength_um <= hi)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLEAR" => Ok(Filter::Clear),
            "F277W" => Ok(Filter::F277W),
            _ => Err(ValidationError::UnknownFilter(s.to_string())),
        }
    }
}

/// Diffraction order of the grism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpectralOrder {
    First,
    Second,
}

impl SpectralOrder {
    pub const ALL: [SpectralOrder; 2] = [SpectralOrder::First, SpectralOrder::Second];

    pub fn number(self) -> u8 {
        match self {
            SpectralOrder::First => 1,
            SpectralOrder::Second => 2,
        }
    }

    /// Zero-based index into per-order tables.
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    pub fn from_number(n: u8) -> Result<Self, ValidationError> {
        match n {
            1 => Ok(SpectralOrder::First),
            2 => Ok(SpectralOrder::Second),
            other => Err(ValidationError::UnsupportedOrder(other)),
        }
    }

    /// Validate and deduplicate a list of order numbers, keeping them sorted.
    pub fn parse_list(numbers: &[u8]) -> Result<Vec<SpectralOrder>, ValidationError> {
        if numbers.is_empty() {
            return Err(ValidationError::NoOrders);
        }
        let mut orders = numbers
            .iter()
            .map(|&n| SpectralOrder::from_number(n))
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort();
        orders.dedup();
        Ok(orders)
    }
}

impl fmt::Display for SpectralOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order {}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subarray_geometry() {
        let g = Subarray::Substrip256.geometry();
        assert_eq!(g.shape(), (256, 2048));
        assert_eq!(g.yloc, 1793);
        assert_eq!(g.frame_time_s, 5.491);

        assert_eq!(Subarray::Substrip96.geometry().rows, 96);
        assert_eq!(Subarray::Full.geometry().frame_time_s, 10.737);

        assert_eq!(Subarray::Full.row_offset_from_substrip256(), 1792.0);
        assert_eq!(Subarray::Substrip96.row_offset_from_substrip256(), -10.0);
    }

    #[test]
    fn test_subarray_parse() {
        assert_eq!("substrip96".parse::<Subarray>().unwrap(), Subarray::Substrip96);
        assert_eq!("FULL".parse::<Subarray>().unwrap(), Subarray::Full);
        assert!(matches!(
            "SUB80".parse::<Subarray>(),
            Err(ValidationError::UnknownSubarray(_))
        ));
    }

    #[test]
    fn test_filter_orders_and_passband() {
        assert_eq!(Filter::Clear.allowed_orders().len(), 2);
        assert_eq!(Filter::F277W.allowed_orders(), &[SpectralOrder::First]);
        assert!(Filter::Clear.transmits(0.6));
        assert!(Filter::F277W.transmits(2.5));
        assert!(!Filter::F277W.transmits(2.0));
        assert!("f277w".parse::<Filter>().is_ok());
        assert!("GR150".parse::<Filter>().is_err());
    }

    #[test]
    fn test_order_list() {
        let orders = SpectralOrder::parse_list(&[2, 1, 2]).unwrap();
        assert_eq!(orders, vec![SpectralOrder::First, SpectralOrder::Second]);
        assert_eq!(
            SpectralOrder::parse_list(&[3]),
            Err(ValidationError::UnsupportedOrder(3))
        );
        assert_eq!(SpectralOrder::parse_list(&[]), Err(ValidationError::NoOrders));
    }

    #[test]
    fn test_serde_names() {
        let s = serde_json::to_string(&Subarray::Substrip256).unwrap();
        assert_eq!(s, "\"SUBSTRIP256\"");
        let f: Filter = serde_json::from_str("\"F277W\"").unwrap();
        assert_eq!(f, Filter::F277W);
    }
}
