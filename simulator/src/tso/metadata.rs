//! Descriptive metadata of a simulated exposure.

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::instrument::{Filter, Subarray, SubarrayGeometry, TimeAxis};

pub const TELESCOPE: &str = "JWST";
pub const INSTRUMENT: &str = "NIRISS";
pub const DETECTOR: &str = "NIS";
pub const PUPIL: &str = "GR700XD";
pub const EXPOSURE_TYPE: &str = "NIS_SOSS";
pub const READ_PATTERN: &str = "NISRAPID";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureMetadata {
    pub subarray: Subarray,
    pub filter: Filter,
    pub target: String,
    pub title: String,
    pub obs_date: String,
    pub obs_time: String,
    pub gain: f64,
    pub nints: usize,
    pub ngroups: usize,
    /// Frames averaged per group
    pub nframes: usize,
    pub group_gap: usize,
    pub frame_time_s: f64,
    pub group_time_s: f64,
    /// 1-indexed first column and row on the full detector
    pub substart: (usize, usize),
    /// Columns, rows
    pub subsize: (usize, usize),
    pub fast_axis: i32,
    pub slow_axis: i32,
    /// Exposure start, middle and end timestamps (days)
    pub exp_start: f64,
    pub exp_mid: f64,
    pub exp_end: f64,
}

impl ExposureMetadata {
    pub fn new(config: &SimulationConfig, geometry: &SubarrayGeometry, time: &TimeAxis) -> Self {
        Self {
            subarray: config.subarray,
            filter: config.filter,
            target: config.target.clone(),
            title: config.title().to_string(),
            obs_date: config.obs_date.clone(),
            obs_time: config.obs_time.clone(),
            gain: config.gain,
            nints: time.nints(),
            ngroups: time.ngroups(),
            nframes: 1,
            group_gap: 0,
            frame_time_s: time.frame_time_s(),
            group_time_s: time.frame_time_s(),
            substart: (geometry.xloc, geometry.yloc),
            subsize: (geometry.cols, geometry.rows),
            fast_axis: -2,
            slow_axis: -1,
            exp_start: time.first(),
            exp_mid: time.mid(),
            exp_end: time.last(),
        }
    }
}
