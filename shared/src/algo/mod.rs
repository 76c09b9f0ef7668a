//! Numerical algorithms used across the simulator.
//!
//! Interpolation, polynomial evaluation/fitting, quadrature and the
//! parallel helpers that fan work out over a bounded rayon pool.

pub mod misc;
pub mod parallel;
pub mod polynomial;

pub use misc::{interp, interp_clamped, interp_or, linspace, trapz, InterpError};
pub use parallel::{build_worker_pool, process_axis_chunks_seeded, worker_count};
pub use polynomial::{polyfit, polyval, PolyfitError};
