//! Time-series observation simulator
//!
//! Simulates a SOSS exposure of a star, optionally transited by a planet,
//! and writes the ramps to a FITS file.
//!
//! Usage:
//! ```
//! cargo run --release --features fits --bin simulate_tso -- [OPTIONS]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use soss_simulator::io::{load_reference, write_exposure};
use soss_simulator::photometry::default_blackbody;
use soss_simulator::units::{Temperature, TemperatureExt};
use soss_simulator::{
    Filter, RunOptions, SimulationConfig, Spectrum, Subarray, TransitParams,
    TransmissionSpectrum, Tso, UnitColumn,
};

/// Command-line arguments for the simulator
#[derive(Parser, Debug)]
#[clap(author, version, about = "Simulate a spectroscopic time-series exposure")]
struct Args {
    /// JSON simulation configuration; command-line options override it
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// Stellar spectrum as 2 or 3 text columns (wavelength, flux[, error])
    #[clap(short = 's', long)]
    spectrum: Option<PathBuf>,

    /// Wavelength unit of the spectrum file
    #[clap(long, default_value = "um")]
    wave_unit: String,

    /// Flux density unit of the spectrum file
    #[clap(long, default_value = "erg/s/cm2/AA")]
    flux_unit: String,

    /// Blackbody temperature in Kelvin, used without --spectrum
    #[clap(long, default_value = "3000")]
    teff: f64,

    /// Groups per integration
    #[clap(long)]
    ngroups: Option<usize>,

    /// Number of integrations
    #[clap(long)]
    nints: Option<usize>,

    /// Subarray (SUBSTRIP96, SUBSTRIP256, FULL)
    #[clap(long)]
    subarray: Option<Subarray>,

    /// Filter (CLEAR, F277W)
    #[clap(long)]
    filter: Option<Filter>,

    /// Comma-separated spectral orders
    #[clap(long, value_delimiter = ',')]
    orders: Option<Vec<u8>>,

    /// JSON transit parameters
    #[clap(short = 't', long)]
    transit: Option<PathBuf>,

    /// Planet spectrum as 2 text columns (wavelength in um, Rp/R*)
    #[clap(short = 'p', long)]
    planet: Option<PathBuf>,

    /// Read the second planet column as transit depth (Rp/R*)^2
    #[clap(long)]
    planet_depth: bool,

    /// Directory holding detector calibration maps
    #[clap(long)]
    calibration_dir: Option<PathBuf>,

    /// Skip the detector noise model
    #[clap(long)]
    no_noise: bool,

    /// Random seed for reproducibility (optional)
    #[clap(long)]
    seed: Option<u64>,

    /// Maximum worker threads
    #[clap(short = 'j', long)]
    max_workers: Option<usize>,

    /// Output FITS path
    #[clap(short = 'o', long, default_value = "tso.fits")]
    output: PathBuf,

    /// Also write the noise-free ramps and per-order extensions
    #[clap(long)]
    ideal: bool,
}

/// Numeric columns of a whitespace or comma separated table; `#` starts a comment.
fn read_columns(path: &Path) -> Result<Vec<Vec<f64>>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let values = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("{}:{}: not a number", path.display(), lineno + 1))?;
        if columns.is_empty() {
            columns = vec![Vec::new(); values.len()];
        }
        if values.len() != columns.len() {
            bail!(
                "{}:{}: expected {} columns, found {}",
                path.display(),
                lineno + 1,
                columns.len(),
                values.len()
            );
        }
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    Ok(columns)
}

/// First column in `wave_unit`, every other column in `flux_unit`.
fn unit_columns(columns: Vec<Vec<f64>>, wave_unit: &str, flux_unit: &str) -> Vec<UnitColumn> {
    columns
        .into_iter()
        .enumerate()
        .map(|(i, values)| UnitColumn::new(values, if i == 0 { wave_unit } else { flux_unit }))
        .collect()
}

fn load_star(args: &Args) -> Result<Spectrum> {
    match &args.spectrum {
        Some(path) => {
            let columns = unit_columns(read_columns(path)?, &args.wave_unit, &args.flux_unit);
            Spectrum::from_columns(&columns)
                .with_context(|| format!("loading spectrum from {}", path.display()))
        }
        None => Ok(default_blackbody(Temperature::from_kelvin(args.teff))?),
    }
}

fn load_planet(path: &Path, depth: bool) -> Result<TransmissionSpectrum> {
    let mut columns = read_columns(path)?.into_iter();
    let (Some(wavelength), Some(values)) = (columns.next(), columns.next()) else {
        bail!("{}: planet spectrum needs 2 columns", path.display());
    };
    let planet = if depth {
        TransmissionSpectrum::from_depth(wavelength, values)?
    } else {
        TransmissionSpectrum::from_radius_ratio(wavelength, values)?
    };
    Ok(planet)
}

fn build_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(ngroups) = args.ngroups {
        config.ngroups = ngroups;
    }
    if let Some(nints) = args.nints {
        config.nints = nints;
    }
    if let Some(subarray) = args.subarray {
        config.subarray = subarray;
    }
    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    if let Some(orders) = &args.orders {
        config.orders = orders.clone();
    }
    if args.seed.is_some() {
        config.noise.seed = args.seed;
    }
    if args.max_workers.is_some() {
        config.max_workers = args.max_workers;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    let star = load_star(&args)?;
    let mut tso = match &args.calibration_dir {
        Some(dir) => {
            let reference = load_reference(dir, config.subarray, config.filter)?;
            Tso::initialize_with_reference(config, star, reference)?
        }
        None => Tso::initialize(config, star)?,
    };

    let mut options = RunOptions::new();
    if let Some(path) = &args.transit {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let params: TransitParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing transit parameters in {}", path.display()))?;
        options = options.with_transit(params);
    }
    if let Some(path) = &args.planet {
        options = options.with_planet(load_planet(path, args.planet_depth)?);
    }
    if args.no_noise {
        options = options.without_noise();
    }

    let report = tso.run_simulation(options)?;
    write_exposure(&args.output, &tso, args.ideal)?;

    let orders: Vec<String> = report.orders.iter().map(|o| o.to_string()).collect();
    println!("Simulated {} ({})", orders.join(", "), tso.config().subarray);
    println!("Exposure shape: {:?}", tso.exposure().dim());
    println!("Limb darkening: {:?}", report.ldc_source);
    if let Some(noise) = report.noise {
        println!(
            "Noise seed: {} ({} saturated pixels)",
            noise.seed, noise.saturated_pixels
        );
    }
    if !report.skipped.is_empty() {
        println!("Skipped columns: {}", report.skipped.len());
    }
    info!("Output written to {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use soss_simulator::ValidationError;
    use std::io::Write;

    #[test]
    fn test_every_file_column_reaches_the_spectrum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# wave flux err extra").unwrap();
        writeln!(file, "1.0 1e-12 1e-14 7").unwrap();
        writeln!(file, "2.0 2e-12 1e-14 7").unwrap();

        let columns = unit_columns(read_columns(file.path()).unwrap(), "um", "erg/s/cm2/AA");
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[0].unit, "um");
        assert!(columns[1..].iter().all(|c| c.unit == "erg/s/cm2/AA"));
        assert_eq!(
            Spectrum::from_columns(&columns).unwrap_err(),
            ValidationError::ColumnCount(4)
        );

        let three = unit_columns(
            vec![vec![1.0, 2.0], vec![1e-12, 2e-12], vec![1e-14, 1e-14]],
            "um",
            "erg/s/cm2/AA",
        );
        assert!(Spectrum::from_columns(&three).is_ok());
    }
}
