//! Contrast versus wavefront-error RMS for the matrix, the analytical model
//! and the reference coronagraph
//!
//! Draws random aberrations at log-spaced RMS levels, evaluates each with all
//! three predictors and writes the per-level means as CSV. The matrix is read
//! from a file written by `pastis_matrix`, or built from the analytical model
//! when none is given.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use pastis::contrast_curve::log_spaced_rms;
use pastis::shared_args::SharedPastisArgs;
use pastis::{
    AnalyticalModel, CalibrationSet, CalibrationTable, ContrastSweep, MatrixBuilder, PastisMatrix,
    PerfectCoronagraph, SegmentedAperture, SimulatorProbe,
};

/// Command line arguments for the contrast curve
#[derive(Parser, Debug)]
#[command(
    name = "PASTIS Contrast Curve",
    about = "Compares matrix, analytical and simulated contrast over a range of aberration RMS",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedPastisArgs,

    /// PASTIS matrix FITS file; built from the analytical model when omitted
    #[arg(long)]
    matrix: Option<PathBuf>,

    /// Calibration table(s) for the analytical model
    #[arg(long)]
    calibration: Vec<PathBuf>,

    /// log10 of the smallest RMS in nm
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    lower: f64,

    /// log10 of the largest RMS in nm
    #[arg(long, default_value_t = 2.0, allow_hyphen_values = true)]
    upper: f64,

    /// Number of RMS levels
    #[arg(long, default_value_t = 7)]
    points: usize,

    /// Random aberrations per RMS level
    #[arg(long, default_value_t = 3)]
    realizations: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args.shared.load_config()?;
    let mode = config.mode()?;
    if args.points == 0 {
        bail!("--points must be at least 1");
    }

    let aperture = Arc::new(
        SegmentedAperture::from_mask(&config.aperture, config.redundancy_tolerance())
            .context("segment center extraction failed")?,
    );
    aperture.validate()?;

    let mut calibration = CalibrationSet::new();
    for path in &args.calibration {
        let table = CalibrationTable::load(path)
            .with_context(|| format!("reading calibration {}", path.display()))?;
        info!("Loaded {} calibration from {}", table.mode(), path.display());
        calibration.insert(table);
    }
    let analytical = AnalyticalModel::from_config(
        Arc::clone(&aperture),
        &config,
        (!args.calibration.is_empty()).then_some(&calibration),
    )?;
    let simulator = SimulatorProbe::from_config(
        PerfectCoronagraph::new(&aperture, &config.optics),
        &config,
    )?;

    let matrix = match &args.matrix {
        Some(path) => {
            let (matrix, header) = PastisMatrix::load(path)
                .with_context(|| format!("reading matrix {}", path.display()))?;
            if header.noll != mode.noll() || header.wavelength_nm != config.optics.wavelength_nm {
                warn!(
                    "Matrix was built for Z{} at {} nm, run is {} at {} nm",
                    header.noll,
                    header.wavelength_nm,
                    mode,
                    config.optics.wavelength_nm
                );
            }
            matrix
        }
        None => {
            info!("No matrix given, building one from the analytical model");
            let (matrix, _) = MatrixBuilder::new(config.calibration_aberration_nm)
                .with_obscured_segment(config.aperture.obscured_segment)
                .build(&analytical, &AtomicBool::new(false))?;
            matrix
        }
    };

    let rms_values = log_spaced_rms(args.lower, args.upper, args.points);
    let pb = ProgressBar::new(rms_values.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.set_message(format!("Sweeping {mode} RMS"));

    let points = ContrastSweep::new(args.realizations, args.seed)
        .with_obscured_segment(config.aperture.obscured_segment)
        .run(&simulator, &analytical, &matrix, &rms_values, |_| pb.inc(1))?;
    pb.finish_with_message("Sweep done");

    println!(
        "{:>10}  {:>12}  {:>12}  {:>12}  {:>9}",
        "rms [nm]", "simulator", "analytical", "matrix", "error"
    );
    for p in &points {
        println!(
            "{:>10.3}  {:>12.4e}  {:>12.4e}  {:>12.4e}  {:>8.2}%",
            p.rms_nm,
            p.simulator,
            p.analytical,
            p.matrix,
            100.0 * (p.matrix - p.simulator).abs() / p.simulator.abs().max(f64::MIN_POSITIVE)
        );
    }

    let csv_path = args
        .shared
        .output_path(&format!("contrast_curve_{}.csv", mode.name()))?;
    let mut csv_file =
        File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
    writeln!(
        csv_file,
        "# {} {} at {} nm, {} realizations per level",
        config.name, mode, config.optics.wavelength_nm, args.realizations
    )?;
    writeln!(csv_file, "rms_nm,simulator,analytical,matrix")?;
    for p in &points {
        writeln!(csv_file, "{},{:e},{:e},{:e}", p.rms_nm, p.simulator, p.analytical, p.matrix)?;
    }
    println!("Saved contrast curve to {}", csv_path.display());

    Ok(())
}
