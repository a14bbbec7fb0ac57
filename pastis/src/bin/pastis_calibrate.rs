//! Calibrate the analytical model against the reference perfect coronagraph
//!
//! Pokes every active segment with the calibration amplitude in both the
//! analytical model and the FFT-based simulator, and stores the per-segment
//! scale factors that reconcile the two.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pastis::aberration::rms;
use pastis::shared_args::SharedPastisArgs;
use pastis::{calibrate, AnalyticalModel, PerfectCoronagraph, SegmentedAperture, SimulatorProbe};

/// Command line arguments for model calibration
#[derive(Parser, Debug)]
#[command(
    name = "PASTIS Calibrate",
    about = "Computes per-segment calibration factors for the analytical contrast model",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedPastisArgs,

    /// Calibration amplitude in nm (defaults to the configuration value)
    #[arg(long)]
    amplitude: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args.shared.load_config()?;
    let mode = config.mode()?;
    let amplitude = args.amplitude.unwrap_or(config.calibration_aberration_nm);

    let aperture = Arc::new(
        SegmentedAperture::from_mask(&config.aperture, config.redundancy_tolerance())
            .context("segment center extraction failed")?,
    );
    aperture.validate()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")?);
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    spinner.set_message("Precomputing analytical model");
    let model = AnalyticalModel::new(Arc::clone(&aperture), &config.optics, mode);

    spinner.set_message("Rendering reference coronagraph");
    let simulator = SimulatorProbe::from_config(
        PerfectCoronagraph::new(&aperture, &config.optics),
        &config,
    )?;

    spinner.set_message(format!("Calibrating {mode} at {amplitude} nm"));
    let table = calibrate(&model, &simulator, amplitude)?;
    spinner.finish_with_message("Calibration done");

    let active: Vec<f64> = config
        .aperture
        .active_segments()
        .map(|k| table.factors()[k])
        .collect();
    let mean = active.iter().sum::<f64>() / active.len() as f64;
    println!(
        "{} factors: mean {:.4}, rms {:.4}, min {:.4}, max {:.4}",
        mode,
        mean,
        rms(&active),
        active.iter().copied().fold(f64::INFINITY, f64::min),
        active.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    );

    let path = args
        .shared
        .output_path(&format!("calibration_{}.fits", mode.name()))?;
    table.save(&path)?;
    println!("Saved calibration table to {}", path.display());

    Ok(())
}
