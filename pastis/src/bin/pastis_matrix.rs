//! Build the PASTIS matrix of a segmented aperture
//!
//! Probes every segment pair with the analytical model or the reference
//! coronagraph, converts the pair contrasts into the contrast-per-nm² matrix,
//! saves it, and checks the quadratic-form prediction against a direct probe
//! for a random aberration.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use pastis::aberration::random_rms_aberration;
use pastis::shared_args::SharedPastisArgs;
use pastis::{
    AnalyticalModel, CalibrationSet, CalibrationTable, ContrastProbe, MatrixBuilder, MatrixHeader,
    PastisMatrix, PerfectCoronagraph, SegmentedAperture, SimulatorProbe,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeKind {
    /// Analytical interference model
    Analytical,
    /// FFT-based perfect coronagraph
    Simulator,
}

/// Command line arguments for matrix generation
#[derive(Parser, Debug)]
#[command(
    name = "PASTIS Matrix",
    about = "Measures the PASTIS contrast matrix of a segmented aperture",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedPastisArgs,

    /// Contrast probe used for the pair pokes
    #[arg(long, value_enum, default_value_t = ProbeKind::Analytical)]
    probe: ProbeKind,

    /// Calibration table(s) for the analytical model
    #[arg(long)]
    calibration: Vec<PathBuf>,

    /// Poke amplitude in nm (defaults to the configuration value)
    #[arg(long)]
    amplitude: Option<f64>,

    /// RMS in nm of the random aberration used for the consistency check
    #[arg(long, default_value_t = 1.0)]
    check_rms: f64,

    /// Random seed for the consistency check
    #[arg(long, default_value_t = 42)]
    seed: u64,
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

    let probe: Box<dyn ContrastProbe> = match args.probe {
        ProbeKind::Analytical => {
            let mut calibration = CalibrationSet::new();
            for path in &args.calibration {
                let table = CalibrationTable::load(path)
                    .with_context(|| format!("reading calibration {}", path.display()))?;
                info!("Loaded {} calibration from {}", table.mode(), path.display());
                calibration.insert(table);
            }
            let calibration = (!args.calibration.is_empty()).then_some(&calibration);
            Box::new(AnalyticalModel::from_config(
                Arc::clone(&aperture),
                &config,
                calibration,
            )?)
        }
        ProbeKind::Simulator => Box::new(SimulatorProbe::from_config(
            PerfectCoronagraph::new(&aperture, &config.optics),
            &config,
        )?),
    };

    let n = aperture.segment_count();
    let active = config.aperture.active_segment_count();
    let progress_style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
        .progress_chars("█▉▊▋▌▍▎▏ ");
    let pb = ProgressBar::new((active * (active + 1) / 2) as u64);
    pb.set_style(progress_style);
    pb.set_message(format!("Probing {mode} pairs"));

    let cancel = AtomicBool::new(false);
    let builder = MatrixBuilder::new(amplitude).with_obscured_segment(config.aperture.obscured_segment);
    let raw = builder.measure(probe.as_ref(), &cancel, || pb.inc(1))?;
    pb.finish_with_message("Pairs probed");

    let matrix = PastisMatrix::from_raw(&raw);
    println!(
        "PASTIS matrix {}x{}: floor {:.3e}, max asymmetry {:.2e}",
        n,
        n,
        matrix.floor(),
        matrix.asymmetry()
    );

    let header = MatrixHeader {
        wavelength_nm: config.optics.wavelength_nm,
        noll: mode.noll(),
    };
    let file_name = format!("pastis_matrix_{}_{:?}.fits", mode.name(), args.probe).to_lowercase();
    let path = args.shared.output_path(&file_name)?;
    matrix.save(&path, &header, Some(&raw))?;
    println!("Saved matrix to {}", path.display());

    let mut rng = StdRng::seed_from_u64(args.seed);
    let aberration = random_rms_aberration(n, args.check_rms, config.aperture.obscured_segment, &mut rng);
    let predicted = matrix.contrast(&aberration)?;
    let measured = probe.mean_contrast(&aberration)?;
    println!(
        "Consistency at {:.2} nm rms: matrix {:.4e}, probe {:.4e}, relative error {:.2}%",
        args.check_rms,
        predicted,
        measured,
        100.0 * (predicted - measured).abs() / measured.abs().max(f64::MIN_POSITIVE)
    );

    Ok(())
}
