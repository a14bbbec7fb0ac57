//! Resolve the redundant baselines of a segmented aperture
//!
//! Renders the pupil, extracts segment centers, classifies segment pairs into
//! distinct baselines, checks the count against the layout and caches the
//! result as FITS.

use anyhow::{Context, Result};
use clap::Parser;
use pastis::shared_args::SharedPastisArgs;
use pastis::SegmentedAperture;

/// Command line arguments for baseline resolution
#[derive(Parser, Debug)]
#[command(
    name = "PASTIS Baselines",
    about = "Resolves redundant segment-pair baselines of a hexagonal aperture",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedPastisArgs,

    /// Use exact lattice centers instead of centers measured on the rendered pupil
    #[arg(long, default_value_t = false)]
    ideal: bool,

    /// Print every baseline with its member pairs
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args.shared.load_config()?;
    let tolerance = config.redundancy_tolerance();
    println!(
        "{}: {} segments, pitch {:.3} m, tolerances {:.4} m / {:.4} m²",
        config.name,
        config.aperture.segment_count(),
        config.aperture.pitch_m(),
        tolerance.length,
        tolerance.cross
    );

    let aperture = if args.ideal {
        SegmentedAperture::ideal(&config.aperture, tolerance)
    } else {
        SegmentedAperture::from_mask(&config.aperture, tolerance)
            .context("segment center extraction failed")?
    };

    let baselines = aperture.baselines();
    println!(
        "Resolved {} distinct baselines (expected {})",
        baselines.len(),
        config.expected_baseline_count()
    );

    if args.verbose {
        for b in baselines.baselines() {
            let pairs = baselines.pairs(b.id);
            println!(
                "  #{:>3} |b| = {:.3} m  ({:+.3}, {:+.3})  {} pairs, e.g. {:?}",
                b.id,
                b.vector.norm(),
                b.vector.x,
                b.vector.y,
                pairs.len(),
                b.pair
            );
        }
    }

    aperture
        .validate()
        .context("baseline count disagrees with the layout; adjust the redundancy tolerances")?;

    let path = args.shared.output_path("baselines.fits")?;
    aperture.save(&path)?;
    config.save_to_file(args.shared.output_path("config.json")?)?;
    println!("Saved baselines to {}", path.display());

    Ok(())
}
