use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{models, PastisConfig};
use crate::error::PastisError;
use crate::zernike::ZernikeMode;

/// Predefined aperture models selectable from the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelArg {
    /// 37 segments, 3 rings, central segment obscured
    Hex37,
    /// 7 segments, 1 ring, central segment obscured
    Hex7,
}

/// Parse a mode given as a Noll index ("2") or a name ("tip")
fn parse_mode(s: &str) -> Result<ZernikeMode, String> {
    let mode = match s.trim().parse::<u8>() {
        Ok(noll) => ZernikeMode::new(noll),
        Err(_) => ZernikeMode::from_name(s.trim()),
    };
    mode.map_err(|e| e.to_string())
}

/// Common arguments shared across the PASTIS binaries
#[derive(Parser, Debug, Clone)]
pub struct SharedPastisArgs {
    /// JSON configuration file; overrides --model
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Predefined aperture model used when no configuration file is given
    #[arg(long, value_enum, default_value_t = ModelArg::Hex37)]
    pub model: ModelArg,

    /// Wavelength in nanometers (overrides the configuration)
    #[arg(long)]
    pub wavelength: Option<f64>,

    /// Local Zernike mode, Noll index or name (overrides the configuration)
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<ZernikeMode>,

    /// Directory for FITS and JSON outputs
    #[arg(long, default_value = "pastis_output")]
    pub output_dir: PathBuf,
}

impl SharedPastisArgs {
    /// Resolve the run configuration from file or model, apply overrides and validate it.
    pub fn load_config(&self) -> Result<PastisConfig, PastisError> {
        let mut config = match &self.config {
            Some(path) => PastisConfig::load_from_file(path)?,
            None => match self.model {
                ModelArg::Hex37 => models::HEX_37.clone(),
                ModelArg::Hex7 => models::HEX_7.clone(),
            },
        };
        if let Some(wavelength) = self.wavelength {
            config = config.with_wavelength(wavelength);
        }
        if let Some(mode) = self.mode {
            config = config.with_mode(mode.noll());
        }
        config.validate()?;
        Ok(config)
    }

    /// Create the output directory and return the path of `file_name` inside it.
    pub fn output_path(&self, file_name: &str) -> Result<PathBuf, PastisError> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }
}
