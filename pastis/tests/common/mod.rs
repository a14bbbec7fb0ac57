//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use pastis::config::models::{HEX_37, HEX_7};
use pastis::{AnalyticalModel, PastisConfig, SegmentedAperture, ZernikeMode};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Aperture with centers measured on the rendered pupil.
pub fn measured_aperture(config: &PastisConfig) -> Arc<SegmentedAperture> {
    Arc::new(
        SegmentedAperture::from_mask(&config.aperture, config.redundancy_tolerance())
            .expect("segment centers should be extractable"),
    )
}

pub fn hex37() -> PastisConfig {
    HEX_37.clone()
}

pub fn hex7() -> PastisConfig {
    HEX_7.clone()
}

/// Uncalibrated analytical model with zero floor.
pub fn analytical_model(config: &PastisConfig, mode: ZernikeMode) -> AnalyticalModel {
    AnalyticalModel::new(measured_aperture(config), &config.optics, mode)
}
