//! I/O utilities for persisting baselines, calibration tables and matrices

pub mod fits;

pub use fits::{read_fits_images, take_image, write_fits_images, FitsDataType, FitsError, FitsImage, LoadedImage};
