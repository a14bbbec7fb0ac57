//! FITS persistence for baselines, calibration tables and PASTIS matrices
//!
//! Every product is a multi-extension FITS file: an empty primary HDU followed
//! by named 2-D image extensions. Scalar metadata travels as numeric header
//! keywords on the extension it describes. Arrays are stored in row-major
//! ndarray order without any vertical flip.

use std::collections::HashMap;
use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use ndarray::Array2;
use thiserror::Error;

/// Errors that can occur during FITS file operations
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),
    #[error("HDU not found: {0}")]
    HduNotFound(String),
    #[error("Invalid data type in HDU: {0}")]
    InvalidDataType(String),
    #[error("Header keyword {key} missing from HDU {hdu}")]
    MissingKey { hdu: String, key: String },
}

/// Array payload of one image extension
#[derive(Debug, Clone)]
pub enum FitsDataType {
    /// 64-bit signed integer data (indices, ids)
    Int64(Array2<i64>),
    /// 64-bit floating point data
    Float64(Array2<f64>),
}

impl FitsDataType {
    fn dimensions(&self) -> (usize, usize) {
        match self {
            FitsDataType::Int64(arr) => arr.dim(),
            FitsDataType::Float64(arr) => arr.dim(),
        }
    }

    fn image_type(&self) -> ImageType {
        match self {
            FitsDataType::Int64(_) => ImageType::LongLong,
            FitsDataType::Float64(_) => ImageType::Double,
        }
    }

    fn write_data(&self, fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<(), FitsError> {
        match self {
            FitsDataType::Int64(arr) => {
                let flat_data: Vec<i64> = arr.iter().copied().collect();
                hdu.write_image(fptr, &flat_data)?;
            }
            FitsDataType::Float64(arr) => {
                let flat_data: Vec<f64> = arr.iter().copied().collect();
                hdu.write_image(fptr, &flat_data)?;
            }
        }
        Ok(())
    }
}

/// A named image extension with numeric header keywords
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub name: String,
    pub data: FitsDataType,
    pub header: Vec<(String, f64)>,
}

impl FitsImage {
    pub fn new(name: &str, data: FitsDataType) -> Self {
        Self {
            name: name.to_string(),
            data,
            header: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: &str, value: f64) -> Self {
        self.header.push((key.to_string(), value));
        self
    }
}

/// An image extension read back from disk, always as `f64`
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub name: String,
    pub data: Array2<f64>,
    pub header: HashMap<String, f64>,
}

impl LoadedImage {
    /// Value of a header keyword that must be present.
    pub fn key(&self, key: &str) -> Result<f64, FitsError> {
        self.header
            .get(key)
            .copied()
            .ok_or_else(|| FitsError::MissingKey {
                hdu: self.name.clone(),
                key: key.to_string(),
            })
    }
}

/// Write image extensions, in order, to a new FITS file
///
/// # Arguments
/// * `images` - Extensions to write; each name becomes its EXTNAME
/// * `path` - Output path, overwritten when it exists
pub fn write_fits_images<P: AsRef<Path>>(images: &[FitsImage], path: P) -> Result<(), FitsError> {
    let mut fptr = FitsFile::create(path.as_ref()).overwrite().open()?;

    for image in images {
        let (height, width) = image.data.dimensions();
        let image_description = ImageDescription {
            data_type: image.data.image_type(),
            dimensions: &[height, width],
        };

        let hdu = fptr.create_image(image.name.clone(), &image_description)?;
        image.data.write_data(&mut fptr, &hdu)?;
        for (key, value) in &image.header {
            hdu.write_key(&mut fptr, key, *value)?;
        }
    }

    Ok(())
}

/// Read every 2-D image extension of a FITS file
///
/// # Arguments
/// * `path` - Path to the FITS file
/// * `keys` - Header keywords to pick up from each extension when present
///
/// # Returns
/// Map from EXTNAME to the loaded image.
pub fn read_fits_images<P: AsRef<Path>>(
    path: P,
    keys: &[&str],
) -> Result<HashMap<String, LoadedImage>, FitsError> {
    let mut fptr = FitsFile::open(path.as_ref())?;
    let mut images = HashMap::new();

    let mut hdu_idx = 1;
    while let Ok(hdu) = fptr.hdu(hdu_idx) {
        let name = hdu
            .read_key::<String>(&mut fptr, "EXTNAME")
            .unwrap_or_else(|_| format!("HDU_{hdu_idx}"));

        if let HduInfo::ImageInfo { shape, .. } = &hdu.info {
            if shape.len() == 2 {
                let (height, width) = (shape[0], shape[1]);
                let flat: Vec<f64> = hdu.read_image(&mut fptr)?;
                let data = Array2::from_shape_vec((height, width), flat).map_err(|_| {
                    FitsError::InvalidDataType(format!("Cannot reshape image data for HDU '{name}'"))
                })?;

                let header = keys
                    .iter()
                    .filter_map(|&key| {
                        hdu.read_key::<f64>(&mut fptr, key)
                            .ok()
                            .map(|value| (key.to_string(), value))
                    })
                    .collect();

                images.insert(
                    name.clone(),
                    LoadedImage {
                        name,
                        data,
                        header,
                    },
                );
            }
        }

        hdu_idx += 1;
    }

    Ok(images)
}

/// Remove and return the extension called `name`.
pub fn take_image(images: &mut HashMap<String, LoadedImage>, name: &str) -> Result<LoadedImage, FitsError> {
    images
        .remove(name)
        .ok_or_else(|| FitsError::HduNotFound(name.to_string()))
}
