//! Local Zernike modes applied per segment.
//!
//! Modes are identified by their Noll index 1..=11 and evaluated on the unit
//! disk circumscribing a hexagonal segment. The JWST wavefront sensing
//! software (WSS) numbers the same modes differently; [`ZernikeMode::wss_index`]
//! and [`ZernikeMode::from_wss`] convert between the two.

use std::fmt;

use crate::error::PastisError;

pub const MAX_NOLL: u8 = 11;

const NAMES: [&str; MAX_NOLL as usize] = [
    "piston", "tip", "tilt", "defocus", "astig45", "astig0", "ycoma", "xcoma", "ytrefoil",
    "xtrefoil", "spherical",
];

/// WSS index for each Noll index 1..=11.
const NOLL_TO_WSS: [u8; MAX_NOLL as usize] = [1, 2, 3, 5, 4, 6, 8, 7, 10, 11, 9];

/// A single local Zernike mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZernikeMode {
    noll: u8,
}

impl ZernikeMode {
    pub const PISTON: ZernikeMode = ZernikeMode { noll: 1 };
    pub const TIP: ZernikeMode = ZernikeMode { noll: 2 };
    pub const TILT: ZernikeMode = ZernikeMode { noll: 3 };

    pub fn new(noll: u8) -> Result<Self, PastisError> {
        if (1..=MAX_NOLL).contains(&noll) {
            Ok(Self { noll })
        } else {
            Err(PastisError::InvalidConfig(format!(
                "Noll index must be in 1..={MAX_NOLL}, got {noll}"
            )))
        }
    }

    pub fn from_wss(wss: u8) -> Result<Self, PastisError> {
        NOLL_TO_WSS
            .iter()
            .position(|&w| w == wss)
            .map(|i| Self { noll: i as u8 + 1 })
            .ok_or_else(|| PastisError::InvalidConfig(format!("unknown WSS index {wss}")))
    }

    /// Parse a mode name such as `"tip"` or `"astig45"`.
    pub fn from_name(name: &str) -> Result<Self, PastisError> {
        NAMES
            .iter()
            .position(|&n| n.eq_ignore_ascii_case(name))
            .map(|i| Self { noll: i as u8 + 1 })
            .ok_or_else(|| PastisError::InvalidConfig(format!("unknown Zernike mode '{name}'")))
    }

    pub fn noll(&self) -> u8 {
        self.noll
    }

    pub fn wss_index(&self) -> u8 {
        NOLL_TO_WSS[self.noll as usize - 1]
    }

    pub fn name(&self) -> &'static str {
        NAMES[self.noll as usize - 1]
    }

    pub fn is_piston(&self) -> bool {
        self.noll == 1
    }

    pub fn all() -> impl Iterator<Item = ZernikeMode> {
        (1..=MAX_NOLL).map(|noll| ZernikeMode { noll })
    }

    /// Evaluate the RMS-normalized mode at polar coordinates on the unit disk.
    pub fn evaluate(&self, rho: f64, theta: f64) -> f64 {
        let rho2 = rho * rho;
        match self.noll {
            1 => 1.0,
            2 => 2.0 * rho * theta.cos(),
            3 => 2.0 * rho * theta.sin(),
            4 => 3.0f64.sqrt() * (2.0 * rho2 - 1.0),
            5 => 6.0f64.sqrt() * rho2 * (2.0 * theta).sin(),
            6 => 6.0f64.sqrt() * rho2 * (2.0 * theta).cos(),
            7 => 8.0f64.sqrt() * (3.0 * rho2 - 2.0) * rho * theta.sin(),
            8 => 8.0f64.sqrt() * (3.0 * rho2 - 2.0) * rho * theta.cos(),
            9 => 8.0f64.sqrt() * rho2 * rho * (3.0 * theta).sin(),
            10 => 8.0f64.sqrt() * rho2 * rho * (3.0 * theta).cos(),
            _ => 5.0f64.sqrt() * (6.0 * rho2 * rho2 - 6.0 * rho2 + 1.0),
        }
    }

    /// Evaluate at a Cartesian offset from the segment center.
    pub fn evaluate_xy(&self, dx: f64, dy: f64, radius: f64) -> f64 {
        let rho = (dx * dx + dy * dy).sqrt() / radius;
        self.evaluate(rho, dy.atan2(dx))
    }
}

impl fmt::Display for ZernikeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Z{})", self.name(), self.noll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_noll_range() {
        assert!(ZernikeMode::new(0).is_err());
        assert!(ZernikeMode::new(12).is_err());
        assert_eq!(ZernikeMode::new(4).unwrap().name(), "defocus");
        assert_eq!(ZernikeMode::all().count(), 11);
    }

    #[test]
    fn test_wss_mapping() {
        assert_eq!(ZernikeMode::new(4).unwrap().wss_index(), 5);
        assert_eq!(ZernikeMode::new(11).unwrap().wss_index(), 9);
        for mode in ZernikeMode::all() {
            assert_eq!(ZernikeMode::from_wss(mode.wss_index()).unwrap(), mode);
        }
        assert!(ZernikeMode::from_wss(12).is_err());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ZernikeMode::from_name("Tip").unwrap(), ZernikeMode::TIP);
        assert!(ZernikeMode::from_name("coma").is_err());
    }

    #[test]
    fn test_values() {
        assert_relative_eq!(ZernikeMode::PISTON.evaluate(0.7, 1.0), 1.0);
        assert_relative_eq!(ZernikeMode::TIP.evaluate(1.0, 0.0), 2.0);
        assert_relative_eq!(ZernikeMode::TILT.evaluate(1.0, PI / 2.0), 2.0, epsilon = 1e-12);
        let defocus = ZernikeMode::new(4).unwrap();
        assert_relative_eq!(defocus.evaluate(0.0, 0.0), -(3.0f64.sqrt()));
        assert_relative_eq!(ZernikeMode::TIP.evaluate_xy(0.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_unit_rms_on_disk() {
        // Midpoint quadrature over the unit disk
        let steps = 400;
        for mode in ZernikeMode::all() {
            let mut sum = 0.0;
            let mut area = 0.0;
            for i in 0..steps {
                let rho = (i as f64 + 0.5) / steps as f64;
                for k in 0..steps {
                    let theta = 2.0 * PI * (k as f64 + 0.5) / steps as f64;
                    let v = mode.evaluate(rho, theta);
                    sum += v * v * rho;
                    area += rho;
                }
            }
            assert_relative_eq!(sum / area, 1.0, epsilon = 1e-3);
        }
    }
}
