use thiserror::Error;

use crate::io::FitsError;

/// Failure reported by a contrast probe or diffraction simulator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Worth retrying: the same request may succeed on a second attempt.
    #[error("transient probe failure: {0}")]
    Transient(String),

    /// Retrying will not help.
    #[error("probe failure: {0}")]
    Fatal(String),
}

impl ProbeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Transient(_))
    }
}

/// Errors produced while building apertures, baselines, models and matrices.
#[derive(Error, Debug)]
pub enum PastisError {
    /// Erosion found a different number of segment centers than the layout implies.
    #[error("segment count mismatch: expected {expected} segment centers, found {found}")]
    Geometry { expected: usize, found: usize },

    /// A surviving center could not be mapped to exactly one segment.
    #[error("segment center extraction failed: {0}")]
    GeometryMapping(String),

    /// Baseline classification disagrees with the count implied by the geometry.
    #[error(
        "baseline count mismatch: expected {expected}, resolved {found} (check redundancy tolerances)"
    )]
    Tolerance { expected: usize, found: usize },

    /// Aberration vector length does not match the segment count.
    #[error("aberration vector has {found} entries, aperture has {expected} segments")]
    Dimension { expected: usize, found: usize },

    /// No calibration factor for the requested mode and segment.
    #[error("no calibration factor for {mode} on segment {segment}")]
    MissingCalibration { mode: String, segment: usize },

    /// A probe call failed permanently or ran out of retries.
    #[error("probe failed after {attempts} attempt(s): {source}")]
    Probe {
        attempts: usize,
        #[source]
        source: ProbeError,
    },

    #[error("matrix build cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PastisError::Dimension {
            expected: 37,
            found: 36,
        };
        assert!(error.to_string().contains("36 entries"));

        let error = PastisError::Probe {
            attempts: 3,
            source: ProbeError::Transient("socket closed".to_string()),
        };
        assert!(error.to_string().contains("3 attempt(s)"));
        assert!(error.to_string().contains("socket closed"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProbeError::Transient("x".into()).is_transient());
        assert!(!ProbeError::Fatal("x".into()).is_transient());
    }
}
