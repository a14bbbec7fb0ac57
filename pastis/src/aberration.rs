//! Helpers for building and characterizing segment aberration vectors.

use rand::Rng;

/// Root-mean-square of the entries.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Subtract the mean over the non-obscured segments; the obscured entry is set to 0.
pub fn remove_global_piston(aberration: &mut [f64], obscured: Option<usize>) {
    if let Some(k) = obscured.filter(|&k| k < aberration.len()) {
        aberration[k] = 0.0;
    }
    let active = aberration.len() - usize::from(obscured.map_or(false, |k| k < aberration.len()));
    if active == 0 {
        return;
    }
    let mean = aberration.iter().sum::<f64>() / active as f64;
    for (i, v) in aberration.iter_mut().enumerate() {
        if Some(i) != obscured {
            *v -= mean;
        }
    }
}

/// Random aberration with a given RMS over the active segments.
///
/// Values are drawn uniformly, the global piston is removed, the obscured
/// segment is zeroed, and the result is scaled to `rms_nm`.
pub fn random_rms_aberration<R: Rng + ?Sized>(
    segments: usize,
    rms_nm: f64,
    obscured: Option<usize>,
    rng: &mut R,
) -> Vec<f64> {
    let mut aberration: Vec<f64> = (0..segments).map(|_| rng.gen_range(-1.0..1.0)).collect();
    remove_global_piston(&mut aberration, obscured);

    let active: Vec<f64> = aberration
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != obscured)
        .map(|(_, &v)| v)
        .collect();
    let current = rms(&active);
    if current > 0.0 {
        let scale = rms_nm / current;
        aberration.iter_mut().for_each(|v| *v *= scale);
    }
    aberration
}
