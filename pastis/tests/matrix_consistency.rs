//! PASTIS matrix construction against the analytical model and the
//! reference coronagraph

mod common;

use std::sync::atomic::AtomicBool;

use approx::assert_relative_eq;
use float_cmp::approx_eq;
use pastis::aberration::random_rms_aberration;
use pastis::{
    calibrate, CalibrationSet, ContrastProbe, MatrixBuilder, PastisError, PastisMatrix,
    PerfectCoronagraph, SimulatorProbe, ZernikeMode,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn relative_error(a: f64, b: f64) -> f64 {
    (a - b).abs() / b.abs()
}

#[test]
fn test_analytical_matrix_reproduces_model() {
    common::init_logging();
    let config = common::hex37();
    let model = common::analytical_model(&config, ZernikeMode::PISTON).with_coronagraph_floor(2e-11);

    let (matrix, raw) = MatrixBuilder::new(1.0)
        .with_obscured_segment(Some(0))
        .build(&model, &AtomicBool::new(false))
        .unwrap();

    assert_relative_eq!(raw.floor, 2e-11, max_relative = 1e-12);
    assert!(matrix.asymmetry() == 0.0);
    for j in 0..37 {
        assert_eq!(matrix.matrix()[[0, j]], 0.0);
    }

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..5 {
        let a = random_rms_aberration(37, 1.0, Some(0), &mut rng);
        let predicted = matrix.contrast(&a).unwrap();
        let direct = model.mean_contrast(&a).unwrap();
        assert!(
            relative_error(predicted, direct) < 1e-6,
            "matrix {predicted:e} vs model {direct:e}"
        );
    }
}

#[test]
fn test_pair_term_matches_baseline_cross_term() {
    // Segments 5 and 12 of the layout (0-based 4 and 11), tip mode, unit calibration
    let config = common::hex37();
    let model = common::analytical_model(&config, ZernikeMode::TIP);
    let amp = 1.0;

    let mut a = vec![0.0; 37];
    let mut probe = |segments: &[usize]| {
        a.iter_mut().for_each(|v| *v = 0.0);
        for &k in segments {
            a[k] = amp;
        }
        model.mean_contrast(&a).unwrap()
    };
    let r_ij = probe(&[4, 11]);
    let r_ii = probe(&[4]);
    let r_jj = probe(&[11]);
    let m_ij = (r_ij - r_ii - r_jj) / 2.0 / (amp * amp);

    let rad = model.optics().nm_to_rad(1.0);
    let expected = rad * rad * model.pair_cross_term(4, 11);
    assert!(approx_eq!(f64, m_ij, expected, epsilon = 1e-6 * expected.abs()));

    let (matrix, _) = MatrixBuilder::new(amp)
        .with_obscured_segment(Some(0))
        .build(&model, &AtomicBool::new(false))
        .unwrap();
    assert_relative_eq!(matrix.matrix()[[4, 11]], expected, max_relative = 1e-6);
}

#[test]
fn test_zero_and_global_piston_give_floor() {
    let config = common::hex37();
    let model = common::analytical_model(&config, ZernikeMode::PISTON).with_coronagraph_floor(5e-11);

    assert_relative_eq!(model.mean_contrast(&[0.0; 37]).unwrap(), 5e-11);
    let mut piston = vec![4.0; 37];
    piston[0] = 0.0;
    assert_relative_eq!(model.mean_contrast(&piston).unwrap(), 5e-11, max_relative = 1e-9);
}

#[test]
fn test_wrong_length_is_rejected() {
    let config = common::hex7();
    let model = common::analytical_model(&config, ZernikeMode::TIP);
    assert!(matches!(
        model.mean_contrast(&[0.0; 36]),
        Err(PastisError::Dimension {
            expected: 7,
            found: 36
        })
    ));

    let matrix = PastisMatrix::from_raw(
        &MatrixBuilder::new(1.0)
            .measure(&model, &AtomicBool::new(false), || {})
            .unwrap(),
    );
    assert!(matches!(
        matrix.contrast(&[0.0; 8]),
        Err(PastisError::Dimension { .. })
    ));
}

#[test]
fn test_simulator_matrix_predicts_simulator() {
    common::init_logging();
    let config = common::hex7();
    let aperture = common::measured_aperture(&config);
    let probe = SimulatorProbe::new(
        PerfectCoronagraph::new(&aperture, &config.optics),
        &config.optics,
        ZernikeMode::PISTON,
        1,
    );

    let (matrix, _) = MatrixBuilder::new(1.0)
        .with_obscured_segment(Some(0))
        .build(&probe, &AtomicBool::new(false))
        .unwrap();
    assert!(matrix.asymmetry() < 1e-20);

    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..3 {
        let a = random_rms_aberration(7, 1.0, Some(0), &mut rng);
        let predicted = matrix.contrast(&a).unwrap();
        let direct = probe.mean_contrast(&a).unwrap();
        assert!(
            relative_error(predicted, direct) < 0.05,
            "matrix {predicted:e} vs simulator {direct:e}"
        );
    }
}

#[test]
fn test_calibrated_model_tracks_simulator() {
    let config = common::hex7();
    let aperture = common::measured_aperture(&config);
    let probe = SimulatorProbe::new(
        PerfectCoronagraph::new(&aperture, &config.optics),
        &config.optics,
        ZernikeMode::PISTON,
        1,
    );
    let model = pastis::AnalyticalModel::new(aperture.clone(), &config.optics, ZernikeMode::PISTON);

    let table = calibrate(&model, &probe, 1.0).unwrap();
    assert_eq!(table.factor(0), Some(0.0));
    for &factor in &table.factors()[1..] {
        assert!(factor > 0.5 && factor < 2.0, "calibration factor {factor}");
    }

    let mut set = CalibrationSet::new();
    set.insert(table);
    let calibrated = model.with_calibration(&set);

    let mut rng = StdRng::seed_from_u64(5);
    let a = random_rms_aberration(7, 1.0, Some(0), &mut rng);
    let modelled = calibrated.mean_contrast(&a).unwrap();
    let simulated = probe.mean_contrast(&a).unwrap();
    assert!(
        relative_error(modelled, simulated) < 0.2,
        "calibrated model {modelled:e} vs simulator {simulated:e}"
    );
}

#[test]
fn test_cancelled_batch() {
    let config = common::hex7();
    let model = common::analytical_model(&config, ZernikeMode::TIP);
    let result = MatrixBuilder::new(1.0).build(&model, &AtomicBool::new(true));
    assert!(matches!(result, Err(PastisError::Cancelled)));
}
