use aerosol_gde::kalman::{rts_smooth, GaussianEstimate, KalmanFilter, KalmanTrajectory};
use aerosol_gde::linearize::AffineTransition;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

#[test]
fn perfect_observation_recovers_state_in_one_update() {
    let truth = DVector::from_vec(vec![1.5, -0.5, 2.0]);
    let filter = KalmanFilter::new(DMatrix::identity(3, 3));
    let prior = GaussianEstimate::new(DVector::zeros(3), DMatrix::identity(3, 3) * 2.0).unwrap();
    let transition = AffineTransition {
        matrix: DMatrix::identity(3, 3),
        vector: DVector::zeros(3),
    };
    let predicted = filter.predict(&prior, &transition, &DMatrix::zeros(3, 3), 1).unwrap();
    let updated = filter.update(&predicted, &truth, &DMatrix::zeros(3, 3), 1).unwrap();
    assert_matrix_eq!(updated.mean, truth, comp = abs, tol = 1e-12);
    assert_matrix_eq!(updated.covariance, DMatrix::zeros(3, 3), comp = abs, tol = 1e-12);
}

#[test]
fn identical_observations_converge_to_constant_state() {
    let truth = DVector::from_vec(vec![0.3, 1.2]);
    let h = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let filter = KalmanFilter::new(h.clone());
    let r = DMatrix::identity(3, 3) * 0.04;
    let transition = AffineTransition {
        matrix: DMatrix::identity(2, 2),
        vector: DVector::zeros(2),
    };
    let observation = &h * &truth;

    let mut estimate = GaussianEstimate::new(DVector::zeros(2), DMatrix::identity(2, 2) * 10.0).unwrap();
    for k in 1..=200 {
        let predicted = filter.predict(&estimate, &transition, &DMatrix::zeros(2, 2), k).unwrap();
        estimate = filter.update(&predicted, &observation, &r, k).unwrap();
    }
    assert_matrix_eq!(estimate.mean, truth, comp = abs, tol = 1e-3);
    for i in 0..2 {
        assert!(estimate.covariance[(i, i)] <= r[(i, i)]);
    }
}

fn linear_gaussian_trajectory(num_steps: usize) -> KalmanTrajectory<f64> {
    let f = DMatrix::from_row_slice(3, 3, &[0.9, 0.1, 0.0, -0.1, 0.95, 0.05, 0.0, 0.0, 0.8]);
    let transition = AffineTransition {
        matrix: f.clone(),
        vector: DVector::from_vec(vec![0.1, 0.0, -0.05]),
    };
    let q = DMatrix::from_row_slice(3, 3, &[0.02, 0.005, 0.0, 0.005, 0.01, 0.0, 0.0, 0.0, 0.03]);
    let h = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 0.5, 0.5]);
    let r = DMatrix::identity(2, 2) * 0.1;
    let filter = KalmanFilter::new(h);

    let prior = GaussianEstimate::new(DVector::from_element(3, 1.0), DMatrix::identity(3, 3)).unwrap();
    let mut trajectory = KalmanTrajectory::new(prior);
    for k in 1..num_steps {
        let observation = DVector::from_vec(vec![(k as f64 * 0.3).sin(), (k as f64 * 0.2).cos()]);
        let predicted = filter.predict(trajectory.last(), &transition, &q, k).unwrap();
        let updated = filter.update(&predicted, &observation, &r, k).unwrap();
        trajectory.push(f.clone(), predicted, updated);
    }
    trajectory
}

#[test]
fn smoothing_never_increases_covariance_trace() {
    let trajectory = linear_gaussian_trajectory(30);
    let smoothed = rts_smooth(&trajectory).unwrap();
    assert_eq!(smoothed.len(), trajectory.len());
    for (smoothed, filtered) in smoothed.iter().zip(&trajectory.filtered) {
        assert!(smoothed.covariance.trace() <= filtered.covariance.trace() + 1e-12);
        assert_matrix_eq!(smoothed.covariance.clone(), smoothed.covariance.transpose(), comp = float);
    }
    // The last estimate has no future observations to use
    let last = trajectory.len() - 1;
    assert_matrix_eq!(smoothed[last].mean.clone(), trajectory.filtered[last].mean.clone(), comp = float);
}

#[test]
fn smoother_reports_singular_prediction() {
    let prior: GaussianEstimate<f64> = GaussianEstimate::new(DVector::zeros(2), DMatrix::zeros(2, 2)).unwrap();
    let mut trajectory = KalmanTrajectory::new(prior.clone());
    trajectory.push(DMatrix::identity(2, 2), prior.clone(), prior);
    assert!(rts_smooth(&trajectory).is_err());
}
