use nalgebra::{DMatrix, DVector};
use okde::prelude::*;
use okde::result::CovarianceError;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256Plus;

const TOL: f64 = 1E-12;

fn point(xs: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(xs)
}

/// 1000 points: 30% around (3, 2) and 20% around (7, 4) with sd 0.2, then
/// 50% around (3, 8) with sd 0.5, in that order.
fn clustered_stream(seed: u64) -> Vec<DVector<f64>> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    let clusters = [
        (300, [3.0, 2.0], 0.2),
        (200, [7.0, 4.0], 0.2),
        (500, [3.0, 8.0], 0.5),
    ];

    clusters
        .iter()
        .flat_map(|&(n, mu, sd)| {
            let nx = Normal::new(mu[0], sd).unwrap();
            let ny = Normal::new(mu[1], sd).unwrap();
            (0..n)
                .map(|_| point(&[nx.sample(&mut rng), ny.sample(&mut rng)]))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn fit(stream: &[DVector<f64>]) -> Session {
    let mut session = Session::new(2, 1.0, 0.02).unwrap();
    let first: Vec<Sample> =
        stream[..3].iter().cloned().map(Sample::from).collect();
    session.update(&first).unwrap();
    for x in &stream[3..] {
        session.observe(x.clone()).unwrap();
    }
    session
}

#[test]
fn three_samples_give_three_equal_components() {
    let mut session = Session::new(2, 1.0, 0.02).unwrap();
    let batch = vec![
        Sample::new(point(&[3.0, 2.0])),
        Sample::new(point(&[7.0, 4.0])),
        Sample::new(point(&[3.0, 8.0])),
    ];
    session.update(&batch).unwrap();

    let mm = session.mixture();
    assert_eq!(mm.k(), 3);
    assert::close(mm.weights(), vec![1.0 / 3.0; 3], TOL);
    assert_eq!(mm.components()[0].mu(), &point(&[3.0, 2.0]));
    assert_eq!(mm.components()[1].mu(), &point(&[7.0, 4.0]));
    assert_eq!(mm.components()[2].mu(), &point(&[3.0, 8.0]));
}

#[test]
fn clustered_stream_is_compressed_and_keeps_its_modes() {
    let stream = clustered_stream(0x1234);
    let session = fit(&stream);
    let mm = session.mixture();

    assert!(mm.k() <= 20, "{} components", mm.k());
    assert::close(mm.total_weight(), 1.0, 1E-9);

    let centers = [[3.0, 2.0], [7.0, 4.0], [3.0, 8.0]];
    for c in centers.iter() {
        let f0 = session.evaluate(&point(c)).unwrap();
        for (dx, dy) in [(0.5, 0.0), (-0.5, 0.0), (0.0, 0.5), (0.0, -0.5)] {
            let f1 = session.evaluate(&point(&[c[0] + dx, c[1] + dy])).unwrap();
            assert!(f1 < f0, "({}, {}) is not a local maximum", c[0], c[1]);
        }
    }
}

#[test]
fn clustered_stream_keeps_cluster_masses() {
    let stream = clustered_stream(0xabcd);
    let session = fit(&stream);

    let centers = [[3.0, 2.0], [7.0, 4.0], [3.0, 8.0]];
    let expected = [0.3, 0.2, 0.5];

    for (c, &w) in centers.iter().zip(expected.iter()) {
        let mass: f64 = session
            .mixture()
            .components()
            .iter()
            .filter(|cpnt| {
                let mu = cpnt.mu();
                (mu[0] - c[0]).hypot(mu[1] - c[1]) < 2.0
            })
            .map(|cpnt| cpnt.weight())
            .sum();
        assert::close(mass, w, 0.02);
    }
}

#[test]
fn fresh_session_cannot_be_evaluated() {
    let session = Session::new(2, 1.0, 0.02).unwrap();
    assert_eq!(
        session.evaluate(&point(&[0.0, 0.0])),
        Err(KdeError::EmptyDistribution)
    );
}

#[test]
fn negative_eigenvalue_covariance_is_rejected() {
    let mut session = Session::new(2, 1.0, 0.02).unwrap();
    session.observe(point(&[0.0, 0.0])).unwrap();
    let before = session.clone();

    // eigenvalues 3 and -1
    let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
    let res = session.update(&[Sample::new(point(&[1.0, 1.0])).with_cov(cov)]);

    match res {
        Err(KdeError::InvalidCovariance(
            CovarianceError::NegativeEigenvalue { .. },
        )) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(session, before);
}

#[test]
fn forgetting_tracks_a_moving_distribution() {
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5eed);
    let mut session = Session::new(1, 0.95, 0.02).unwrap();

    let before = Normal::new(-5.0, 0.5).unwrap();
    let after = Normal::new(5.0, 0.5).unwrap();
    for _ in 0..200 {
        session.observe(point(&[before.sample(&mut rng)])).unwrap();
    }
    for _ in 0..200 {
        session.observe(point(&[after.sample(&mut rng)])).unwrap();
    }

    let old = session.evaluate(&point(&[-5.0])).unwrap();
    let new = session.evaluate(&point(&[5.0])).unwrap();
    assert!(new > 100.0 * old);
}

#[test]
fn marginal_of_fitted_session_keeps_modes() {
    let stream = clustered_stream(7);
    let session = fit(&stream);
    let marg = session.marginal(&[1]).unwrap();

    // along y the modes are at 2, 4 and 8
    let f = |y: f64| marg.evaluate(&point(&[y])).unwrap();
    assert!(f(8.0) > f(6.0));
    assert!(f(2.0) > f(3.0));
    assert::close(marg.total_weight(), 1.0, 1E-9);
}
