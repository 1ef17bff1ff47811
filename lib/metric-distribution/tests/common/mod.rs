use metric_distribution::{Distribution, DistributionKind};
use rand::SeedableRng;
use rand_distr::{Distribution as _, Pareto};

pub fn make_points(size: usize) -> Vec<f64> {
    // Samples shaped like web service latencies in microseconds: a big hump at the
    // beginning with a long tail, bottoming out at 15 milliseconds and tailing off
    // up to 10 seconds.
    let distribution = Pareto::new(1.0, 1.0).expect("pareto distribution should be valid");
    let seed = 0xC0FFEE;

    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    distribution
        .sample_iter(&mut rng)
        // Scale by 10,000 to get microseconds.
        .map(|n| n * 10_000.0)
        .filter(|n| *n > 15_000.0 && *n < 10_000_000.0)
        .take(size)
        .collect::<Vec<_>>()
}

pub fn populate(kind: DistributionKind, points: &[f64]) -> Distribution {
    let mut distribution = Distribution::new(kind);
    for point in points {
        distribution
            .add_entry_with_unit(*point, 1.0, "Microseconds")
            .expect("point should be supported");
    }
    distribution
}
