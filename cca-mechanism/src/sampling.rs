use crate::MechanismError;
use cca_core::{
    models::{BidderId, GoodId, Map, Program, Sense, Variable, World},
    ports::{MipSolver, PopulationSampler},
};
use rand::{SeedableRng, rngs::StdRng};
use std::time::Duration;
use tracing::{Level, event};

/// How to estimate starting prices from sampled populations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartingPriceSampling {
    /// Random bids drawn per sampled bidder
    pub bids_per_bidder: usize,
    /// Populations drawn
    pub world_samples: usize,
    /// The share of the estimated per-good value used as starting price
    pub fraction: f64,
    /// Seed of the random number generator
    pub seed: u64,
}

impl Default for StartingPriceSampling {
    fn default() -> Self {
        Self {
            bids_per_bidder: 100,
            world_samples: 10,
            fraction: 0.1,
            seed: 0,
        }
    }
}

/// Estimate per-good values by least squares and turn them into starting
/// prices.
///
/// The bids of `sampling.world_samples` redrawn populations are regressed on
/// bundle membership without intercept. Estimates are clipped at zero and
/// multiplied by `sampling.fraction`. Goods that no sampled bid contains get no
/// price.
///
/// Returns `None` when the sampler cannot draw random bids.
pub fn sampled_starting_prices<P: PopulationSampler, S: MipSolver>(
    world: &World,
    bidders: &[BidderId],
    sampler: &P,
    solver: &S,
    sampling: &StartingPriceSampling,
    time_limit: Option<Duration>,
) -> Result<Option<Map<GoodId, f64>>, MechanismError> {
    if !sampler.supports_random_bids() {
        event!(
            Level::ERROR,
            "the valuation model cannot draw random bids, starting prices are not sampled"
        );
        return Ok(None);
    }

    let mut rng = StdRng::seed_from_u64(sampling.seed);
    let mut observations = Vec::new();
    for _ in 0..sampling.world_samples {
        observations.extend(sampler.sample_bids(bidders, sampling.bids_per_bidder, &mut rng));
    }

    // normal equations X'X b = X'y over the goods that occur at all
    let mut columns: Map<GoodId, usize> = Map::default();
    for (bundle, _) in &observations {
        for good in bundle.iter().filter(|&good| world.contains(good)) {
            let next = columns.len();
            columns.entry(good).or_insert(next);
        }
    }
    let n = columns.len();
    let mut gram = vec![0.0; n * n];
    let mut moments = vec![0.0; n];
    for (bundle, value) in &observations {
        let indices: Vec<usize> = bundle
            .iter()
            .filter_map(|good| columns.get(&good).copied())
            .collect();
        for &i in &indices {
            moments[i] += value;
            for &j in &indices {
                gram[i * n + j] += 1.0;
            }
        }
    }

    // minimize b'X'Xb - 2y'Xb
    let mut program = Program::new(Sense::Minimize);
    let vars: Vec<_> = columns
        .keys()
        .map(|good| {
            program.add_variable(Variable::continuous(
                format!("g{good}"),
                f64::NEG_INFINITY,
                f64::INFINITY,
            ))
        })
        .collect();
    for i in 0..n {
        program.add_objective_term(-2.0 * moments[i], vars[i]);
        if gram[i * n + i] != 0.0 {
            program.add_quadratic_term(gram[i * n + i], vars[i], vars[i]);
        }
        for j in (i + 1)..n {
            if gram[i * n + j] != 0.0 {
                program.add_quadratic_term(2.0 * gram[i * n + j], vars[i], vars[j]);
            }
        }
    }

    let solution = solver
        .solve(&program, time_limit)
        .map_err(MechanismError::solver("starting price regression"))?;
    let prices: Map<GoodId, f64> = columns
        .keys()
        .zip(&vars)
        .map(|(&good, &var)| (good, solution.value(var).max(0.0) * sampling.fraction))
        .collect();

    event!(
        Level::INFO,
        observations = observations.len(),
        goods = prices.len(),
        "sampled starting prices"
    );
    Ok(Some(prices))
}
