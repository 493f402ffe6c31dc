//! Writing-order optimization by simulated annealing.
//!
//! The objective is the Manhattan length of the open stage path through all
//! entries in writing order. Moves swap two positions of the current order;
//! the cost change is computed from the at most four edges touching the
//! swapped positions.

use super::config::AnnealingConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::positionlist::Positionlist;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lists larger than this compute distances on the fly instead of storing
/// the full matrix.
const MATRIX_MAX_ENTRIES: usize = 4096;
/// Iterations between two progress events.
const PROGRESS_STRIDE: u64 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct SortOutcome {
    /// The applied order: row `k` of the sorted list was row `order[k]`.
    pub order: Vec<usize>,
    pub initial_length: f64,
    pub best_length: f64,
    pub iterations: u64,
}

fn manhattan(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

enum Distances {
    Matrix { n: usize, values: Vec<f64> },
    OnTheFly(Vec<(f64, f64)>),
}

impl Distances {
    fn new(positions: &[(f64, f64)]) -> Self {
        let n = positions.len();
        if n > MATRIX_MAX_ENTRIES {
            return Distances::OnTheFly(positions.to_vec());
        }
        let row = |a: usize| positions.iter().map(move |&p| manhattan(positions[a], p));

        #[cfg(feature = "parallel")]
        let values: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(row)
            .collect();
        #[cfg(not(feature = "parallel"))]
        let values: Vec<f64> = (0..n).flat_map(row).collect();

        Distances::Matrix { n, values }
    }

    #[inline]
    fn get(&self, a: usize, b: usize) -> f64 {
        match self {
            Distances::Matrix { n, values } => values[a * n + b],
            Distances::OnTheFly(positions) => manhattan(positions[a], positions[b]),
        }
    }

    fn path_length(&self, order: &[usize]) -> f64 {
        order.windows(2).map(|w| self.get(w[0], w[1])).sum()
    }
}

/// Manhattan length of the open path visiting `positions` in `order`.
pub fn path_length(positions: &[(f64, f64)], order: &[usize]) -> f64 {
    order
        .windows(2)
        .map(|w| manhattan(positions[w[0]], positions[w[1]]))
        .sum()
}

/// Length of the edges that touch positions `i` and `j` of `order`.
fn touching_length(distances: &Distances, order: &[usize], i: usize, j: usize) -> f64 {
    let n = order.len();
    // Edge k joins positions k and k + 1.
    let mut edges = [i.wrapping_sub(1), i, j.wrapping_sub(1), j];
    edges.sort_unstable();
    let mut total = 0.0;
    for (k, &edge) in edges.iter().enumerate() {
        if edge >= n - 1 || (k > 0 && edges[k - 1] == edge) {
            continue;
        }
        total += distances.get(order[edge], order[edge + 1]);
    }
    total
}

fn expected_iterations(t0: f64, config: &AnnealingConfig) -> u64 {
    let steps = if t0 > config.final_temperature {
        ((config.final_temperature / t0).ln() / (1.0 - config.cooling_rate).ln()).ceil() as u64
    } else {
        0
    };
    config.max_iterations.map_or(steps, |max| steps.min(max))
}

/// Searches for a short writing order of `positions`.
///
/// The search starts from a random permutation, but the input order is
/// always a candidate, so the returned order is never longer than it.
#[instrument(skip_all, fields(entries = positions.len()))]
pub fn anneal_order<R: Rng + ?Sized>(
    positions: &[(f64, f64)],
    config: &AnnealingConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> SortOutcome {
    let n = positions.len();
    let identity: Vec<usize> = (0..n).collect();
    if n < 3 {
        let length = path_length(positions, &identity);
        return SortOutcome {
            order: identity,
            initial_length: length,
            best_length: length,
            iterations: 0,
        };
    }

    let distances = Distances::new(positions);
    let initial_length = distances.path_length(&identity);
    let mut best = identity.clone();
    let mut best_length = initial_length;

    let mut current = identity;
    current.shuffle(rng);
    let mut current_length = distances.path_length(&current);
    if current_length < best_length {
        best.copy_from_slice(&current);
        best_length = current_length;
    }

    let t0 = config.initial_temperature_for(n);
    let total = expected_iterations(t0, config);
    let limit = config.max_iterations.unwrap_or(u64::MAX);
    reporter.report(Progress::AnnealStart {
        iterations: total,
        initial_length,
    });

    let mut temperature = t0;
    let mut iterations = 0u64;
    while temperature > config.final_temperature && iterations < limit {
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let old = touching_length(&distances, &current, i, j);
        current.swap(i, j);
        let new = touching_length(&distances, &current, i, j);
        let delta = old - new;

        if (delta / temperature).exp() > rng.r#gen::<f64>() {
            current_length -= delta;
            if current_length < best_length {
                best.copy_from_slice(&current);
                best_length = current_length;
            }
        } else {
            current.swap(i, j);
        }

        temperature *= 1.0 - config.cooling_rate;
        iterations += 1;
        if iterations % PROGRESS_STRIDE == 0 {
            reporter.report(Progress::AnnealAdvance {
                iterations: PROGRESS_STRIDE,
                best_length,
            });
        }
    }

    // The running length accumulates rounding error; report the exact one.
    let best_length = distances.path_length(&best);
    reporter.report(Progress::AnnealAdvance {
        iterations: iterations % PROGRESS_STRIDE,
        best_length,
    });
    reporter.report(Progress::AnnealFinish { best_length });
    debug!(
        "Annealing finished after {} iterations at T = {:.3}",
        iterations, temperature
    );
    SortOutcome {
        order: best,
        initial_length,
        best_length,
        iterations,
    }
}

/// Reorders the positionlist to shorten the stage path.
///
/// Entry IDs move with their rows and are not renumbered.
#[instrument(skip_all, name = "short_sort", fields(entries = positionlist.len()))]
pub fn short_sort<R: Rng + ?Sized>(
    positionlist: &mut Positionlist,
    config: &AnnealingConfig,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> Result<SortOutcome, EngineError> {
    reporter.report(Progress::StageStart {
        name: "Shortening stage path",
    });
    let outcome = anneal_order(&positionlist.positions(), config, rng, reporter);
    positionlist.reorder(&outcome.order)?;
    info!(
        "Stage path shortened from {:.3} mm to {:.3} mm in {} iterations.",
        outcome.initial_length, outcome.best_length, outcome.iterations
    );
    reporter.report(Progress::StageFinish {
        summary: format!(
            "Stage path {:.3} mm -> {:.3} mm",
            outcome.initial_length, outcome.best_length
        ),
    });
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::LayoutCell;
    use crate::engine::config::AnnealingConfigBuilder;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scrambled_grid() -> Vec<(f64, f64)> {
        let mut positions: Vec<(f64, f64)> = (0..5)
            .flat_map(|i| (0..5).map(move |j| (i as f64, j as f64)))
            .collect();
        positions.shuffle(&mut StdRng::seed_from_u64(7));
        positions
    }

    fn fast_config() -> AnnealingConfig {
        AnnealingConfigBuilder::new()
            .cooling_rate(1e-3)
            .build()
            .unwrap()
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn result_is_a_permutation_no_longer_than_the_input() {
        let positions = scrambled_grid();
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = anneal_order(&positions, &fast_config(), &mut rng, &ProgressReporter::new());
        assert!(is_permutation(&outcome.order, positions.len()));
        assert!(outcome.best_length <= outcome.initial_length);
        assert!((path_length(&positions, &outcome.order) - outcome.best_length).abs() < 1e-9);
        assert!(outcome.iterations > 0);
    }

    #[test]
    fn same_seed_gives_same_order() {
        let positions = scrambled_grid();
        let run = |seed| {
            anneal_order(
                &positions,
                &fast_config(),
                &mut StdRng::seed_from_u64(seed),
                &ProgressReporter::new(),
            )
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn incremental_delta_matches_full_recompute() {
        let positions = scrambled_grid();
        let distances = Distances::new(&positions);
        let mut order: Vec<usize> = (0..positions.len()).collect();
        for (i, j) in [(0, 1), (3, 4), (0, 24), (10, 11), (5, 17), (23, 24)] {
            let before = distances.path_length(&order);
            let old = touching_length(&distances, &order, i, j);
            order.swap(i, j);
            let new = touching_length(&distances, &order, i, j);
            let after = distances.path_length(&order);
            assert!(((before - after) - (old - new)).abs() < 1e-9, "swap ({i}, {j})");
        }
    }

    #[test]
    fn progress_reports_iterations_and_shrinking_best_length() {
        let events = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));
        let positions = scrambled_grid();
        let outcome = anneal_order(
            &positions,
            &fast_config(),
            &mut StdRng::seed_from_u64(5),
            &reporter,
        );
        drop(reporter);
        let events = events.into_inner().unwrap();

        assert!(matches!(
            events.first(),
            Some(Progress::AnnealStart { initial_length, .. })
                if *initial_length == outcome.initial_length
        ));
        assert_eq!(
            events.last(),
            Some(&Progress::AnnealFinish {
                best_length: outcome.best_length
            })
        );
        let advances: Vec<(u64, f64)> = events
            .iter()
            .filter_map(|event| match event {
                Progress::AnnealAdvance {
                    iterations,
                    best_length,
                } => Some((*iterations, *best_length)),
                _ => None,
            })
            .collect();
        assert_eq!(
            advances.iter().map(|(n, _)| n).sum::<u64>(),
            outcome.iterations
        );
        assert!(advances.windows(2).all(|w| w[1].1 <= w[0].1 + 1e-9));
    }

    #[test]
    fn two_entries_keep_their_order() {
        let positions = [(5.0, 5.0), (0.0, 0.0)];
        let outcome = anneal_order(
            &positions,
            &AnnealingConfig::default(),
            &mut StdRng::seed_from_u64(1),
            &ProgressReporter::new(),
        );
        assert_eq!(outcome.order, vec![0, 1]);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn iteration_budget_stops_the_search() {
        let config = AnnealingConfigBuilder::new().max_iterations(10).build().unwrap();
        let outcome = anneal_order(
            &scrambled_grid(),
            &config,
            &mut StdRng::seed_from_u64(0),
            &ProgressReporter::new(),
        );
        assert_eq!(outcome.iterations, 10);
    }

    #[test]
    fn short_sort_reorders_rows_and_keeps_ids() {
        let mut pls = Positionlist::default();
        let cell = LayoutCell::new("dot");
        for (u, v) in [(0.0, 0.0), (9.0, 0.0), (1.0, 0.0), (8.0, 0.0), (2.0, 0.0)] {
            pls.add(&cell, (u, v), &[0], 1.0).unwrap();
        }
        let outcome = short_sort(
            &mut pls,
            &fast_config(),
            &mut StdRng::seed_from_u64(11),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(outcome.best_length <= 30.0);
        let ids: Vec<usize> = pls.iter().map(|e| e.id).collect();
        assert_eq!(ids, outcome.order);
        for (entry, &original) in pls.iter().zip(&outcome.order) {
            assert_eq!(entry.id, original);
        }
    }
}
