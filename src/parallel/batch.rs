//! Batch evaluation of independent scenarios.
//!
//! Each scenario is still one single-threaded calculation; only whole
//! scenarios are spread over workers, one batch range per task.

use rayon::prelude::*;
use tracing::debug;

use crate::calc::{calculate_scenario, TeamCalculationResult};
use crate::config::CalcConfig;
use crate::data::card::Card;
use crate::data::error::DataError;
use crate::data::team::Scenario;
use crate::parallel::pool::WorkerPool;

/// Split `total` items into up to `num_batches` ranges `[start, end)`.
/// Batches are as equal in size as possible; later batches may be smaller.
///
/// # Example
/// ```
/// # use teamcalc::parallel::batch_ranges;
/// let ranges = batch_ranges(10, 3);
/// assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);
/// ```
pub fn batch_ranges(total: usize, num_batches: usize) -> Vec<(usize, usize)> {
    if total == 0 || num_batches == 0 {
        return Vec::new();
    }
    let num_batches = num_batches.min(total);
    let base = total / num_batches;
    let remainder = total % num_batches;
    let mut ranges = Vec::with_capacity(num_batches);
    let mut start = 0;
    for i in 0..num_batches {
        let end = start + base + usize::from(i < remainder);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Calculate every scenario against the same dataset. Results come back in
/// input order; a failing scenario does not stop the others.
pub fn calculate_many(
    scenarios: &[Scenario],
    cards: &[Card],
    config: &CalcConfig,
    pool: &WorkerPool,
) -> Vec<Result<TeamCalculationResult, DataError>> {
    pool.install(|| {
        let ranges = batch_ranges(scenarios.len(), rayon::current_num_threads());
        debug!(scenarios = scenarios.len(), batches = ranges.len(), "batch calculation");
        ranges
            .into_par_iter()
            .map(|(start, end)| {
                scenarios[start..end]
                    .iter()
                    .map(|scenario| calculate_scenario(scenario, cards, config))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    })
}
