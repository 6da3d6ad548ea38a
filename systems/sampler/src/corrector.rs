//! Constrained correction of a candidate sequence.

use rand::Rng;

use crate::{
    constraints::{initial_guess, CorrectionProblem},
    cost::BinCounts,
    density::Histogram,
};

/// Relative tolerance under which a constraint counts as satisfied.
const FEASIBILITY_EPSILON: f64 = 1e-9;

/// Result of one corrector run.
#[derive(Clone, Debug, PartialEq)]
pub struct Correction {
    /// Additive correction `x`, one entry per candidate value.
    pub offsets: Vec<f64>,
    /// Objective value at `offsets`.
    pub cost: f64,
    /// Number of improvement steps evaluated.
    pub iterations: usize,
    /// Largest remaining constraint violation.
    pub residual: f64,
    /// Whether every constraint is satisfied within the feasibility epsilon.
    pub converged: bool,
}

/// Local solver minimizing the density cost under the sum and range constraints.
pub trait Corrector {
    /// Solves `problem`, starting from the uniform initial guess.
    fn correct<R>(&mut self, problem: &CorrectionProblem<'_>, rng: &mut R) -> Correction
    where
        R: Rng + ?Sized;
}

/// Derivative-free corrector built from a feasibility projection followed by
/// sum-preserving pairwise exchanges.
///
/// The histogram objective is piecewise constant, so gradient information is
/// useless; instead the search moves one value into the most under-filled bin
/// and compensates with another free value, keeping only strict improvements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeSearch {
    max_iterations: usize,
    stall_limit: usize,
}

impl ExchangeSearch {
    /// Creates a search bounded by `max_iterations` proposals, stopping early
    /// after `stall_limit` consecutive rejected proposals.
    #[must_use]
    pub const fn new(max_iterations: usize, stall_limit: usize) -> Self {
        Self {
            max_iterations,
            stall_limit,
        }
    }
}

impl Default for ExchangeSearch {
    fn default() -> Self {
        Self::new(4_000, 400)
    }
}

impl Corrector for ExchangeSearch {
    fn correct<R>(&mut self, problem: &CorrectionProblem<'_>, rng: &mut R) -> Correction
    where
        R: Rng + ?Sized,
    {
        let candidate = problem.candidate;
        let guess = initial_guess(&problem.sum, candidate.len());
        let mut values: Vec<f64> = candidate.iter().zip(&guess).map(|(y, x)| y + x).collect();
        let target_sum = values.iter().sum::<f64>();

        let mut iterations = 0;
        if problem.pins_range() {
            let ceiling = problem.range.upper();
            let (lowest, highest) = pin_extremes(&mut values, problem.range.lower(), ceiling);
            let free: Vec<usize> = (0..values.len())
                .filter(|&index| index != lowest && index != highest)
                .collect();
            redistribute(&mut values, &free, target_sum, ceiling);
            iterations = self.exchange(problem, &mut values, &free, rng);
        }

        let offsets: Vec<f64> = values.iter().zip(candidate).map(|(v, y)| v - y).collect();
        let residual = problem.residual(&offsets);
        let scale = problem.sum.bound().abs().max(target_sum.abs()).max(1.0);
        let cost =
            BinCounts::tally(problem.histogram, &values).cost(problem.histogram, problem.target);

        Correction {
            offsets,
            cost,
            iterations,
            residual,
            converged: residual <= FEASIBILITY_EPSILON * scale,
        }
    }
}

impl ExchangeSearch {
    fn exchange<R>(
        &self,
        problem: &CorrectionProblem<'_>,
        values: &mut [f64],
        free: &[usize],
        rng: &mut R,
    ) -> usize
    where
        R: Rng + ?Sized,
    {
        if free.len() < 2 {
            return 0;
        }

        let histogram = problem.histogram;
        let ceiling = problem.range.upper();
        let width = histogram.width();
        let mut counts = BinCounts::tally(histogram, values);
        let mut current = counts.cost(histogram, problem.target);
        let mut stalled = 0;
        let mut surplus_members = Vec::with_capacity(free.len());

        let mut iterations = 0;
        while iterations < self.max_iterations && stalled < self.stall_limit && current > 0.0 {
            iterations += 1;

            let Some((surplus, deficit)) = extreme_bins(&counts, problem.target, width) else {
                break;
            };

            surplus_members.clear();
            surplus_members.extend(
                free.iter()
                    .copied()
                    .filter(|&index| histogram.bin_of(values[index]) == Some(surplus)),
            );
            let mover = if surplus_members.is_empty() {
                free[rng.gen_range(0..free.len())]
            } else {
                surplus_members[rng.gen_range(0..surplus_members.len())]
            };
            let partner = loop {
                let pick = free[rng.gen_range(0..free.len())];
                if pick != mover {
                    break pick;
                }
            };

            let destination =
                (histogram.bin_start(deficit) + rng.gen::<f64>() * width).clamp(0.0, ceiling);
            let delta = destination - values[mover];
            let compensated = values[partner] - delta;
            if !(0.0..=ceiling).contains(&compensated) {
                stalled += 1;
                continue;
            }

            let undo = [(mover, values[mover]), (partner, values[partner])];
            apply_moves(
                &mut counts,
                histogram,
                values,
                &[(mover, destination), (partner, compensated)],
            );
            let proposed = counts.cost(histogram, problem.target);
            if proposed < current {
                current = proposed;
                stalled = 0;
            } else {
                apply_moves(&mut counts, histogram, values, &undo);
                stalled += 1;
            }
        }
        iterations
    }
}

fn apply_moves(
    counts: &mut BinCounts,
    histogram: &Histogram,
    values: &mut [f64],
    moves: &[(usize, f64)],
) {
    for &(index, value) in moves {
        counts.remove(histogram.bin_of(values[index]));
        values[index] = value;
        counts.insert(histogram.bin_of(value));
    }
}

/// Bins with the largest excess and the largest shortfall of density.
fn extreme_bins(counts: &BinCounts, target: &[f64], width: f64) -> Option<(usize, usize)> {
    let mut surplus: Option<(usize, f64)> = None;
    let mut deficit: Option<(usize, f64)> = None;
    for (bin, expected) in target.iter().enumerate() {
        let gap = counts.density(bin, width) - expected;
        if !gap.is_finite() {
            continue;
        }
        if surplus.map_or(true, |(_, best)| gap > best) {
            surplus = Some((bin, gap));
        }
        if deficit.map_or(true, |(_, best)| gap < best) {
            deficit = Some((bin, gap));
        }
    }

    match (surplus, deficit) {
        (Some((high, _)), Some((low, _))) if high != low => Some((high, low)),
        _ => None,
    }
}

/// Moves the smallest value onto `lower` and the largest onto `upper`,
/// returning their indices. Distinct indices are guaranteed for two or more
/// values even when every value is equal.
fn pin_extremes(values: &mut [f64], lower: f64, upper: f64) -> (usize, usize) {
    debug_assert!(values.len() >= 2, "pinning needs two values");

    let mut lowest = 0;
    let mut highest = 0;
    for (index, &value) in values.iter().enumerate() {
        if value < values[lowest] {
            lowest = index;
        }
        if value > values[highest] {
            highest = index;
        }
    }
    if lowest == highest {
        highest = if lowest == 0 { 1 } else { 0 };
    }

    values[lowest] = lower;
    values[highest] = upper;
    (lowest, highest)
}

/// Spreads the gap between `target_sum` and the current total over the free
/// values, clamping each to `[0, ceiling]`, until the gap closes or no free
/// value can absorb more.
fn redistribute(values: &mut [f64], free: &[usize], target_sum: f64, ceiling: f64) {
    for &index in free {
        values[index] = values[index].clamp(0.0, ceiling);
    }

    let tolerance = FEASIBILITY_EPSILON * target_sum.abs().max(1.0);
    let mut active = Vec::with_capacity(free.len());
    for _ in 0..=free.len() {
        let gap = target_sum - values.iter().sum::<f64>();
        if gap.abs() <= tolerance {
            return;
        }

        active.clear();
        active.extend(free.iter().copied().filter(|&index| {
            if gap > 0.0 {
                values[index] < ceiling
            } else {
                values[index] > 0.0
            }
        }));
        if active.is_empty() {
            return;
        }

        let share = gap / active.len() as f64;
        for &index in &active {
            values[index] = (values[index] + share).clamp(0.0, ceiling);
        }
    }
}

#[cfg(test)]
mod tests {
    use poisson_iti_core::IntervalRequest;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::{
        constraints::{RangeConstraint, SumConstraint},
        density::{compared_target, target_density},
    };

    #[test]
    fn pinning_keeps_indices_distinct_for_constant_input() {
        let mut values = [2.0, 2.0, 2.0];
        let (low, high) = pin_extremes(&mut values, 0.0, 5.0);
        assert_ne!(low, high);
        assert_eq!(values[low], 0.0);
        assert_eq!(values[high], 5.0);
    }

    #[test]
    fn redistribution_closes_the_gap_with_clamping() {
        let mut values = [0.0, 9.0, 8.5, 1.0, 1.0];
        redistribute(&mut values, &[2, 3, 4], 14.0, 9.0);
        let total: f64 = values.iter().sum();
        assert!((total - 14.0).abs() < 1e-9, "total was {total}");
        assert!(values.iter().all(|&v| (0.0..=9.0).contains(&v)));
    }

    #[test]
    fn redistribution_stops_when_nothing_can_absorb() {
        let mut values = [0.0, 1.0, 1.0];
        redistribute(&mut values, &[2], 10.0, 1.0);
        assert_eq!(values, [0.0, 1.0, 1.0]);
    }

    #[test]
    fn correction_satisfies_constraints_and_does_not_raise_cost() {
        let request = IntervalRequest::new(40, 0.5, 2.0, 8.0);
        let candidate: Vec<f64> = (0..40).map(|i| 0.2 + f64::from(i) * 0.15).collect();
        let histogram = Histogram::spanning(&candidate, 12);
        let target = target_density(&histogram, request.rate());
        let problem = CorrectionProblem {
            candidate: &candidate,
            histogram: &histogram,
            target: compared_target(&target),
            sum: SumConstraint::for_candidate(&request, &candidate),
            range: RangeConstraint::for_request(&request),
        };

        let mut projected_only = ExchangeSearch::new(0, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let baseline = projected_only.correct(&problem, &mut rng);
        assert!(baseline.converged, "projection alone must be feasible");

        let mut search = ExchangeSearch::new(4_000, 400);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let correction = search.correct(&problem, &mut rng);

        assert!(correction.converged, "residual {}", correction.residual);
        assert!(correction.cost <= baseline.cost);
        assert!(correction.iterations <= 4_000);

        let corrected: Vec<f64> = candidate
            .iter()
            .zip(&correction.offsets)
            .map(|(y, x)| y + x)
            .collect();
        let min = corrected.iter().copied().fold(f64::INFINITY, f64::min);
        let max = corrected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = corrected.iter().sum::<f64>() / corrected.len() as f64;
        assert!(min.abs() < 1e-9);
        assert!((max - 7.5).abs() < 1e-9);
        assert!((mean - 1.5).abs() < 1e-9);
    }

    #[test]
    fn single_value_only_honours_the_sum() {
        let request = IntervalRequest::new(1, 1.0, 3.0, 6.0);
        let candidate = [0.7];
        let histogram = Histogram::spanning(&candidate, 12);
        let target = target_density(&histogram, request.rate());
        let problem = CorrectionProblem {
            candidate: &candidate,
            histogram: &histogram,
            target: compared_target(&target),
            sum: SumConstraint::for_candidate(&request, &candidate),
            range: RangeConstraint::for_request(&request),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let correction = ExchangeSearch::default().correct(&problem, &mut rng);
        assert!(correction.converged);
        assert!((candidate[0] + correction.offsets[0] - 2.0).abs() < 1e-12);
    }
}
