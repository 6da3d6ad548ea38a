//! Squared-error objective between the empirical and target densities.

use crate::density::Histogram;

/// Sum of squared differences between `target` and the density of
/// `corrected` over the fixed `histogram` bins.
///
/// Terms that are not finite (no value inside the edge range) contribute
/// nothing, so the result is always finite.
#[must_use]
pub fn density_cost(corrected: &[f64], histogram: &Histogram, target: &[f64]) -> f64 {
    BinCounts::tally(histogram, corrected).cost(histogram, target)
}

/// Per-bin occupancy of a sequence, kept in sync as individual values move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinCounts {
    counts: Vec<u32>,
    in_range: u32,
}

impl BinCounts {
    /// Counts how many of `values` fall into each bin.
    #[must_use]
    pub fn tally(histogram: &Histogram, values: &[f64]) -> Self {
        let mut tally = Self {
            counts: vec![0; histogram.bin_count()],
            in_range: 0,
        };
        for &value in values {
            tally.insert(histogram.bin_of(value));
        }
        tally
    }

    /// Records a value landing in `bin`; `None` marks an out-of-range value.
    pub fn insert(&mut self, bin: Option<usize>) {
        if let Some(bin) = bin {
            self.counts[bin] += 1;
            self.in_range += 1;
        }
    }

    /// Forgets a value previously recorded in `bin`.
    pub fn remove(&mut self, bin: Option<usize>) {
        if let Some(bin) = bin {
            debug_assert!(self.counts[bin] > 0, "removing from an empty bin");
            self.counts[bin] -= 1;
            self.in_range -= 1;
        }
    }

    /// Density of `bin`, NaN when nothing is in range.
    #[must_use]
    pub fn density(&self, bin: usize, width: f64) -> f64 {
        f64::from(self.counts[bin]) / (f64::from(self.in_range) * width)
    }

    /// Density of every bin in order.
    #[must_use]
    pub fn densities(&self, width: f64) -> Vec<f64> {
        (0..self.counts.len())
            .map(|bin| self.density(bin, width))
            .collect()
    }

    /// Squared-error cost of the current occupancy against `target`.
    #[must_use]
    pub fn cost(&self, histogram: &Histogram, target: &[f64]) -> f64 {
        let width = histogram.width();
        target
            .iter()
            .enumerate()
            .take(self.counts.len())
            .map(|(bin, expected)| (expected - self.density(bin, width)).powi(2))
            .filter(|term| term.is_finite())
            .sum()
    }
}
