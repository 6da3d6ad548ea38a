//! Histogram layout and the densities compared against it.

use crate::cost::BinCounts;

/// Number of trailing target-density entries dropped before comparison.
///
/// The target is evaluated once per bin edge, so it holds one more entry than
/// there are bins. Only the leading `bin_count` values are paired with the
/// empirical bins; the value anchored on the final edge describes mass beyond
/// the histogram range and is discarded.
pub const TARGET_TRAILING_OFFSET: usize = 1;

/// Equal-width bin layout fixed for the lifetime of one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
}

impl Histogram {
    /// Lays out `bin_count` equal-width bins spanning the observed range of
    /// `values`. A constant (or single-valued) input is widened to
    /// `[value - 0.5, value + 0.5]`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when `values` is empty or `bin_count` is zero.
    #[must_use]
    pub fn spanning(values: &[f64], bin_count: usize) -> Self {
        debug_assert!(!values.is_empty(), "histogram requires samples");
        debug_assert!(bin_count > 0, "histogram requires bins");

        let mut first = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut last = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if first == last {
            first -= 0.5;
            last += 0.5;
        }

        let step = (last - first) / bin_count as f64;
        let mut edges: Vec<f64> = (0..bin_count).map(|i| first + step * i as f64).collect();
        edges.push(last);
        Self { edges }
    }

    /// Bin boundaries; always `bin_count + 1` long.
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.edges.len() - 1
    }

    /// Common width of every bin.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }

    /// Lower edge of the given bin.
    #[must_use]
    pub fn bin_start(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    /// Index of the bin containing `value`, or `None` outside the edge range.
    ///
    /// Bins are half-open except the last, which also holds its upper edge.
    #[must_use]
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if !(first..=last).contains(&value) {
            return None;
        }

        let bins = self.bin_count();
        if value == last {
            return Some(bins - 1);
        }

        let scaled = (value - first) * bins as f64 / (last - first);
        let mut index = (scaled as usize).min(bins - 1);
        // The scaled guess can land one bin off near an edge.
        if index > 0 && value < self.edges[index] {
            index -= 1;
        } else if index + 1 < bins && value >= self.edges[index + 1] {
            index += 1;
        }
        Some(index)
    }

    /// Probability density per bin, normalized over the values inside the
    /// edge range. Every entry is NaN when no value falls inside.
    #[must_use]
    pub fn empirical_density(&self, values: &[f64]) -> Vec<f64> {
        BinCounts::tally(self, values).densities(self.width())
    }
}

/// Average Exponential(`rate`) density over `[edge, edge + width]` for every edge.
///
/// The result holds one entry per edge. Pair it with empirical bins through
/// [`compared_target`].
#[must_use]
pub fn target_density(histogram: &Histogram, rate: f64) -> Vec<f64> {
    let width = histogram.width();
    histogram
        .edges()
        .iter()
        .map(|&edge| ((-rate * edge).exp() - (-rate * (edge + width)).exp()) / width)
        .collect()
}

/// Leading slice of a per-edge target density that lines up with the bins.
#[must_use]
pub fn compared_target(target: &[f64]) -> &[f64] {
    &target[..target.len().saturating_sub(TARGET_TRAILING_OFFSET)]
}

/// One row of a fitted-density summary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinSummary {
    /// Lower bin edge.
    pub start: f64,
    /// Upper bin edge.
    pub end: f64,
    /// Empirical density of the summarized values.
    pub empirical: f64,
    /// Exponential density the values were fitted against.
    pub target: f64,
}

/// Compares `values` (already shifted so the support starts at zero) with the
/// Exponential(`rate`) density over `bin_count` bins spanning their range.
#[must_use]
pub fn summarize(values: &[f64], bin_count: usize, rate: f64) -> Vec<BinSummary> {
    if values.is_empty() || bin_count == 0 {
        return Vec::new();
    }

    let histogram = Histogram::spanning(values, bin_count);
    let empirical = histogram.empirical_density(values);
    let target = target_density(&histogram, rate);
    histogram
        .edges()
        .windows(2)
        .zip(empirical)
        .zip(compared_target(&target))
        .map(|((edges, empirical), &target)| BinSummary {
            start: edges[0],
            end: edges[1],
            empirical,
            target,
        })
        .collect()
}
