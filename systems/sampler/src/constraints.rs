//! Equality constraints imposed on the correction vector.
//!
//! Both constraints are expressed against the uncorrected candidate `y` and
//! solved for the correction `x`; the corrected sequence is `x + y`.

use poisson_iti_core::IntervalRequest;

use crate::density::Histogram;

/// `Σx` must equal `expected_sum - Σy` so the corrected mean is exact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SumConstraint {
    bound: f64,
}

impl SumConstraint {
    /// Derives the required correction total for `candidate`.
    #[must_use]
    pub fn for_candidate(request: &IntervalRequest, candidate: &[f64]) -> Self {
        Self {
            bound: request.expected_sum() - candidate.iter().sum::<f64>(),
        }
    }

    /// Value both the lower and upper bound are set to.
    #[must_use]
    pub const fn bound(&self) -> f64 {
        self.bound
    }

    /// Absolute violation of the constraint by `offsets`.
    #[must_use]
    pub fn residual(&self, offsets: &[f64]) -> f64 {
        (offsets.iter().sum::<f64>() - self.bound).abs()
    }
}

/// `[min(x + y), max(x + y)]` must equal `[0, ceiling]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeConstraint {
    lower: f64,
    upper: f64,
}

impl RangeConstraint {
    /// Pins the corrected range to the shifted support of `request`.
    #[must_use]
    pub fn for_request(request: &IntervalRequest) -> Self {
        Self {
            lower: 0.0,
            upper: request.ceiling(),
        }
    }

    /// Required corrected minimum.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Required corrected maximum.
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Evaluates `h(x) = [min(x + y), max(x + y)]`.
    #[must_use]
    pub fn evaluate(offsets: &[f64], candidate: &[f64]) -> [f64; 2] {
        offsets
            .iter()
            .zip(candidate)
            .map(|(x, y)| x + y)
            .fold([f64::INFINITY, f64::NEG_INFINITY], |[low, high], value| {
                [low.min(value), high.max(value)]
            })
    }

    /// Largest absolute violation of either component.
    #[must_use]
    pub fn residual(&self, offsets: &[f64], candidate: &[f64]) -> f64 {
        let [low, high] = Self::evaluate(offsets, candidate);
        (low - self.lower).abs().max((high - self.upper).abs())
    }
}

/// Uniform correction that satisfies the sum constraint on its own.
#[must_use]
pub fn initial_guess(sum: &SumConstraint, trial_count: usize) -> Vec<f64> {
    vec![sum.bound() / trial_count as f64; trial_count]
}

/// Everything a corrector needs to solve one attempt.
#[derive(Clone, Copy, Debug)]
pub struct CorrectionProblem<'a> {
    /// Uncorrected candidate sequence `y`.
    pub candidate: &'a [f64],
    /// Bin layout fixed for the attempt.
    pub histogram: &'a Histogram,
    /// Target density already trimmed to the compared bins.
    pub target: &'a [f64],
    /// Mean-preserving linear constraint.
    pub sum: SumConstraint,
    /// Range-pinning nonlinear constraint.
    pub range: RangeConstraint,
}

impl CorrectionProblem<'_> {
    /// Whether the range constraint applies; a lone value cannot hit both bounds.
    #[must_use]
    pub fn pins_range(&self) -> bool {
        self.candidate.len() >= 2
    }

    /// Largest violation of the applicable constraints.
    #[must_use]
    pub fn residual(&self, offsets: &[f64]) -> f64 {
        let sum = self.sum.residual(offsets);
        if self.pins_range() {
            sum.max(self.range.residual(offsets, self.candidate))
        } else {
            sum
        }
    }
}
