//! Error types surfaced by the generation systems.

use std::time::Duration;

use thiserror::Error;

use crate::RealizedBounds;

/// Failure returned by an interval generator.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GenerationError {
    /// A request parameter is out of range; raised before any sampling.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable constraint the value violated.
        reason: &'static str,
    },
    /// The requested mean cannot coexist with intervals pinned on both bounds.
    #[error(
        "infeasible request: shifted sum {expected_sum:.5} must lie within \
         [{lowest:.5}, {highest:.5}] for the bounds to be reachable"
    )]
    Infeasible {
        /// Sum of the shifted intervals implied by the requested mean.
        expected_sum: f64,
        /// Smallest sum compatible with one interval on each bound.
        lowest: f64,
        /// Largest sum compatible with one interval on each bound.
        highest: f64,
    },
    /// Every permitted attempt was rejected.
    #[error("no acceptable schedule after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts performed.
        attempts: u32,
    },
    /// The wall-clock budget ran out before an attempt was accepted.
    #[error("deadline of {deadline:?} exceeded after {attempts} attempts")]
    DeadlineExceeded {
        /// Number of attempts performed before the deadline expired.
        attempts: u32,
        /// Budget that was exceeded.
        deadline: Duration,
    },
}

impl GenerationError {
    pub(crate) const fn invalid(name: &'static str, reason: &'static str) -> Self {
        Self::InvalidParameter { name, reason }
    }
}

/// Recoverable reason a single attempt was discarded.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum AttemptRejection {
    /// The corrector could not satisfy the sum and range constraints.
    #[error("corrector left constraint residual {residual:.3e}")]
    Unconverged {
        /// Largest remaining constraint violation.
        residual: f64,
    },
    /// The corrected sequence missed the requested bounds.
    #[error("realized min/mean/max {realized} outside tolerance")]
    OutOfTolerance {
        /// Summary of the rejected sequence.
        realized: RealizedBounds,
    },
}
