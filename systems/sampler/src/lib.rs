#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Constrained Poisson-process sampler for inter-trial intervals.
//!
//! Every attempt draws a censored exponential candidate, fixes a histogram
//! layout over it, and asks a [`Corrector`] for the additive correction that
//! pins the minimum, maximum and mean while keeping the histogram close to the
//! truncated exponential density. Attempts whose realized bounds miss the
//! request are discarded and a fresh candidate is drawn, up to the limits of a
//! [`RetryPolicy`].

use std::time::Instant;

use poisson_iti_core::{
    AttemptRejection, FrameSchedule, GenerationError, IntervalRequest, IntervalSchedule,
    RealizedBounds, RetryPolicy,
};
use rand::Rng;
use rand_distr::Exp;

pub mod candidate;
pub mod constraints;
pub mod corrector;
pub mod cost;
pub mod density;

use candidate::sample_candidates;
use constraints::{CorrectionProblem, RangeConstraint, SumConstraint};
pub use corrector::{Correction, Corrector, ExchangeSearch};
use density::{compared_target, target_density, Histogram};

/// Accepted schedule together with how it was obtained.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOutcome {
    /// Accepted intervals, onsets and optional frame indices.
    pub schedule: IntervalSchedule,
    /// Number of attempts used, including the accepted one.
    pub attempts: u32,
    /// Density cost of the accepted correction.
    pub cost: f64,
    /// Why each discarded attempt was rejected, in order.
    pub rejections: Vec<AttemptRejection>,
}

/// Generates a schedule with the default retry policy and corrector.
pub fn generate_intervals<R>(
    request: IntervalRequest,
    rng: &mut R,
) -> Result<IntervalSchedule, GenerationError>
where
    R: Rng + ?Sized,
{
    IntervalGenerator::new(request, RetryPolicy::default())
        .generate(rng)
        .map(|outcome| outcome.schedule)
}

/// Rounds every value divided by `frame_duration` to the nearest frame,
/// breaking ties toward the even frame.
#[must_use]
pub fn quantize(values: &[f64], frame_duration: f64) -> Vec<i64> {
    values
        .iter()
        .map(|value| (value / frame_duration).round_ties_even() as i64)
        .collect()
}

/// Draw state of one attempt, kept until the attempt is accepted or discarded.
#[derive(Debug)]
struct Attempt {
    candidate: Vec<f64>,
    histogram: Histogram,
    target: Vec<f64>,
}

#[derive(Debug)]
enum AttemptState {
    Sample,
    Optimize(Attempt),
    Validate(Attempt, Correction),
    Accept { intervals: Vec<f64>, cost: f64 },
    Retry(AttemptRejection),
}

/// Bounded sample/optimize/validate loop for a single request.
#[derive(Debug)]
pub struct IntervalGenerator<C = ExchangeSearch> {
    request: IntervalRequest,
    policy: RetryPolicy,
    corrector: C,
}

impl IntervalGenerator<ExchangeSearch> {
    /// Creates a generator backed by the default [`ExchangeSearch`] corrector.
    #[must_use]
    pub fn new(request: IntervalRequest, policy: RetryPolicy) -> Self {
        Self::with_corrector(request, policy, ExchangeSearch::default())
    }
}

impl<C> IntervalGenerator<C>
where
    C: Corrector,
{
    /// Creates a generator that solves each attempt with `corrector`.
    #[must_use]
    pub fn with_corrector(request: IntervalRequest, policy: RetryPolicy, corrector: C) -> Self {
        Self {
            request,
            policy,
            corrector,
        }
    }

    /// Runs attempts until one is accepted or the retry policy is exhausted.
    ///
    /// Parameters are validated before the first draw, so an invalid request
    /// never consumes randomness.
    pub fn generate<R>(&mut self, rng: &mut R) -> Result<GenerationOutcome, GenerationError>
    where
        R: Rng + ?Sized,
    {
        self.request.validate()?;
        let distribution = Exp::new(self.request.rate()).map_err(|_| {
            GenerationError::InvalidParameter {
                name: "mean_interval",
                reason: "must yield a finite positive exponential rate",
            }
        })?;

        let started = Instant::now();
        let max_attempts = self.policy.max_attempts().get();
        let mut attempts = 0_u32;
        let mut rejections = Vec::new();
        let mut state = AttemptState::Sample;

        loop {
            state = match state {
                AttemptState::Sample => {
                    if attempts >= max_attempts {
                        tracing::warn!(attempts, "retry budget exhausted");
                        return Err(GenerationError::RetriesExhausted { attempts });
                    }
                    if let Some(deadline) = self.policy.deadline() {
                        if started.elapsed() >= deadline {
                            tracing::warn!(attempts, ?deadline, "generation deadline exceeded");
                            return Err(GenerationError::DeadlineExceeded { attempts, deadline });
                        }
                    }
                    attempts += 1;
                    AttemptState::Optimize(self.sample(rng, &distribution))
                }
                AttemptState::Optimize(attempt) => {
                    let problem = CorrectionProblem {
                        candidate: &attempt.candidate,
                        histogram: &attempt.histogram,
                        target: compared_target(&attempt.target),
                        sum: SumConstraint::for_candidate(&self.request, &attempt.candidate),
                        range: RangeConstraint::for_request(&self.request),
                    };
                    let correction = self.corrector.correct(&problem, rng);
                    AttemptState::Validate(attempt, correction)
                }
                AttemptState::Validate(attempt, correction) => {
                    self.validate(&attempt, correction)
                }
                AttemptState::Accept { intervals, cost } => {
                    tracing::info!(
                        attempts,
                        trials = intervals.len(),
                        cost,
                        "interval schedule accepted"
                    );
                    return Ok(GenerationOutcome {
                        schedule: self.finish(intervals),
                        attempts,
                        cost,
                        rejections,
                    });
                }
                AttemptState::Retry(rejection) => {
                    tracing::debug!(attempt = attempts, %rejection, "attempt rejected");
                    rejections.push(rejection);
                    AttemptState::Sample
                }
            };
        }
    }

    fn sample<R>(&self, rng: &mut R, distribution: &Exp<f64>) -> Attempt
    where
        R: Rng + ?Sized,
    {
        let mut candidate = Vec::with_capacity(self.request.trial_count());
        sample_candidates(
            rng,
            distribution,
            self.request.ceiling(),
            self.request.trial_count(),
            &mut candidate,
        );
        let histogram = Histogram::spanning(&candidate, self.request.bin_count() as usize);
        let target = target_density(&histogram, self.request.rate());
        Attempt {
            candidate,
            histogram,
            target,
        }
    }

    fn validate(&self, attempt: &Attempt, correction: Correction) -> AttemptState {
        let min_interval = self.request.min_interval();
        let intervals: Vec<f64> = attempt
            .candidate
            .iter()
            .zip(&correction.offsets)
            .map(|(y, x)| y + x + min_interval)
            .collect();

        let Some(realized) = RealizedBounds::of(&intervals) else {
            return AttemptState::Retry(AttemptRejection::Unconverged {
                residual: correction.residual,
            });
        };
        let finite = intervals.iter().all(|value| value.is_finite());
        if finite && realized.matches(&self.request) {
            return AttemptState::Accept {
                intervals,
                cost: correction.cost,
            };
        }

        if correction.converged {
            AttemptState::Retry(AttemptRejection::OutOfTolerance { realized })
        } else {
            AttemptState::Retry(AttemptRejection::Unconverged {
                residual: correction.residual,
            })
        }
    }

    fn finish(&self, intervals: Vec<f64>) -> IntervalSchedule {
        let schedule = IntervalSchedule::from_intervals(intervals, self.request.start_delay());
        match self.request.frame_duration() {
            Some(frame) => {
                let frames = FrameSchedule::new(
                    quantize(schedule.intervals(), frame),
                    quantize(schedule.onsets(), frame),
                );
                schedule.with_frames(frames)
            }
            None => schedule,
        }
    }
}
