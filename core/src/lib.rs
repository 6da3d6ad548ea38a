#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Poisson inter-trial interval generator.
//!
//! This crate defines the value types that connect adapters with the pure
//! generation systems. Adapters build an [`IntervalRequest`] and a
//! [`RetryPolicy`], hand them to a system together with an explicit random
//! source, and receive an [`IntervalSchedule`] or a [`GenerationError`].
//! Nothing in here performs I/O or owns long-lived state.

use std::{fmt, num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};

mod error;

pub use error::{AttemptRejection, GenerationError};

/// Number of histogram bins used for density fitting when none is requested.
pub const DEFAULT_BIN_COUNT: u32 = 12;

/// Absolute tolerance applied to the realized minimum, mean and maximum.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Number of sample/optimize/validate attempts allowed by [`RetryPolicy::default`].
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(1_000) {
    Some(value) => value,
    None => unreachable!(),
};

/// Parameters describing one block of inter-trial intervals.
///
/// All values are expressed in seconds. Construct with [`IntervalRequest::new`]
/// and refine the optional knobs with the `with_*` methods; call
/// [`IntervalRequest::validate`] (the generators do so automatically) before
/// sampling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalRequest {
    trial_count: usize,
    min_interval: f64,
    mean_interval: f64,
    max_interval: f64,
    bin_count: u32,
    start_delay: f64,
    frame_duration: Option<f64>,
    tolerance: f64,
}

impl IntervalRequest {
    /// Creates a request with default bin count, zero start delay, no frame
    /// quantization and the default tolerance.
    #[must_use]
    pub const fn new(
        trial_count: usize,
        min_interval: f64,
        mean_interval: f64,
        max_interval: f64,
    ) -> Self {
        Self {
            trial_count,
            min_interval,
            mean_interval,
            max_interval,
            bin_count: DEFAULT_BIN_COUNT,
            start_delay: 0.0,
            frame_duration: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Overrides the number of histogram bins used for density fitting.
    #[must_use]
    pub const fn with_bin_count(mut self, bin_count: u32) -> Self {
        self.bin_count = bin_count;
        self
    }

    /// Overrides the delay preceding the first interval.
    #[must_use]
    pub const fn with_start_delay(mut self, start_delay: f64) -> Self {
        self.start_delay = start_delay;
        self
    }

    /// Requests frame-index equivalents using the provided frame duration.
    #[must_use]
    pub const fn with_frame_duration(mut self, frame_duration: f64) -> Self {
        self.frame_duration = Some(frame_duration);
        self
    }

    /// Overrides the absolute acceptance tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Number of intervals to generate.
    #[must_use]
    pub const fn trial_count(&self) -> usize {
        self.trial_count
    }

    /// Requested minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// Requested mean interval.
    #[must_use]
    pub const fn mean_interval(&self) -> f64 {
        self.mean_interval
    }

    /// Requested maximum interval.
    #[must_use]
    pub const fn max_interval(&self) -> f64 {
        self.max_interval
    }

    /// Number of histogram bins used for density fitting.
    #[must_use]
    pub const fn bin_count(&self) -> u32 {
        self.bin_count
    }

    /// Delay added before the first onset.
    #[must_use]
    pub const fn start_delay(&self) -> f64 {
        self.start_delay
    }

    /// Frame duration used for quantization, if any.
    #[must_use]
    pub const fn frame_duration(&self) -> Option<f64> {
        self.frame_duration
    }

    /// Absolute tolerance applied during validation.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Upper bound of the shifted exponential support, `max - min`.
    #[must_use]
    pub fn ceiling(&self) -> f64 {
        self.max_interval - self.min_interval
    }

    /// Scale (mean) of the shifted exponential, `mean - min`.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.mean_interval - self.min_interval
    }

    /// Rate parameter of the shifted exponential, `1 / (mean - min)`.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.scale().recip()
    }

    /// Sum the shifted intervals must reach for the mean to be exact.
    #[must_use]
    pub fn expected_sum(&self) -> f64 {
        self.trial_count as f64 * self.scale()
    }

    /// Rejects parameter combinations that can never produce a schedule.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.trial_count == 0 {
            return Err(GenerationError::invalid("trial_count", "must be positive"));
        }
        for (name, value) in [
            ("min_interval", self.min_interval),
            ("mean_interval", self.mean_interval),
            ("max_interval", self.max_interval),
        ] {
            if !value.is_finite() {
                return Err(GenerationError::invalid(name, "must be finite"));
            }
        }
        if self.min_interval <= 0.0 {
            return Err(GenerationError::invalid("min_interval", "must be positive"));
        }
        if self.min_interval >= self.mean_interval {
            return Err(GenerationError::invalid(
                "mean_interval",
                "must be strictly greater than min_interval",
            ));
        }
        if self.mean_interval > self.max_interval {
            return Err(GenerationError::invalid(
                "max_interval",
                "must not be smaller than mean_interval",
            ));
        }
        if self.bin_count == 0 {
            return Err(GenerationError::invalid("bin_count", "must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(GenerationError::invalid("tolerance", "must be positive and finite"));
        }
        if !(self.start_delay.is_finite() && self.start_delay >= 0.0) {
            return Err(GenerationError::invalid(
                "start_delay",
                "must be non-negative and finite",
            ));
        }
        if let Some(frame) = self.frame_duration {
            if !(frame.is_finite() && frame > 0.0) {
                return Err(GenerationError::invalid(
                    "frame_duration",
                    "must be positive and finite",
                ));
            }
        }

        self.check_feasible()
    }

    /// With two or more trials one interval sits on each bound, so the
    /// remaining ones must absorb `expected_sum - ceiling` inside `[0, ceiling]`.
    fn check_feasible(&self) -> Result<(), GenerationError> {
        if self.trial_count < 2 {
            return Ok(());
        }

        let ceiling = self.ceiling();
        let expected_sum = self.expected_sum();
        let slack = self.trial_count as f64 * self.tolerance;
        let lowest = ceiling;
        let highest = (self.trial_count - 1) as f64 * ceiling;

        if expected_sum + slack < lowest || expected_sum - slack > highest {
            return Err(GenerationError::Infeasible {
                expected_sum,
                lowest,
                highest,
            });
        }
        Ok(())
    }
}

/// Bounds on how long a generator may keep discarding attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts and no deadline.
    #[must_use]
    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts,
            deadline: None,
        }
    }

    /// Adds a wall-clock budget measured from the start of generation.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Maximum number of attempts before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Optional wall-clock budget.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Minimum, mean and maximum of a realized interval sequence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealizedBounds {
    /// Smallest interval.
    pub min: f64,
    /// Arithmetic mean of the intervals.
    pub mean: f64,
    /// Largest interval.
    pub max: f64,
}

impl RealizedBounds {
    /// Summarizes a non-empty sequence. Returns `None` for an empty slice.
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, mean, max })
    }

    /// Checks every component against the request using absolute tolerance.
    ///
    /// A single interval cannot sit on both bounds at once, so one-trial
    /// requests are only held to the mean.
    #[must_use]
    pub fn matches(&self, request: &IntervalRequest) -> bool {
        let tolerance = request.tolerance();
        let close = |realized: f64, wanted: f64| (realized - wanted).abs() <= tolerance;

        if request.trial_count() == 1 {
            return close(self.mean, request.mean_interval());
        }

        close(self.min, request.min_interval())
            && close(self.mean, request.mean_interval())
            && close(self.max, request.max_interval())
    }
}

impl fmt::Display for RealizedBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}/{:.5}/{:.5}", self.min, self.mean, self.max)
    }
}

/// Frame-index equivalents of an [`IntervalSchedule`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSchedule {
    intervals: Vec<i64>,
    onsets: Vec<i64>,
}

impl FrameSchedule {
    /// Wraps already quantized interval and onset frame counts.
    #[must_use]
    pub fn new(intervals: Vec<i64>, onsets: Vec<i64>) -> Self {
        debug_assert_eq!(intervals.len(), onsets.len());
        Self { intervals, onsets }
    }

    /// Interval lengths measured in whole frames.
    #[must_use]
    pub fn intervals(&self) -> &[i64] {
        &self.intervals
    }

    /// Zero-based frame index of every onset.
    #[must_use]
    pub fn onsets(&self) -> &[i64] {
        &self.onsets
    }
}

/// Accepted intervals together with their cumulative onsets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    intervals: Vec<f64>,
    onsets: Vec<f64>,
    frames: Option<FrameSchedule>,
}

impl IntervalSchedule {
    /// Builds a schedule from accepted intervals, deriving onsets from `start_delay`.
    #[must_use]
    pub fn from_intervals(intervals: Vec<f64>, start_delay: f64) -> Self {
        let onsets = intervals
            .iter()
            .scan(start_delay, |elapsed, interval| {
                *elapsed += interval;
                Some(*elapsed)
            })
            .collect();
        Self {
            intervals,
            onsets,
            frames: None,
        }
    }

    /// Attaches frame-index equivalents.
    #[must_use]
    pub fn with_frames(mut self, frames: FrameSchedule) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Accepted inter-trial intervals.
    #[must_use]
    pub fn intervals(&self) -> &[f64] {
        &self.intervals
    }

    /// Running sum of the intervals plus the start delay.
    #[must_use]
    pub fn onsets(&self) -> &[f64] {
        &self.onsets
    }

    /// Frame-index equivalents, present only when a frame duration was requested.
    #[must_use]
    pub fn frames(&self) -> Option<&FrameSchedule> {
        self.frames.as_ref()
    }

    /// Number of trials covered by the schedule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Reports whether the schedule holds no trials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
