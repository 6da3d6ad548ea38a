#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session planning across independently generated blocks of trials.
//!
//! A session (for example one scan run per block) is described by a
//! [`BlockPlan`]. Variable plans generate every block with its own sampler
//! run so each block satisfies the bounds on its own; fixed plans repeat one
//! interval.

use poisson_iti_core::{
    FrameSchedule, GenerationError, IntervalRequest, IntervalSchedule, RetryPolicy,
    DEFAULT_BIN_COUNT, DEFAULT_TOLERANCE,
};
use poisson_iti_system_sampler::{quantize, IntervalGenerator};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How inter-trial intervals are produced for every block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntervalMode {
    /// Every trial waits the same number of seconds.
    Fixed {
        /// Interval length in seconds.
        seconds: f64,
    },
    /// Intervals follow the constrained truncated exponential.
    Variable {
        /// Minimum interval in seconds.
        min: f64,
        /// Mean interval in seconds.
        mean: f64,
        /// Maximum interval in seconds.
        max: f64,
    },
}

/// Layout of a multi-block session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockPlan {
    /// Number of trials in each block, in presentation order.
    pub trials_per_block: Vec<usize>,
    /// Interval generation mode shared by all blocks.
    pub iti: IntervalMode,
    /// Histogram bins used when fitting variable intervals.
    #[serde(default = "default_bin_count")]
    pub bin_count: u32,
    /// Acceptance tolerance for variable intervals.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Delay before the first trial of every block.
    #[serde(default)]
    pub start_delay: f64,
    /// Frame duration for frame-index output.
    #[serde(default)]
    pub frame_duration: Option<f64>,
}

fn default_bin_count() -> u32 {
    DEFAULT_BIN_COUNT
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl BlockPlan {
    /// Total number of trials across every block.
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.trials_per_block.iter().sum()
    }

    fn request_for(&self, trials: usize, min: f64, mean: f64, max: f64) -> IntervalRequest {
        let request = IntervalRequest::new(trials, min, mean, max)
            .with_bin_count(self.bin_count)
            .with_tolerance(self.tolerance)
            .with_start_delay(self.start_delay);
        match self.frame_duration {
            Some(frame) => request.with_frame_duration(frame),
            None => request,
        }
    }
}

/// Failure while planning a session.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SessionError {
    /// The plan itself is malformed.
    #[error("invalid block plan: {0}")]
    InvalidPlan(#[source] GenerationError),
    /// A block could not be generated.
    #[error("block {block} failed: {source}")]
    Block {
        /// Zero-based index of the failing block.
        block: usize,
        /// Underlying generator failure.
        #[source]
        source: GenerationError,
    },
}

/// Per-block schedules of a planned session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSchedule {
    blocks: Vec<IntervalSchedule>,
}

impl SessionSchedule {
    /// Schedules in block order.
    #[must_use]
    pub fn blocks(&self) -> &[IntervalSchedule] {
        &self.blocks
    }

    /// Every interval of the session, concatenated in block order.
    pub fn intervals(&self) -> impl Iterator<Item = f64> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.intervals().iter().copied())
    }

    /// Total number of trials.
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.blocks.iter().map(IntervalSchedule::len).sum()
    }
}

/// Generates every block of `plan`, drawing all blocks from the same `rng`.
pub fn generate_session<R>(
    plan: &BlockPlan,
    policy: RetryPolicy,
    rng: &mut R,
) -> Result<SessionSchedule, SessionError>
where
    R: Rng + ?Sized,
{
    if plan.trials_per_block.is_empty() {
        return Err(SessionError::InvalidPlan(GenerationError::InvalidParameter {
            name: "trials_per_block",
            reason: "must list at least one block",
        }));
    }

    let blocks = match plan.iti {
        IntervalMode::Fixed { seconds } => fixed_blocks(plan, seconds)?,
        IntervalMode::Variable { min, mean, max } => {
            let mut blocks = Vec::with_capacity(plan.trials_per_block.len());
            for (block, &trials) in plan.trials_per_block.iter().enumerate() {
                let request = plan.request_for(trials, min, mean, max);
                let outcome = IntervalGenerator::new(request, policy)
                    .generate(rng)
                    .map_err(|source| SessionError::Block { block, source })?;
                tracing::debug!(block, trials, attempts = outcome.attempts, "block generated");
                blocks.push(outcome.schedule);
            }
            blocks
        }
    };

    Ok(SessionSchedule { blocks })
}

fn fixed_blocks(plan: &BlockPlan, seconds: f64) -> Result<Vec<IntervalSchedule>, SessionError> {
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(SessionError::InvalidPlan(GenerationError::InvalidParameter {
            name: "iti",
            reason: "fixed interval must be positive and finite",
        }));
    }
    if !(plan.start_delay.is_finite() && plan.start_delay >= 0.0) {
        return Err(SessionError::InvalidPlan(GenerationError::InvalidParameter {
            name: "start_delay",
            reason: "must be non-negative and finite",
        }));
    }
    if let Some(frame) = plan.frame_duration {
        if !(frame.is_finite() && frame > 0.0) {
            return Err(SessionError::InvalidPlan(GenerationError::InvalidParameter {
                name: "frame_duration",
                reason: "must be positive and finite",
            }));
        }
    }

    let blocks = plan
        .trials_per_block
        .iter()
        .map(|&trials| {
            let schedule = IntervalSchedule::from_intervals(vec![seconds; trials], plan.start_delay);
            match plan.frame_duration {
                Some(frame) => {
                    let frames = FrameSchedule::new(
                        quantize(schedule.intervals(), frame),
                        quantize(schedule.onsets(), frame),
                    );
                    schedule.with_frames(frames)
                }
                None => schedule,
            }
        })
        .collect();
    Ok(blocks)
}
