use poisson_iti_core::{GenerationError, IntervalRequest, IntervalSchedule, RetryPolicy};
use poisson_iti_system_sampler::{generate_intervals, quantize, IntervalGenerator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const SEEDS: [u64; 6] = [
    0x0000_0000_0000_0001,
    0x1234_5678_9abc_def0,
    0x4d59_5df4_d0f3_3173,
    0x9e37_79b9_7f4a_7c15,
    0xdead_beef_cafe_f00d,
    0x0f0f_0f0f_0f0f_0f0f,
];

fn reference_request() -> IntervalRequest {
    IntervalRequest::new(50, 0.5, 2.0, 8.0).with_bin_count(12)
}

fn generate(request: IntervalRequest, seed: u64) -> IntervalSchedule {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_intervals(request, &mut rng).expect("reference parameters converge")
}

fn bounds(values: &[f64]) -> (f64, f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (min, mean, max)
}

#[test]
fn reference_scenario_hits_requested_bounds() {
    for seed in SEEDS {
        let schedule = generate(reference_request(), seed);
        let (min, mean, max) = bounds(schedule.intervals());

        assert_eq!(schedule.intervals().len(), 50);
        assert!((0.49..=0.51).contains(&min), "seed {seed:#x}: min {min}");
        assert!((1.99..=2.01).contains(&mean), "seed {seed:#x}: mean {mean}");
        assert!((7.99..=8.01).contains(&max), "seed {seed:#x}: max {max}");
        assert!(schedule.frames().is_none());
    }
}

#[test]
fn onsets_are_strictly_increasing_from_the_start_delay() {
    let request = reference_request().with_start_delay(4.0);
    for seed in SEEDS {
        let schedule = generate(request, seed);
        let onsets = schedule.onsets();

        assert_eq!(onsets.len(), schedule.intervals().len());
        assert!(onsets[0] >= 4.0 + 0.5 - request.tolerance());
        assert!(
            onsets.windows(2).all(|pair| pair[1] > pair[0]),
            "seed {seed:#x}: onsets not increasing"
        );

        let total = 4.0 + schedule.intervals().iter().sum::<f64>();
        let last = onsets[onsets.len() - 1];
        assert!((total - last).abs() < 1e-9, "seed {seed:#x}: {total} vs {last}");
    }
}

#[test]
fn frame_indices_are_rounded_intervals_and_onsets() {
    let request = reference_request().with_frame_duration(0.1);
    for seed in SEEDS {
        let schedule = generate(request, seed);
        let frames = schedule.frames().expect("frame duration requested");

        assert_eq!(frames.intervals(), quantize(schedule.intervals(), 0.1).as_slice());
        assert_eq!(frames.onsets(), quantize(schedule.onsets(), 0.1).as_slice());
        for (&frame, &interval) in frames.intervals().iter().zip(schedule.intervals()) {
            assert!(frame >= 0);
            assert!((frame as f64 * 0.1 - interval).abs() < 0.05 + 1e-9);
        }
    }
}

#[test]
fn single_trial_lands_on_the_mean() {
    let request = IntervalRequest::new(1, 0.5, 2.0, 8.0);
    for seed in SEEDS {
        let schedule = generate(request, seed);
        assert_eq!(schedule.intervals().len(), 1);
        assert!((schedule.intervals()[0] - 2.0).abs() <= request.tolerance());
    }
}

#[test]
fn two_trials_sit_on_both_bounds() {
    // Both values are pinned, so the exchange search has nothing left to move.
    let request = IntervalRequest::new(2, 1.0, 5.0, 9.0);
    for seed in SEEDS {
        let mut generator = IntervalGenerator::new(request, RetryPolicy::default());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let outcome = generator.generate(&mut rng).expect("midpoint mean is feasible");

        let (min, mean, max) = bounds(outcome.schedule.intervals());
        assert_eq!(outcome.schedule.intervals().len(), 2);
        assert!((min - 1.0).abs() <= request.tolerance(), "seed {seed:#x}: min {min}");
        assert!((mean - 5.0).abs() <= request.tolerance(), "seed {seed:#x}: mean {mean}");
        assert!((max - 9.0).abs() <= request.tolerance(), "seed {seed:#x}: max {max}");
    }
}

#[test]
fn tight_tolerance_and_many_bins_still_converge() {
    let request = IntervalRequest::new(200, 1.0, 3.0, 12.0)
        .with_bin_count(20)
        .with_tolerance(1e-6);
    let schedule = generate(request, 42);
    let (min, mean, max) = bounds(schedule.intervals());
    assert!((min - 1.0).abs() <= 1e-6);
    assert!((mean - 3.0).abs() <= 1e-6);
    assert!((max - 12.0).abs() <= 1e-6);
}

#[test]
fn shape_favours_short_intervals() {
    // A truncated exponential keeps more mass below the mean than above it.
    let schedule = generate(IntervalRequest::new(400, 0.5, 2.0, 8.0), 7);
    let below = schedule.intervals().iter().filter(|&&value| value < 2.0).count();
    assert!(below > 200, "only {below} of 400 intervals below the mean");
}

#[test]
fn equal_mean_and_minimum_is_rejected_before_sampling() {
    let request = IntervalRequest::new(50, 2.0, 2.0, 8.0);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    match generate_intervals(request, &mut rng) {
        Err(GenerationError::InvalidParameter { name, .. }) => assert_eq!(name, "mean_interval"),
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}

#[test]
fn non_positive_minimum_is_rejected_before_sampling() {
    for min in [0.0, -1.0] {
        let request = IntervalRequest::new(20, min, 2.0, 8.0).with_frame_duration(0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        match generate_intervals(request, &mut rng) {
            Err(GenerationError::InvalidParameter { name, .. }) => {
                assert_eq!(name, "min_interval", "min {min}")
            }
            other => panic!("expected InvalidParameter for min {min}, got {other:?}"),
        }
    }
}

#[test]
fn outcome_reports_attempt_accounting() {
    let mut generator = IntervalGenerator::new(reference_request(), RetryPolicy::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let outcome = generator.generate(&mut rng).expect("reference parameters converge");

    assert!(outcome.attempts >= 1);
    assert_eq!(outcome.rejections.len() as u32, outcome.attempts - 1);
    assert!(outcome.cost.is_finite());
}
