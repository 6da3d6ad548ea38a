use std::num::NonZeroU32;

use poisson_iti_core::{GenerationError, RetryPolicy};
use poisson_iti_system_blocks::{generate_session, BlockPlan, IntervalMode, SessionError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn variable_plan() -> BlockPlan {
    serde_json::from_str(
        r#"{
            "trials_per_block": [30, 24, 36],
            "iti": { "mode": "variable", "min": 1.0, "mean": 3.0, "max": 10.0 },
            "start_delay": 2.0,
            "frame_duration": 0.5
        }"#,
    )
    .expect("plan parses")
}

#[test]
fn every_variable_block_meets_the_bounds_on_its_own() {
    let plan = variable_plan();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let session = generate_session(&plan, RetryPolicy::default(), &mut rng).expect("plan converges");

    assert_eq!(session.blocks().len(), 3);
    assert_eq!(session.trial_count(), plan.trial_count());
    assert_eq!(session.intervals().count(), 90);

    for (block, (schedule, &trials)) in session
        .blocks()
        .iter()
        .zip(&plan.trials_per_block)
        .enumerate()
    {
        let intervals = schedule.intervals();
        assert_eq!(intervals.len(), trials, "block {block}");

        let min = intervals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        assert!((min - 1.0).abs() <= plan.tolerance, "block {block}: min {min}");
        assert!((mean - 3.0).abs() <= plan.tolerance, "block {block}: mean {mean}");
        assert!((max - 10.0).abs() <= plan.tolerance, "block {block}: max {max}");

        assert!(schedule.onsets()[0] >= 2.0 + 1.0 - plan.tolerance);
        assert!(schedule.frames().is_some(), "block {block}: frames missing");
    }
}

#[test]
fn failing_block_is_identified() {
    let mut plan = variable_plan();
    // Two trials can only meet both bounds when the mean sits at the midpoint.
    plan.trials_per_block = vec![10, 2];
    let policy = RetryPolicy::new(NonZeroU32::new(5).expect("non-zero"));
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    match generate_session(&plan, policy, &mut rng) {
        Err(SessionError::Block { block, source }) => {
            assert_eq!(block, 1);
            assert!(matches!(source, GenerationError::Infeasible { .. }));
        }
        other => panic!("expected block failure, got {other:?}"),
    }
}

#[test]
fn empty_plan_is_rejected() {
    let plan = BlockPlan {
        trials_per_block: Vec::new(),
        iti: IntervalMode::Fixed { seconds: 1.0 },
        bin_count: 12,
        tolerance: 0.01,
        start_delay: 0.0,
        frame_duration: None,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    assert!(matches!(
        generate_session(&plan, RetryPolicy::default(), &mut rng),
        Err(SessionError::InvalidPlan(_))
    ));
}
