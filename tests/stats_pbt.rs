//! Property-Based Tests for the statistics engine and session metrics
//!
//! Tests the following invariants:
//! - Cohen's d of a group against itself is zero
//! - Welch p-values are finite probabilities
//! - Descriptive stats are ordered: min <= median, mean <= max
//! - Mastery index stays in [0, 3]
//! - Groups below two observations are signalled, never computed
//! - Controller decisions agree with their thresholds

use proptest::prelude::*;

use danci_quiz_sim::session::mastery_index;
use danci_quiz_sim::stats::{cohens_d, describe, welch_t_test};
use danci_quiz_sim::{
    Decision, Difficulty, DifficultyController, PerformanceWindow, QuestionResponse, Topic,
    MAX_MASTERY_INDEX,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_sample(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((0u64..=3000u64).prop_map(|v| v as f64 / 1000.0), min_len..40)
}

fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
    prop_oneof![
        Just(Difficulty::Easy),
        Just(Difficulty::Medium),
        Just(Difficulty::Hard),
    ]
}

fn arb_response() -> impl Strategy<Value = QuestionResponse> {
    (arb_difficulty(), any::<bool>(), 5.0f64..120.0).prop_map(|(difficulty, correct, time)| {
        QuestionResponse {
            session_id: "s".to_string(),
            learner_id: "l".to_string(),
            question_index: 0,
            item_id: 1,
            topic: Topic::Science,
            difficulty,
            correct,
            response_time: time,
            expected_time: 30.0,
            elapsed_in_session: time,
        }
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_cohens_d_identical_groups_is_zero(sample in arb_sample(2)) {
        let d = cohens_d(&sample, &sample).unwrap();
        prop_assert!(d.abs() < 1e-9);
    }

    #[test]
    fn prop_welch_p_value_is_probability(a in arb_sample(2), b in arb_sample(2)) {
        let result = welch_t_test(&a, &b).unwrap();
        prop_assert!(!result.p_value.is_nan());
        prop_assert!((0.0..=1.0).contains(&result.p_value));
        prop_assert!(!result.t_statistic.is_nan());
        prop_assert_eq!(result.significant, result.p_value < 0.05);
    }

    #[test]
    fn prop_describe_is_ordered(sample in arb_sample(1)) {
        let stats = describe(&sample).unwrap();
        prop_assert!(stats.min <= stats.median && stats.median <= stats.max);
        prop_assert!(stats.min <= stats.mean + 1e-12 && stats.mean <= stats.max + 1e-12);
        prop_assert_eq!(stats.std_dev.is_some(), sample.len() >= 2);
    }

    #[test]
    fn prop_small_groups_are_signalled(single in arb_sample(1).prop_map(|v| vec![v[0]]), other in arb_sample(2)) {
        let t = welch_t_test(&single, &other).unwrap_err();
        prop_assert!(t.is_insufficient_data());
        let d = cohens_d(&other, &single).unwrap_err();
        prop_assert!(d.is_insufficient_data());
    }

    #[test]
    fn prop_mastery_index_bounded(responses in prop::collection::vec(arb_response(), 1..50)) {
        let m = mastery_index(&responses);
        prop_assert!((0.0..=MAX_MASTERY_INDEX).contains(&m));
    }

    #[test]
    fn prop_controller_respects_thresholds(
        entries in prop::collection::vec((any::<bool>(), 5.0f64..90.0), 1..12),
        reference in 10.0f64..60.0,
    ) {
        let controller = DifficultyController::default();
        let mut window = PerformanceWindow::new(5);
        for &(correct, time) in &entries {
            window.push(correct, time);
        }
        let accuracy = window.accuracy().unwrap();
        let mean_time = window.mean_response_time().unwrap();

        match controller.evaluate(&window, reference) {
            Decision::Increase => prop_assert!(accuracy > 0.80 && mean_time < reference),
            Decision::Decrease => prop_assert!(accuracy < 0.50),
            Decision::Hold => prop_assert!(
                !(accuracy > 0.80 && mean_time < reference) && accuracy >= 0.50
            ),
        }
        prop_assert!(window.len() <= 5);
    }
}
