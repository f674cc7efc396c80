//! Learner Response Model
//!
//! Simulates how a synthetic learner answers an item and how their ability
//! drifts as they practise.
//!
//! Core principles:
//! - Success probability is a logistic curve of ability against a per-difficulty
//!   location, so it falls monotonically as difficulty rises relative to ability
//! - Low-consistency learners get a wider Gaussian perturbation on that
//!   probability
//! - Response time scales expected time by 1/speed_factor with multiplicative
//!   noise; incorrect answers take 1.1-1.4x longer (hesitation)
//! - Ability grows by learning_rate × weight(difficulty) × (1 - ability) after a
//!   correct answer; an incorrect answer yields 30% of that growth and never
//!   lowers ability
//!
//! Every draw comes from the caller's RNG, in a fixed order, so a seeded RNG
//! reproduces a response sequence bit for bit.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Result, SimError};
use crate::sanitize::{clamp_probability, sanitize_response_time, unit_interval};
use crate::types::{Difficulty, Item, DEFAULT_ABILITY_CEILING, EPSILON};

// ==================== Constants ====================

/// Steepness of the ability/difficulty logistic curve
const LOGISTIC_SLOPE: f64 = 6.0;

/// Ability at which a learner answers half the items of a difficulty
const EASY_LOCATION: f64 = 0.10;
const MEDIUM_LOCATION: f64 = 0.35;
const HARD_LOCATION: f64 = 0.60;

/// Probability noise scale multiplied by (1 - consistency)
const CONSISTENCY_NOISE_SCALE: f64 = 0.2;

/// Standard deviation of the multiplicative response time noise
const TIME_NOISE_STD: f64 = 0.2;

/// Hesitation multiplier range for incorrect answers
const HESITATION_RANGE: (f64, f64) = (1.1, 1.4);

/// Share of the learning increment kept after an incorrect answer
const ERROR_LEARNING_FACTOR: f64 = 0.3;

// ==================== Data Structures ====================

/// Ability band used when generating populations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityTier {
    Struggling,
    Average,
    Advanced,
}

impl AbilityTier {
    pub fn of(base_ability: f64) -> Self {
        if base_ability < 0.5 {
            Self::Struggling
        } else if base_ability < 0.75 {
            Self::Average
        } else {
            Self::Advanced
        }
    }
}

/// A simulated learner's mutable state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnerState {
    pub id: String,
    /// Starting ability [0, 1]; also the floor ability never drops below
    pub base_ability: f64,
    /// Ability right now [base_ability, ceiling]
    pub current_ability: f64,
    pub learning_rate: f64,
    /// Above 1.0 answers faster than expected
    pub speed_factor: f64,
    /// [0, 1], higher means less answer-to-answer variance
    pub consistency: f64,
    pub questions_answered: u32,
}

impl LearnerState {
    pub fn new(
        id: impl Into<String>,
        base_ability: f64,
        learning_rate: f64,
        speed_factor: f64,
        consistency: f64,
    ) -> Result<Self> {
        let id = id.into();
        let base_ability = unit_interval(base_ability).ok_or_else(|| {
            SimError::invalid(format!("learner {id}: base_ability {base_ability} outside [0, 1]"))
        })?;
        let learning_rate = unit_interval(learning_rate).ok_or_else(|| {
            SimError::invalid(format!("learner {id}: learning_rate {learning_rate} outside [0, 1]"))
        })?;
        let consistency = unit_interval(consistency).ok_or_else(|| {
            SimError::invalid(format!("learner {id}: consistency {consistency} outside [0, 1]"))
        })?;
        if !(speed_factor.is_finite() && speed_factor > 0.0) {
            return Err(SimError::invalid(format!(
                "learner {id}: speed_factor {speed_factor} must be positive"
            )));
        }

        Ok(Self {
            id,
            base_ability,
            current_ability: base_ability,
            learning_rate,
            speed_factor,
            consistency,
            questions_answered: 0,
        })
    }

    pub fn tier(&self) -> AbilityTier {
        AbilityTier::of(self.base_ability)
    }

    /// Restore the starting ability
    pub fn reset(&mut self) {
        self.current_ability = self.base_ability;
        self.questions_answered = 0;
    }
}

/// Outcome of one simulated answer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub correct: bool,
    /// Seconds
    pub response_time: f64,
}

// ==================== Model ====================

#[derive(Clone, Debug)]
pub struct LearnerModel {
    ability_ceiling: f64,
}

impl LearnerModel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ability_ceiling: config.ability_ceiling,
        }
    }

    /// Noise-free success probability for an ability at a difficulty
    pub fn success_probability(ability: f64, difficulty: Difficulty) -> f64 {
        let location = match difficulty {
            Difficulty::Easy => EASY_LOCATION,
            Difficulty::Medium => MEDIUM_LOCATION,
            Difficulty::Hard => HARD_LOCATION,
        };
        let p = 1.0 / (1.0 + (-LOGISTIC_SLOPE * (ability - location)).exp());
        clamp_probability(p)
    }

    /// Learning weight: harder items teach more
    pub fn learning_weight(difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => 0.5,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.5,
        }
    }

    /// Simulate an answer and apply the learning update
    pub fn answer(&self, item: &Item, state: &mut LearnerState, rng: &mut dyn RngCore) -> Answer {
        let mut p = Self::success_probability(state.current_ability, item.difficulty);

        if state.consistency < 1.0 {
            let spread = (1.0 - state.consistency) * CONSISTENCY_NOISE_SCALE;
            p = clamp_probability(p + sample_normal(rng) * spread);
        }

        let correct = rng.gen::<f64>() < p;

        let variation = 1.0 + TIME_NOISE_STD * sample_normal(rng);
        let mut response_time = item.expected_time / state.speed_factor * variation;
        if !correct {
            response_time *= rng.gen_range(HESITATION_RANGE.0..HESITATION_RANGE.1);
        }
        let response_time = sanitize_response_time(response_time);

        state.questions_answered += 1;
        self.update_ability(state, correct, item.difficulty);

        Answer {
            correct,
            response_time,
        }
    }

    /// Diminishing-returns ability update, clamped to [base, ceiling]
    pub fn update_ability(&self, state: &mut LearnerState, correct: bool, difficulty: Difficulty) {
        let mut improvement = state.learning_rate * Self::learning_weight(difficulty);
        if !correct {
            improvement *= ERROR_LEARNING_FACTOR;
        }

        let ceiling = self.ability_ceiling;
        let floor = state.base_ability.min(ceiling);
        let next = state.current_ability + improvement * (1.0 - state.current_ability);
        state.current_ability = next.clamp(floor, ceiling);
    }
}

impl Default for LearnerModel {
    fn default() -> Self {
        Self {
            ability_ceiling: DEFAULT_ABILITY_CEILING,
        }
    }
}

/// Standard normal draw using the Box-Muller transform
fn sample_normal(rng: &mut dyn RngCore) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(EPSILON);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

// ==================== Population ====================

/// Population composition summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationStats {
    pub total_learners: usize,
    pub avg_base_ability: f64,
    pub avg_learning_rate: f64,
    pub avg_speed_factor: f64,
    pub struggling: usize,
    pub average: usize,
    pub advanced: usize,
}

/// An owned set of learners
#[derive(Clone, Debug, Default)]
pub struct LearnerPopulation {
    learners: Vec<LearnerState>,
}

impl LearnerPopulation {
    pub fn new(learners: Vec<LearnerState>) -> Self {
        Self { learners }
    }

    /// Generate a tiered population
    ///
    /// The first third are struggling, the next third average, the rest
    /// advanced. Ids are `learner_001`, `learner_002`, ...
    pub fn generate(num_learners: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let learners = (0..num_learners)
            .map(|i| {
                let (base_ability, learning_rate) = if i < num_learners / 3 {
                    (rng.gen_range(0.3..0.5), rng.gen_range(0.03..0.07))
                } else if i < 2 * num_learners / 3 {
                    (rng.gen_range(0.5..0.75), rng.gen_range(0.04..0.06))
                } else {
                    (rng.gen_range(0.75..0.9), rng.gen_range(0.02..0.05))
                };
                let speed_factor = rng.gen_range(0.7..1.5);
                let consistency = rng.gen_range(0.6..0.95);

                LearnerState::new(
                    format!("learner_{:03}", i + 1),
                    base_ability,
                    learning_rate,
                    speed_factor,
                    consistency,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { learners })
    }

    pub fn learners(&self) -> &[LearnerState] {
        &self.learners
    }

    pub fn into_learners(self) -> Vec<LearnerState> {
        self.learners
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LearnerState> {
        self.learners.iter().find(|l| l.id == id)
    }

    pub fn reset_all(&mut self) {
        for learner in &mut self.learners {
            learner.reset();
        }
    }

    pub fn stats(&self) -> PopulationStats {
        let n = self.learners.len();
        let mean = |f: fn(&LearnerState) -> f64| {
            if n == 0 {
                0.0
            } else {
                self.learners.iter().map(f).sum::<f64>() / n as f64
            }
        };
        let count = |tier: AbilityTier| self.learners.iter().filter(|l| l.tier() == tier).count();

        PopulationStats {
            total_learners: n,
            avg_base_ability: mean(|l| l.base_ability),
            avg_learning_rate: mean(|l| l.learning_rate),
            avg_speed_factor: mean(|l| l.speed_factor),
            struggling: count(AbilityTier::Struggling),
            average: count(AbilityTier::Average),
            advanced: count(AbilityTier::Advanced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Topic;

    fn hard_item() -> Item {
        Item {
            id: 1,
            difficulty: Difficulty::Hard,
            topic: Topic::Science,
            expected_time: 50.0,
        }
    }

    fn learner(base_ability: f64, learning_rate: f64) -> LearnerState {
        LearnerState::new("test_001", base_ability, learning_rate, 1.0, 0.8).unwrap()
    }

    // ==================== Probability Tests ====================

    #[test]
    fn test_probability_decreases_with_difficulty() {
        for ability in [0.2, 0.5, 0.8] {
            let easy = LearnerModel::success_probability(ability, Difficulty::Easy);
            let medium = LearnerModel::success_probability(ability, Difficulty::Medium);
            let hard = LearnerModel::success_probability(ability, Difficulty::Hard);
            assert!(easy > medium && medium > hard, "ability {ability}");
        }
    }

    #[test]
    fn test_probability_increases_with_ability() {
        let low = LearnerModel::success_probability(0.3, Difficulty::Medium);
        let high = LearnerModel::success_probability(0.9, Difficulty::Medium);
        assert!(high > low);
        assert!(high <= 0.95 && low >= 0.05);
    }

    // ==================== Learning Tests ====================

    #[test]
    fn test_correct_answer_grows_ability_with_diminishing_returns() {
        let model = LearnerModel::default();
        let mut state = learner(0.5, 0.1);

        model.update_ability(&mut state, true, Difficulty::Medium);
        let first_gain = state.current_ability - 0.5;
        assert!((first_gain - 0.05).abs() < 1e-12);

        let before = state.current_ability;
        model.update_ability(&mut state, true, Difficulty::Medium);
        let second_gain = state.current_ability - before;
        assert!(second_gain < first_gain);
    }

    #[test]
    fn test_harder_items_teach_more() {
        let model = LearnerModel::default();
        let mut easy = learner(0.5, 0.1);
        let mut hard = learner(0.5, 0.1);
        model.update_ability(&mut easy, true, Difficulty::Easy);
        model.update_ability(&mut hard, true, Difficulty::Hard);
        assert!(hard.current_ability > easy.current_ability);
    }

    #[test]
    fn test_incorrect_answer_never_lowers_ability() {
        let model = LearnerModel::default();
        let mut state = learner(0.5, 0.1);
        model.update_ability(&mut state, false, Difficulty::Hard);
        assert!(state.current_ability >= 0.5);
        assert!((state.current_ability - (0.5 + 0.1 * 1.5 * 0.3 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_ability_capped_at_ceiling() {
        let model = LearnerModel::default();
        let mut state = learner(0.97, 1.0);
        for _ in 0..10 {
            model.update_ability(&mut state, true, Difficulty::Hard);
        }
        assert!((state.current_ability - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_base_above_ceiling_does_not_panic() {
        let model = LearnerModel::default();
        let mut state = learner(0.99, 0.1);
        model.update_ability(&mut state, true, Difficulty::Easy);
        assert!((state.current_ability - 0.98).abs() < 1e-12);
    }

    // ==================== Answer Tests ====================

    #[test]
    fn test_answer_is_deterministic_for_seed() {
        let model = LearnerModel::default();
        let item = hard_item();
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(77);
            let mut state = learner(0.6, 0.05);
            (0..20)
                .map(|_| model.answer(&item, &mut state, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_answer_updates_state_and_floors_time() {
        let model = LearnerModel::default();
        let item = hard_item();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut state = learner(0.6, 0.05);

        for _ in 0..30 {
            let answer = model.answer(&item, &mut state, &mut rng);
            assert!(answer.response_time >= 5.0);
        }
        assert_eq!(state.questions_answered, 30);
        assert!(state.current_ability > 0.6);
    }

    #[test]
    fn test_faster_learner_answers_faster_on_average() {
        let model = LearnerModel::default();
        let item = hard_item();
        let mean_time = |speed: f64| {
            let mut rng = ChaCha8Rng::seed_from_u64(11);
            let mut state = LearnerState::new("s", 0.7, 0.0, speed, 1.0).unwrap();
            (0..200)
                .map(|_| model.answer(&item, &mut state, &mut rng).response_time)
                .sum::<f64>()
                / 200.0
        };
        assert!(mean_time(1.5) < mean_time(0.7));
    }

    // ==================== State Tests ====================

    #[test]
    fn test_invalid_learner_parameters_rejected() {
        assert!(LearnerState::new("x", 1.2, 0.1, 1.0, 0.8).is_err());
        assert!(LearnerState::new("x", 0.5, -0.1, 1.0, 0.8).is_err());
        assert!(LearnerState::new("x", 0.5, 0.1, 0.0, 0.8).is_err());
        assert!(LearnerState::new("x", 0.5, 0.1, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_reset_restores_base() {
        let model = LearnerModel::default();
        let mut state = learner(0.4, 0.2);
        model.update_ability(&mut state, true, Difficulty::Hard);
        state.reset();
        assert_eq!(state.current_ability, 0.4);
        assert_eq!(state.questions_answered, 0);
    }

    // ==================== Population Tests ====================

    #[test]
    fn test_population_tiers() {
        let population = LearnerPopulation::generate(15, 42).unwrap();
        let stats = population.stats();

        assert_eq!(stats.total_learners, 15);
        assert_eq!(stats.struggling, 5);
        assert_eq!(stats.average, 5);
        assert_eq!(stats.advanced, 5);
        assert!(population.get("learner_001").is_some());
        assert!(population.get("learner_016").is_none());
    }

    #[test]
    fn test_population_is_deterministic() {
        let a = LearnerPopulation::generate(6, 3).unwrap();
        let b = LearnerPopulation::generate(6, 3).unwrap();
        assert_eq!(a.learners(), b.learners());
    }
}
