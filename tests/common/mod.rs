#![allow(dead_code)]

use danci_quiz_sim::{
    EngineConfig, ExperimentResults, LearnerPopulation, LearnerState, PopulationRunner,
    QuestionBank, SimulationConfig,
};

pub fn bank(seed: u64) -> QuestionBank {
    QuestionBank::generate(90, seed).expect("bank")
}

pub fn learner(id: &str, base_ability: f64) -> LearnerState {
    LearnerState::new(id, base_ability, 0.05, 1.0, 0.8).expect("learner")
}

pub fn small_sim(seed: u64) -> SimulationConfig {
    SimulationConfig {
        num_learners: 5,
        sessions_per_learner: 3,
        questions_per_session: 10,
        pool_size: 90,
        base_seed: seed,
        parallel: false,
        log_level: "warn".to_string(),
    }
}

/// 5 learners x 3 sessions x 10 questions, both policies
pub fn run_small(seed: u64) -> ExperimentResults {
    let pool = bank(seed);
    let population = LearnerPopulation::generate(5, seed.wrapping_add(1)).expect("population");
    PopulationRunner::new(&pool, &EngineConfig::default(), seed)
        .run_population(population.learners(), 3, 10)
        .expect("population run")
}
