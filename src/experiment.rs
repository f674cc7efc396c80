//! One-call experiment: question bank, population, both policies, comparison.

use serde::Serialize;
use tracing::info;

use crate::config::{EngineConfig, SimulationConfig};
use crate::error::Result;
use crate::learner::{LearnerPopulation, PopulationStats};
use crate::logging::experiment_span;
use crate::pool::{PoolStatistics, QuestionBank};
use crate::population::{ExperimentResults, PolicyOverview, PopulationRunner};
use crate::stats::{compare, ComparisonReport};

/// Seed offset for the population generator, so pool and learners differ
const POPULATION_SEED_OFFSET: u64 = 1;

#[derive(Clone, Debug, Serialize)]
pub struct ExperimentOutcome {
    pub pool_stats: PoolStatistics,
    pub population_stats: PopulationStats,
    pub results: ExperimentResults,
    pub overview: PolicyOverview,
    pub report: ComparisonReport,
}

/// Generate the bank and population from `sim.base_seed`, run both
/// policies, and compare them
pub fn run_experiment(sim: &SimulationConfig, engine: &EngineConfig) -> Result<ExperimentOutcome> {
    sim.validate()?;
    engine.validate()?;
    let _span = experiment_span(sim).entered();

    let bank = QuestionBank::generate(sim.pool_size, sim.base_seed)?;
    let population = LearnerPopulation::generate(
        sim.num_learners,
        sim.base_seed.wrapping_add(POPULATION_SEED_OFFSET),
    )?;

    let results = PopulationRunner::new(&bank, engine, sim.base_seed)
        .parallel(sim.parallel)
        .run_population(
            population.learners(),
            sim.sessions_per_learner,
            sim.questions_per_session,
        )?;

    let (adaptive, fixed) = results.partition();
    let report = compare(&adaptive, &fixed);
    let overview = results.overview();

    info!(
        sessions = results.summaries.len(),
        responses = results.responses.len(),
        complete = report.is_complete(),
        mastery_improvement_pct = ?overview.mastery_improvement_pct,
        "experiment finished"
    );

    Ok(ExperimentOutcome {
        pool_stats: bank.statistics(),
        population_stats: population.stats(),
        results,
        overview,
        report,
    })
}
