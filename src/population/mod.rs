//! Population Runner
//!
//! Runs every learner through `sessions_per_learner` sessions under each
//! policy and flattens the results.
//!
//! Isolation and reproducibility:
//! - Each policy starts from its own clone of the learner's initial state,
//!   so the adaptive and fixed trajectories never contaminate each other;
//!   within a policy, ability carries over from session to session
//! - Learner `i` draws from `ChaCha8Rng::seed_from_u64(base_seed + i)` on the
//!   policy's stream, so output is identical for serial and parallel runs
//! - Workers only merge after all of them finish, in learner order
//! - Learner ids must be unique: session ids and learning gains key on them

use std::collections::HashSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug_span, info};

use crate::config::EngineConfig;
use crate::error::{Result, SimError};
use crate::learner::LearnerState;
use crate::pool::ItemPool;
use crate::session::{SessionContext, SessionRecord, SessionRunner};
use crate::types::{Policy, QuestionResponse, SessionSummary};

// ==================== Data Structures ====================

/// A learner's state after all sessions under one policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalState {
    pub policy: Policy,
    pub learner: LearnerState,
}

/// Flat, order-preserving output of a population run
///
/// Order: learner by learner; within a learner, all adaptive sessions then
/// all fixed sessions; within a session, question order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub summaries: Vec<SessionSummary>,
    pub responses: Vec<QuestionResponse>,
    pub final_states: Vec<FinalState>,
}

/// One point on a learner's session-by-session curve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressionPoint {
    pub session_index: usize,
    pub accuracy: f64,
    pub mastery_index: f64,
    pub mean_response_time: f64,
    pub difficulty_change_count: usize,
}

/// Plain means for one policy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyMeans {
    pub sessions: usize,
    pub mean_accuracy: f64,
    pub mean_mastery: f64,
    pub mean_response_time: f64,
    pub mean_difficulty_changes: f64,
}

impl PolicyMeans {
    fn from_summaries<'a>(summaries: impl Iterator<Item = &'a SessionSummary>) -> Self {
        let mut means = Self::default();
        for s in summaries {
            means.sessions += 1;
            means.mean_accuracy += s.accuracy;
            means.mean_mastery += s.mastery_index;
            means.mean_response_time += s.mean_response_time;
            means.mean_difficulty_changes += s.difficulty_change_count as f64;
        }
        if means.sessions > 0 {
            let n = means.sessions as f64;
            means.mean_accuracy /= n;
            means.mean_mastery /= n;
            means.mean_response_time /= n;
            means.mean_difficulty_changes /= n;
        }
        means
    }
}

/// Side-by-side policy means with relative improvement of adaptive over fixed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverview {
    pub adaptive: PolicyMeans,
    pub fixed: PolicyMeans,
    /// Percent; `None` when the fixed mean is zero
    pub accuracy_improvement_pct: Option<f64>,
    pub mastery_improvement_pct: Option<f64>,
}

fn improvement_pct(adaptive: f64, fixed: f64) -> Option<f64> {
    (fixed > 0.0).then(|| (adaptive - fixed) / fixed * 100.0)
}

impl ExperimentResults {
    pub fn summaries_for(&self, policy: Policy) -> impl Iterator<Item = &SessionSummary> {
        self.summaries.iter().filter(move |s| s.policy == policy)
    }

    /// Owned (adaptive, fixed) split for the statistics engine
    pub fn partition(&self) -> (Vec<SessionSummary>, Vec<SessionSummary>) {
        self.summaries
            .iter()
            .cloned()
            .partition(|s| s.policy == Policy::Adaptive)
    }

    pub fn responses_for_session<'a>(
        &'a self,
        session_id: &'a str,
    ) -> impl Iterator<Item = &'a QuestionResponse> {
        self.responses
            .iter()
            .filter(move |r| r.session_id == session_id)
    }

    /// Sessions of one learner under one policy, in session order
    pub fn learning_progression(&self, learner_id: &str, policy: Policy) -> Vec<ProgressionPoint> {
        let mut points: Vec<ProgressionPoint> = self
            .summaries_for(policy)
            .filter(|s| s.learner_id == learner_id)
            .map(|s| ProgressionPoint {
                session_index: s.session_index,
                accuracy: s.accuracy,
                mastery_index: s.mastery_index,
                mean_response_time: s.mean_response_time,
                difficulty_change_count: s.difficulty_change_count,
            })
            .collect();
        points.sort_by_key(|p| p.session_index);
        points
    }

    pub fn overview(&self) -> PolicyOverview {
        let adaptive = PolicyMeans::from_summaries(self.summaries_for(Policy::Adaptive));
        let fixed = PolicyMeans::from_summaries(self.summaries_for(Policy::Fixed));
        PolicyOverview {
            accuracy_improvement_pct: improvement_pct(adaptive.mean_accuracy, fixed.mean_accuracy),
            mastery_improvement_pct: improvement_pct(adaptive.mean_mastery, fixed.mean_mastery),
            adaptive,
            fixed,
        }
    }

    pub fn final_state(&self, learner_id: &str, policy: Policy) -> Option<&LearnerState> {
        self.final_states
            .iter()
            .find(|f| f.policy == policy && f.learner.id == learner_id)
            .map(|f| &f.learner)
    }
}

// ==================== Runner ====================

struct LearnerRun {
    records: Vec<SessionRecord>,
    final_states: Vec<FinalState>,
}

pub struct PopulationRunner<'a, P: ItemPool + Sync + ?Sized> {
    pool: &'a P,
    config: EngineConfig,
    base_seed: u64,
    parallel: bool,
}

impl<'a, P: ItemPool + Sync + ?Sized> PopulationRunner<'a, P> {
    pub fn new(pool: &'a P, config: &EngineConfig, base_seed: u64) -> Self {
        Self {
            pool,
            config: config.clone(),
            base_seed,
            parallel: false,
        }
    }

    /// Spread learners across the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run_population(
        &self,
        learners: &[LearnerState],
        sessions_per_learner: usize,
        questions_per_session: usize,
    ) -> Result<ExperimentResults> {
        self.run_population_with_observer(
            learners,
            sessions_per_learner,
            questions_per_session,
            |_: &SessionSummary| {},
        )
    }

    /// As `run_population`, calling `observer` as each session completes
    ///
    /// With `parallel` enabled the observer is called from worker threads
    /// in completion order, not result order.
    pub fn run_population_with_observer<F>(
        &self,
        learners: &[LearnerState],
        sessions_per_learner: usize,
        questions_per_session: usize,
        observer: F,
    ) -> Result<ExperimentResults>
    where
        F: Fn(&SessionSummary) + Sync,
    {
        if sessions_per_learner == 0 {
            return Err(SimError::invalid("sessions_per_learner must be at least 1"));
        }
        if questions_per_session == 0 {
            return Err(SimError::invalid("questions_per_session must be at least 1"));
        }
        let mut seen = HashSet::with_capacity(learners.len());
        if let Some(dup) = learners.iter().find(|l| !seen.insert(l.id.as_str())) {
            return Err(SimError::invalid(format!("duplicate learner id {}", dup.id)));
        }

        info!(
            learners = learners.len(),
            sessions_per_learner,
            questions_per_session,
            parallel = self.parallel,
            base_seed = self.base_seed,
            "running population"
        );

        let run = |(index, learner): (usize, &LearnerState)| {
            self.run_learner(
                index,
                learner,
                sessions_per_learner,
                questions_per_session,
                &observer,
            )
        };

        let runs: Vec<LearnerRun> = if self.parallel {
            learners
                .par_iter()
                .enumerate()
                .map(run)
                .collect::<Result<_>>()?
        } else {
            learners
                .iter()
                .enumerate()
                .map(run)
                .collect::<Result<_>>()?
        };

        let mut results = ExperimentResults::default();
        for run in runs {
            for record in run.records {
                results.responses.extend(record.responses);
                results.summaries.push(record.summary);
            }
            results.final_states.extend(run.final_states);
        }

        info!(sessions = results.summaries.len(), "population finished");
        Ok(results)
    }

    fn run_learner<F>(
        &self,
        index: usize,
        learner: &LearnerState,
        sessions_per_learner: usize,
        questions_per_session: usize,
        observer: &F,
    ) -> Result<LearnerRun>
    where
        F: Fn(&SessionSummary) + Sync,
    {
        let runner = SessionRunner::new(self.pool, &self.config);
        let seed = self.base_seed.wrapping_add(index as u64);
        let mut records = Vec::with_capacity(sessions_per_learner * Policy::ALL.len());
        let mut final_states = Vec::with_capacity(Policy::ALL.len());

        for policy in Policy::ALL {
            let _span = debug_span!("learner", learner_id = %learner.id, %policy, seed).entered();
            let mut state = learner.clone();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(policy.stream());

            for session_index in 0..sessions_per_learner {
                let ctx = SessionContext::for_learner(&learner.id, policy, session_index);
                let record = runner.run_session(
                    &mut state,
                    policy,
                    questions_per_session,
                    &ctx,
                    &mut rng,
                )?;
                observer(&record.summary);
                records.push(record);
            }

            final_states.push(FinalState {
                policy,
                learner: state,
            });
        }

        Ok(LearnerRun {
            records,
            final_states,
        })
    }
}
