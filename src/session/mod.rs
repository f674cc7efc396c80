//! Quiz Session Runner
//!
//! Drives one session for one learner under one policy: choose a
//! difficulty, draw an item, let the learner answer, record the response.
//! The adaptive policy consults the controller before every question after
//! the first; the fixed policy serves medium throughout and never touches
//! the controller.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::controller::DifficultyController;
use crate::error::{Result, SimError};
use crate::learner::{LearnerModel, LearnerState};
use crate::pool::ItemPool;
use crate::types::{Difficulty, Policy, QuestionResponse, SessionSummary};

/// Identity of a session within an experiment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    /// Zero-based ordinal for the learner under this policy
    pub session_index: usize,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, session_index: usize) -> Self {
        Self {
            session_id: session_id.into(),
            session_index,
        }
    }

    /// `{learner}_{policy}_{n}` with a one-based n
    pub fn for_learner(learner_id: &str, policy: Policy, session_index: usize) -> Self {
        Self::new(
            format!("{learner_id}_{}_{}", policy.as_str(), session_index + 1),
            session_index,
        )
    }
}

/// Ordered responses plus their summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub responses: Vec<QuestionResponse>,
    pub summary: SessionSummary,
}

pub struct SessionRunner<'a, P: ItemPool + ?Sized> {
    pool: &'a P,
    controller: DifficultyController,
    model: LearnerModel,
}

impl<'a, P: ItemPool + ?Sized> SessionRunner<'a, P> {
    pub fn new(pool: &'a P, config: &EngineConfig) -> Self {
        Self {
            pool,
            controller: DifficultyController::new(config),
            model: LearnerModel::new(config),
        }
    }

    pub fn run_session(
        &self,
        state: &mut LearnerState,
        policy: Policy,
        num_questions: usize,
        ctx: &SessionContext,
        rng: &mut dyn RngCore,
    ) -> Result<SessionRecord> {
        if num_questions == 0 {
            return Err(SimError::invalid("a session needs at least one question"));
        }

        let mut window = self.controller.window();
        let mut current = Difficulty::Medium;
        let mut responses = Vec::with_capacity(num_questions);
        let mut elapsed = 0.0;

        for question_index in 0..num_questions {
            if policy == Policy::Adaptive && question_index > 0 {
                let reference_time = self.pool.expected_time(current)?;
                current = self.controller.decide(&window, current, reference_time);
            }

            let item = self.pool.sample(current, rng)?;
            let answer = self.model.answer(item, state, rng);
            elapsed += answer.response_time;

            if policy == Policy::Adaptive {
                window.push(answer.correct, answer.response_time);
            }

            responses.push(QuestionResponse {
                session_id: ctx.session_id.clone(),
                learner_id: state.id.clone(),
                question_index,
                item_id: item.id,
                topic: item.topic,
                difficulty: item.difficulty,
                correct: answer.correct,
                response_time: answer.response_time,
                expected_time: item.expected_time,
                elapsed_in_session: elapsed,
            });
        }

        let summary = summarize(&responses, policy, ctx, &state.id);
        debug!(
            session_id = %summary.session_id,
            policy = %policy,
            accuracy = summary.accuracy,
            mastery_index = summary.mastery_index,
            difficulty_changes = summary.difficulty_change_count,
            ability = state.current_ability,
            "session finished"
        );

        Ok(SessionRecord { responses, summary })
    }
}

/// Difficulty-weighted accuracy in [0, 3]; 0 for an empty slice
pub fn mastery_index(responses: &[QuestionResponse]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    let weighted: u32 = responses
        .iter()
        .filter(|r| r.correct)
        .map(|r| u32::from(r.difficulty.numeric()))
        .sum();
    weighted as f64 / responses.len() as f64
}

/// Number of adjacent positions where the difficulty differs
pub fn count_difficulty_changes(sequence: &[Difficulty]) -> usize {
    sequence.windows(2).filter(|pair| pair[0] != pair[1]).count()
}

fn summarize(
    responses: &[QuestionResponse],
    policy: Policy,
    ctx: &SessionContext,
    learner_id: &str,
) -> SessionSummary {
    let n = responses.len().max(1) as f64;
    let correct = responses.iter().filter(|r| r.correct).count();
    let difficulty_sequence: Vec<Difficulty> = responses.iter().map(|r| r.difficulty).collect();

    SessionSummary {
        session_id: ctx.session_id.clone(),
        learner_id: learner_id.to_string(),
        policy,
        session_index: ctx.session_index,
        num_questions: responses.len(),
        accuracy: correct as f64 / n,
        mastery_index: mastery_index(responses),
        mean_response_time: responses.iter().map(|r| r.response_time).sum::<f64>() / n,
        avg_difficulty: difficulty_sequence
            .iter()
            .map(|d| f64::from(d.numeric()))
            .sum::<f64>()
            / n,
        avg_time_ratio: responses
            .iter()
            .map(|r| r.response_time / r.expected_time)
            .sum::<f64>()
            / n,
        difficulty_change_count: count_difficulty_changes(&difficulty_sequence),
        difficulty_sequence,
    }
}
