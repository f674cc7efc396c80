//! # danci-quiz-sim - adaptive quiz difficulty simulator
//!
//! Simulates synthetic learners answering quizzes under two policies and
//! compares the outcomes statistically:
//!
//! - **Adaptive** - a rolling-window controller steps difficulty up after
//!   accurate, fast answers and down after inaccurate ones
//! - **Fixed** - every question at medium difficulty
//!
//! ## Design
//!
//! - **Deterministic** - every draw comes from a seeded `ChaCha8Rng`; the same
//!   seed reproduces the same responses, serially or on rayon
//! - **Caller-owned state** - learners are plain values, cloned per policy
//! - **Flagged, not failed** - statistics that need more data are recorded as
//!   issues on the report instead of aborting the comparison
//!
//! ## Modules
//!
//! - [`pool`] - item pool trait and the synthetic question bank
//! - [`controller`] - performance window and difficulty decisions
//! - [`learner`] - learner state, response model, population generator
//! - [`session`] - one quiz session under one policy
//! - [`population`] - learners × sessions × policies
//! - [`stats`] - descriptive stats, Welch t-test, Cohen's d, learning gain
//! - [`experiment`] - everything above from a `SimulationConfig`
//! - [`config`], [`error`], [`logging`], [`sanitize`], [`types`]
//!
//! ## Example
//!
//! ```rust
//! use danci_quiz_sim::{run_experiment, EngineConfig, SimulationConfig};
//!
//! let sim = SimulationConfig {
//!     num_learners: 3,
//!     sessions_per_learner: 2,
//!     questions_per_session: 8,
//!     parallel: false,
//!     ..SimulationConfig::default()
//! };
//! let outcome = run_experiment(&sim, &EngineConfig::default()).unwrap();
//! assert_eq!(outcome.results.summaries.len(), 3 * 2 * 2);
//! println!("{}", outcome.report);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod learner;
pub mod logging;
pub mod pool;
pub mod population;
pub mod sanitize;
pub mod session;
pub mod stats;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use config::{EngineConfig, EngineOptions, SimulationConfig};
pub use controller::{Decision, DifficultyController, PerformanceWindow};
pub use error::{Result, SimError};
pub use experiment::{run_experiment, ExperimentOutcome};
pub use learner::{AbilityTier, Answer, LearnerModel, LearnerPopulation, LearnerState};
pub use pool::{ItemPool, QuestionBank};
pub use population::{ExperimentResults, PolicyOverview, PopulationRunner};
pub use session::{SessionContext, SessionRecord, SessionRunner};
pub use stats::{compare, compare_summaries, ComparisonReport, EffectMagnitude, Metric};
