//! Common Types and Constants
//!
//! Shared data structures used across the simulation modules.

use std::fmt;

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Default number of responses kept in the controller window
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Accuracy strictly above which difficulty steps up
pub const DEFAULT_ACCURACY_THRESHOLD_HIGH: f64 = 0.80;

/// Accuracy strictly below which difficulty steps down
pub const DEFAULT_ACCURACY_THRESHOLD_LOW: f64 = 0.50;

/// Upper bound for learner ability
pub const DEFAULT_ABILITY_CEILING: f64 = 0.98;

/// Multiplier on the expected time used by the step-up rule
pub const DEFAULT_TIME_THRESHOLD_FACTOR: f64 = 1.0;

/// Highest attainable mastery index (all hard items correct)
pub const MAX_MASTERY_INDEX: f64 = 3.0;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

// ==================== Item Types ====================

/// Question difficulty level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" | "mid" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    /// Mastery weight: 1, 2, 3 for easy, medium, hard
    pub fn numeric(&self) -> u8 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }

    /// One level up, saturating at hard
    pub fn harder(&self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            _ => Self::Hard,
        }
    }

    /// One level down, saturating at easy
    pub fn easier(&self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            _ => Self::Easy,
        }
    }

    /// Typical expected answer time range in seconds
    pub fn expected_time_range(&self) -> (f64, f64) {
        match self {
            Self::Easy => (10.0, 20.0),
            Self::Medium => (20.0, 40.0),
            Self::Hard => (40.0, 60.0),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subject area of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    Math,
    Science,
    History,
    Literature,
    Geography,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Math,
        Topic::Science,
        Topic::History,
        Topic::Literature,
        Topic::Geography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Math => "Math",
            Self::Science => "Science",
            Self::History => "History",
            Self::Literature => "Literature",
            Self::Geography => "Geography",
        }
    }
}

/// A quiz item served from the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub difficulty: Difficulty,
    pub topic: Topic,
    /// Expected time to answer (seconds)
    pub expected_time: f64,
}

// ==================== Session Types ====================

/// Difficulty selection policy for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Adaptive,
    Fixed,
}

impl Policy {
    pub const ALL: [Policy; 2] = [Policy::Adaptive, Policy::Fixed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Fixed => "fixed",
        }
    }

    /// RNG stream used for this policy's draws
    pub fn stream(&self) -> u64 {
        match self {
            Self::Adaptive => 1,
            Self::Fixed => 2,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answered question, in session order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub session_id: String,
    pub learner_id: String,
    /// Zero-based position within the session
    pub question_index: usize,
    pub item_id: u32,
    pub topic: Topic,
    pub difficulty: Difficulty,
    pub correct: bool,
    /// Time taken for this answer (seconds)
    pub response_time: f64,
    /// Item's expected time (seconds)
    pub expected_time: f64,
    /// Cumulative session time including this answer (seconds)
    pub elapsed_in_session: f64,
}

/// Derived per-session metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub learner_id: String,
    pub policy: Policy,
    /// Zero-based ordinal of this session for the learner under this policy
    pub session_index: usize,
    pub num_questions: usize,
    /// Fraction correct [0, 1]
    pub accuracy: f64,
    /// Difficulty-weighted accuracy [0, 3]
    pub mastery_index: f64,
    /// Mean response time (seconds)
    pub mean_response_time: f64,
    /// Mean numeric difficulty [1, 3]
    pub avg_difficulty: f64,
    /// Mean of response_time / expected_time
    pub avg_time_ratio: f64,
    pub difficulty_change_count: usize,
    pub difficulty_sequence: Vec<Difficulty>,
}
