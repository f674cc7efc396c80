//! Engine and experiment configuration
//!
//! `EngineOptions` carries optional overrides; `EngineConfig::new` resolves
//! them to defaults and rejects invalid values instead of clamping.
//! `SimulationConfig` sizes an experiment run and can be read from the
//! environment.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::types::{
    DEFAULT_ABILITY_CEILING, DEFAULT_ACCURACY_THRESHOLD_HIGH, DEFAULT_ACCURACY_THRESHOLD_LOW,
    DEFAULT_TIME_THRESHOLD_FACTOR, DEFAULT_WINDOW_SIZE,
};

/// Optional overrides for the engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Responses kept in the sliding window (default: 5)
    pub window_size: Option<usize>,
    /// Step-up accuracy threshold, strict (default: 0.80)
    pub accuracy_threshold_high: Option<f64>,
    /// Step-down accuracy threshold, strict (default: 0.50)
    pub accuracy_threshold_low: Option<f64>,
    /// Learner ability upper bound (default: 0.98)
    pub ability_ceiling: Option<f64>,
    /// Scale on the expected time for the step-up rule (default: 1.0)
    pub time_threshold_factor: Option<f64>,
}

/// Validated engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub window_size: usize,
    pub accuracy_threshold_high: f64,
    pub accuracy_threshold_low: f64,
    pub ability_ceiling: f64,
    pub time_threshold_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            accuracy_threshold_high: DEFAULT_ACCURACY_THRESHOLD_HIGH,
            accuracy_threshold_low: DEFAULT_ACCURACY_THRESHOLD_LOW,
            ability_ceiling: DEFAULT_ABILITY_CEILING,
            time_threshold_factor: DEFAULT_TIME_THRESHOLD_FACTOR,
        }
    }
}

impl EngineConfig {
    pub fn new(options: EngineOptions) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            window_size: options.window_size.unwrap_or(defaults.window_size),
            accuracy_threshold_high: options
                .accuracy_threshold_high
                .unwrap_or(defaults.accuracy_threshold_high),
            accuracy_threshold_low: options
                .accuracy_threshold_low
                .unwrap_or(defaults.accuracy_threshold_low),
            ability_ceiling: options.ability_ceiling.unwrap_or(defaults.ability_ceiling),
            time_threshold_factor: options
                .time_threshold_factor
                .unwrap_or(defaults.time_threshold_factor),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(SimError::invalid("window_size must be at least 1"));
        }
        let high = self.accuracy_threshold_high;
        let low = self.accuracy_threshold_low;
        if !(0.0..=1.0).contains(&high) {
            return Err(SimError::invalid(format!(
                "accuracy_threshold_high {high} outside [0, 1]"
            )));
        }
        if !(0.0..=1.0).contains(&low) {
            return Err(SimError::invalid(format!(
                "accuracy_threshold_low {low} outside [0, 1]"
            )));
        }
        if low >= high {
            return Err(SimError::invalid(format!(
                "accuracy_threshold_low {low} must be below accuracy_threshold_high {high}"
            )));
        }
        if !(self.ability_ceiling > 0.0 && self.ability_ceiling <= 1.0) {
            return Err(SimError::invalid(format!(
                "ability_ceiling {} outside (0, 1]",
                self.ability_ceiling
            )));
        }
        if !(self.time_threshold_factor.is_finite() && self.time_threshold_factor > 0.0) {
            return Err(SimError::invalid(format!(
                "time_threshold_factor {} must be positive",
                self.time_threshold_factor
            )));
        }
        Ok(())
    }
}

/// Size and seeding of one experiment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_learners: usize,
    pub sessions_per_learner: usize,
    pub questions_per_session: usize,
    pub pool_size: usize,
    pub base_seed: u64,
    pub parallel: bool,
    /// `EnvFilter` directive for `logging::init_for`; the library itself
    /// never reads it
    pub log_level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_learners: 15,
            sessions_per_learner: 5,
            questions_per_session: 20,
            pool_size: 100,
            base_seed: 42,
            parallel: true,
            log_level: "info".to_string(),
        }
    }
}

impl SimulationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let num_learners = env_parse("QUIZ_SIM_LEARNERS").unwrap_or(defaults.num_learners);
        let sessions_per_learner =
            env_parse("QUIZ_SIM_SESSIONS").unwrap_or(defaults.sessions_per_learner);
        let questions_per_session =
            env_parse("QUIZ_SIM_QUESTIONS").unwrap_or(defaults.questions_per_session);
        let pool_size = env_parse("QUIZ_SIM_POOL_SIZE").unwrap_or(defaults.pool_size);
        let base_seed = env_parse("QUIZ_SIM_SEED").unwrap_or(defaults.base_seed);
        let parallel = std::env::var("QUIZ_SIM_PARALLEL")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.parallel);
        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);

        Self {
            num_learners,
            sessions_per_learner,
            questions_per_session,
            pool_size,
            base_seed,
            parallel,
            log_level,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_learners == 0 {
            return Err(SimError::invalid("num_learners must be at least 1"));
        }
        if self.sessions_per_learner == 0 {
            return Err(SimError::invalid("sessions_per_learner must be at least 1"));
        }
        if self.questions_per_session == 0 {
            return Err(SimError::invalid("questions_per_session must be at least 1"));
        }
        if self.pool_size < 3 {
            return Err(SimError::invalid(
                "pool_size must be at least 3 to cover every difficulty",
            ));
        }
        Ok(())
    }
}

/// Unset or unparsable variables fall back to the default; the latter is logged
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %value, "ignoring unparsable environment value");
            None
        }
    }
}
