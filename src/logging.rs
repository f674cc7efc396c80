//! Tracing setup for simulation runs
//!
//! - stdout fmt layer filtered by `EnvFilter` (level from `SimulationConfig`)
//! - optional daily-rolling file under `QUIZ_SIM_LOG_DIR` when
//!   `QUIZ_SIM_FILE_LOGS` is set, so long sweeps keep a record
//! - thread ids on every line: population runs fan out over rayon workers
//!
//! Events inside `run_experiment` carry the experiment span (seed and run
//! size); events from a learner's sessions also carry the learner span.

use tracing::{info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SimulationConfig;

const LOG_FILE_PREFIX: &str = "quiz-sim.log";

/// Keeps the non-blocking file writer flushing; drop it at the end of the run
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

pub fn file_logging_enabled() -> bool {
    std::env::var("QUIZ_SIM_FILE_LOGS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Installs the global subscriber
///
/// Only the first call in a process installs anything; later calls return
/// `None`. An unparsable level falls back to `info`.
pub fn init_tracing(log_level: &str) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true).with_thread_ids(true);

    let (file_layer, guard) = match file_writer() {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok()?;

    guard.map(|guard| FileLogGuard { _guard: guard })
}

/// `init_tracing` at the run's configured `log_level`
pub fn init_for(sim: &SimulationConfig) -> Option<FileLogGuard> {
    init_tracing(&sim.log_level)
}

/// Root span for one experiment
pub fn experiment_span(sim: &SimulationConfig) -> Span {
    info_span!(
        "experiment",
        seed = sim.base_seed,
        learners = sim.num_learners,
        sessions = sim.sessions_per_learner,
        questions = sim.questions_per_session,
        parallel = sim.parallel,
    )
}

fn file_writer() -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if !file_logging_enabled() {
        return None;
    }
    let log_dir = std::env::var("QUIZ_SIM_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        eprintln!("failed to create log directory {log_dir}: {err}");
        return None;
    }
    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_span_carries_run_fields() {
        let subscriber = tracing_subscriber::registry();
        tracing::subscriber::with_default(subscriber, || {
            let span = experiment_span(&SimulationConfig::default());
            let meta = span.metadata().unwrap();
            assert_eq!(meta.name(), "experiment");
            for field in ["seed", "learners", "sessions", "questions", "parallel"] {
                assert!(meta.fields().field(field).is_some(), "missing {field}");
            }
        });
    }

    #[test]
    fn test_file_logging_disabled_by_default() {
        if std::env::var("QUIZ_SIM_FILE_LOGS").is_err() {
            assert!(!file_logging_enabled());
        }
    }
}
