//! Adaptive Difficulty Controller
//!
//! Maps a rolling window of recent answers to a difficulty decision.
//!
//! Rules, evaluated in order over the last `window_size` responses:
//! - accuracy > high AND mean time < reference time × factor -> step up
//! - accuracy < low -> step down
//! - otherwise hold
//!
//! Both thresholds are strict, so a window sitting exactly on 0.80 or 0.50
//! holds. Steps saturate at easy and hard. An empty window always holds,
//! which keeps the first question of every session at medium.
//!
//! The window is not cleared when difficulty changes, and its mean time is
//! compared against the reference of the current difficulty. Times recorded
//! at an easier level can therefore carry a learner up two steps on
//! consecutive questions (easy -> medium -> hard).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::Difficulty;

// ==================== Window ====================

/// A single observation kept in the window
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub correct: bool,
    /// Seconds
    pub response_time: f64,
}

/// Fixed-capacity window; pushing past capacity evicts the oldest entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceWindow {
    capacity: usize,
    entries: VecDeque<WindowEntry>,
}

impl PerformanceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, correct: bool, response_time: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(WindowEntry {
            correct,
            response_time,
        });
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fraction correct, `None` when empty
    pub fn accuracy(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let correct = self.entries.iter().filter(|e| e.correct).count();
        Some(correct as f64 / self.entries.len() as f64)
    }

    /// Mean response time, `None` when empty
    pub fn mean_response_time(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self.entries.iter().map(|e| e.response_time).sum();
        Some(total / self.entries.len() as f64)
    }
}

// ==================== Decision ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Increase,
    Decrease,
    Hold,
}

impl Decision {
    pub fn apply(self, current: Difficulty) -> Difficulty {
        match self {
            Self::Increase => current.harder(),
            Self::Decrease => current.easier(),
            Self::Hold => current,
        }
    }
}

// ==================== Controller ====================

#[derive(Clone, Debug)]
pub struct DifficultyController {
    accuracy_threshold_high: f64,
    accuracy_threshold_low: f64,
    time_threshold_factor: f64,
    window_size: usize,
}

impl DifficultyController {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            accuracy_threshold_high: config.accuracy_threshold_high,
            accuracy_threshold_low: config.accuracy_threshold_low,
            time_threshold_factor: config.time_threshold_factor,
            window_size: config.window_size,
        }
    }

    /// Fresh window sized for this controller
    pub fn window(&self) -> PerformanceWindow {
        PerformanceWindow::new(self.window_size)
    }

    /// Three-state decision for the window
    ///
    /// `reference_time` is the expected answer time at the current
    /// difficulty.
    pub fn evaluate(&self, window: &PerformanceWindow, reference_time: f64) -> Decision {
        let (Some(accuracy), Some(avg_time)) = (window.accuracy(), window.mean_response_time())
        else {
            return Decision::Hold;
        };

        if accuracy > self.accuracy_threshold_high
            && avg_time < reference_time * self.time_threshold_factor
        {
            Decision::Increase
        } else if accuracy < self.accuracy_threshold_low {
            Decision::Decrease
        } else {
            Decision::Hold
        }
    }

    pub fn decide(
        &self,
        window: &PerformanceWindow,
        current: Difficulty,
        reference_time: f64,
    ) -> Difficulty {
        self.evaluate(window, reference_time).apply(current)
    }
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
