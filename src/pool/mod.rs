//! Item Pool
//!
//! The simulator only needs three things from question content: an item at
//! a requested difficulty, any item, and the expected answer time for a
//! difficulty. `ItemPool` captures that contract; `QuestionBank` is the
//! in-memory implementation, either generated synthetically from a seed or
//! built from externally supplied items.
//!
//! A pool never substitutes another difficulty when one is missing: the
//! request fails with `PoolExhausted`.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::types::{Difficulty, Item, Topic};

// ==================== Interface ====================

/// Source of quiz items for the session runner
pub trait ItemPool {
    /// Draw an item of exactly this difficulty
    fn sample(&self, difficulty: Difficulty, rng: &mut dyn RngCore) -> Result<&Item>;

    /// Draw an item of any difficulty
    fn sample_any(&self, rng: &mut dyn RngCore) -> Result<&Item>;

    /// Mean expected answer time of items at this difficulty (seconds)
    fn expected_time(&self, difficulty: Difficulty) -> Result<f64>;
}

// ==================== Data Structures ====================

/// Pool composition summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolStatistics {
    pub total_items: usize,
    pub by_difficulty: BTreeMap<Difficulty, usize>,
    pub by_topic: BTreeMap<Topic, usize>,
    pub avg_expected_time: BTreeMap<Difficulty, f64>,
}

/// In-memory question bank
#[derive(Clone, Debug)]
pub struct QuestionBank {
    items: Vec<Item>,
    /// Item indices per difficulty, in easy/medium/hard order
    by_difficulty: [Vec<usize>; 3],
    mean_expected_time: [Option<f64>; 3],
}

fn slot(difficulty: Difficulty) -> usize {
    (difficulty.numeric() - 1) as usize
}

impl QuestionBank {
    /// Build a bank from supplied items
    pub fn from_items(items: Vec<Item>) -> Result<Self> {
        if let Some(bad) = items
            .iter()
            .find(|item| !(item.expected_time.is_finite() && item.expected_time > 0.0))
        {
            return Err(SimError::invalid(format!(
                "item {} has non-positive expected_time {}",
                bad.id, bad.expected_time
            )));
        }

        let mut by_difficulty: [Vec<usize>; 3] = Default::default();
        for (index, item) in items.iter().enumerate() {
            by_difficulty[slot(item.difficulty)].push(index);
        }

        let mut mean_expected_time = [None; 3];
        for (bucket, mean) in by_difficulty.iter().zip(mean_expected_time.iter_mut()) {
            if !bucket.is_empty() {
                let total: f64 = bucket.iter().map(|&i| items[i].expected_time).sum();
                *mean = Some(total / bucket.len() as f64);
            }
        }

        Ok(Self {
            items,
            by_difficulty,
            mean_expected_time,
        })
    }

    /// Generate a synthetic bank
    ///
    /// Difficulties cycle easy, medium, hard so the bank stays balanced;
    /// topics are drawn uniformly; expected time is uniform within the
    /// difficulty's range.
    pub fn generate(num_questions: usize, seed: u64) -> Result<Self> {
        if num_questions < Difficulty::ALL.len() {
            return Err(SimError::invalid(format!(
                "a synthetic bank needs at least {} questions, got {num_questions}",
                Difficulty::ALL.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let items = (0..num_questions)
            .map(|i| {
                let difficulty = Difficulty::ALL[i % Difficulty::ALL.len()];
                let topic = Topic::ALL[rng.gen_range(0..Topic::ALL.len())];
                let (low, high) = difficulty.expected_time_range();
                Item {
                    id: (i + 1) as u32,
                    difficulty,
                    topic,
                    expected_time: rng.gen_range(low..high),
                }
            })
            .collect();

        Self::from_items(items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: u32) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items_by_difficulty(&self, difficulty: Difficulty) -> impl Iterator<Item = &Item> {
        self.by_difficulty[slot(difficulty)]
            .iter()
            .map(move |&i| &self.items[i])
    }

    pub fn statistics(&self) -> PoolStatistics {
        let mut by_difficulty = BTreeMap::new();
        let mut by_topic = BTreeMap::new();
        for item in &self.items {
            *by_difficulty.entry(item.difficulty).or_insert(0) += 1;
            *by_topic.entry(item.topic).or_insert(0) += 1;
        }

        let avg_expected_time = Difficulty::ALL
            .iter()
            .filter_map(|&d| self.mean_expected_time[slot(d)].map(|mean| (d, mean)))
            .collect();

        PoolStatistics {
            total_items: self.items.len(),
            by_difficulty,
            by_topic,
            avg_expected_time,
        }
    }
}

impl ItemPool for QuestionBank {
    fn sample(&self, difficulty: Difficulty, rng: &mut dyn RngCore) -> Result<&Item> {
        let bucket = &self.by_difficulty[slot(difficulty)];
        if bucket.is_empty() {
            return Err(SimError::PoolExhausted(difficulty));
        }
        let index = bucket[rng.gen_range(0..bucket.len())];
        Ok(&self.items[index])
    }

    fn sample_any(&self, rng: &mut dyn RngCore) -> Result<&Item> {
        if self.items.is_empty() {
            return Err(SimError::EmptyPool);
        }
        Ok(&self.items[rng.gen_range(0..self.items.len())])
    }

    fn expected_time(&self, difficulty: Difficulty) -> Result<f64> {
        self.mean_expected_time[slot(difficulty)].ok_or(SimError::PoolExhausted(difficulty))
    }
}
