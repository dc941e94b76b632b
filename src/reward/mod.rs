//! Reward accumulation and one-shot reward triggers

pub mod triggers;

pub use triggers::{CommandDispatchReward, ContactReward};

use ahash::AHashMap;

use crate::core::types::RewardDimension;

/// Sparse per-tick reward vector: dimension index -> accumulated scalar.
///
/// Producers only ever add; read-and-clear belongs to whoever drives the
/// reward aggregate each tick.
#[derive(Debug, Clone, Default)]
pub struct RewardAccumulator {
    values: AHashMap<RewardDimension, f32>,
}

impl RewardAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dimension: RewardDimension, amount: f32) {
        *self.values.entry(dimension).or_insert(0.0) += amount;
    }

    pub fn get(&self, dimension: RewardDimension) -> f32 {
        self.values.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take everything accumulated so far, sorted by dimension.
    pub fn drain(&mut self) -> Vec<(RewardDimension, f32)> {
        let mut drained: Vec<_> = self.values.drain().collect();
        drained.sort_by_key(|(dimension, _)| *dimension);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_dimension_accumulates() {
        let mut accumulator = RewardAccumulator::new();
        accumulator.add(0, 1.5);
        accumulator.add(0, 2.5);
        accumulator.add(3, -1.0);

        assert_eq!(accumulator.get(0), 4.0);
        assert_eq!(accumulator.drain(), vec![(0, 4.0), (3, -1.0)]);
        assert!(accumulator.is_empty());
    }
}
