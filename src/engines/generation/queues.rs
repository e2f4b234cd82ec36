//! Sample stores that outlive a single batch.
//!
//! [`PriorityQueue`] keeps the best distinct trajectories seen so far for priority
//! queue training. [`MemoryQueue`] remembers recent retained samples so the risk-seeking
//! quantile can be estimated from more than one batch.

use crate::engines::generation::controller::Trajectory;
use crate::types::TokenId;
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// Identity of a sampled sequence: its emitted tokens.
pub fn trajectory_key(trajectory: &Trajectory) -> Vec<TokenId> {
    trajectory.iter().map(|record| record.action).collect()
}

#[derive(Debug, Clone)]
pub struct QueuedSample {
    pub trajectory: Trajectory,
    pub reward: f64,
}

/// Top-`capacity` distinct trajectories by reward, best first.
#[derive(Debug, Clone)]
pub struct PriorityQueue {
    samples: Vec<QueuedSample>,
    keys: HashSet<Vec<TokenId>>,
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity + 1),
            keys: HashSet::new(),
            capacity,
        }
    }

    /// Offer a sample; returns whether it was kept.
    pub fn push(&mut self, trajectory: &Trajectory, reward: f64) -> bool {
        let key = trajectory_key(trajectory);
        if self.capacity == 0 || !reward.is_finite() || self.keys.contains(&key) {
            return false;
        }
        if self.samples.len() >= self.capacity
            && self.samples.last().is_some_and(|worst| reward <= worst.reward)
        {
            return false;
        }

        self.samples.push(QueuedSample {
            trajectory: trajectory.clone(),
            reward,
        });
        self.keys.insert(key);
        self.samples.sort_by(|a, b| b.reward.total_cmp(&a.reward));
        while self.samples.len() > self.capacity {
            if let Some(removed) = self.samples.pop() {
                self.keys.remove(&trajectory_key(&removed.trajectory));
            }
        }
        true
    }

    /// Draw `n` samples uniformly with replacement.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<&QueuedSample> {
        if self.samples.is_empty() {
            return Vec::new();
        }
        (0..n)
            .map(|_| &self.samples[rng.gen_range(0..self.samples.len())])
            .collect()
    }

    pub fn samples(&self) -> &[QueuedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// First-in first-out store of distinct recent samples.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    samples: VecDeque<QueuedSample>,
    keys: HashSet<Vec<TokenId>>,
    capacity: usize,
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            keys: HashSet::new(),
            capacity,
        }
    }

    /// Append the samples not already stored, dropping the oldest past capacity.
    pub fn push_batch(&mut self, trajectories: &[&Trajectory], rewards: &[f64]) {
        for (trajectory, &reward) in trajectories.iter().zip(rewards) {
            let key = trajectory_key(trajectory);
            if self.capacity == 0 || !reward.is_finite() || self.keys.contains(&key) {
                continue;
            }
            if self.samples.len() >= self.capacity {
                if let Some(oldest) = self.samples.pop_front() {
                    self.keys.remove(&trajectory_key(&oldest.trajectory));
                }
            }
            self.keys.insert(key);
            self.samples.push_back(QueuedSample {
                trajectory: (*trajectory).clone(),
                reward,
            });
        }
    }

    pub fn contains(&self, trajectory: &Trajectory) -> bool {
        self.keys.contains(&trajectory_key(trajectory))
    }

    pub fn trajectories(&self) -> Vec<&Trajectory> {
        self.samples.iter().map(|s| &s.trajectory).collect()
    }

    pub fn rewards(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.reward).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Smallest value whose cumulative normalized weight reaches `q`.
pub fn weighted_quantile(values: &[f64], weights: &[f64], q: f64) -> f64 {
    let total: f64 = weights.iter().filter(|w| w.is_finite()).map(|w| w.max(0.0)).sum();
    if values.is_empty() || values.len() != weights.len() || !(total > 0.0) {
        return f64::NAN;
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut cumulative = 0.0;
    for &i in &order {
        let weight = weights[i];
        if weight.is_finite() {
            cumulative += weight.max(0.0) / total;
        }
        if cumulative >= q - 1e-12 {
            return values[i];
        }
    }
    order.last().map_or(f64::NAN, |&i| values[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::controller::{Observation, StepRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trajectory(actions: &[TokenId]) -> Trajectory {
        actions
            .iter()
            .map(|&action| StepRecord {
                observation: Observation {
                    action: 0,
                    parent: 0,
                    sibling: 0,
                    open: 1.0,
                },
                mask: vec![true; 4],
                action,
                log_prob: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_priority_queue_keeps_best_distinct() {
        let mut queue = PriorityQueue::new(2);
        assert!(queue.push(&trajectory(&[0]), 0.3));
        assert!(queue.push(&trajectory(&[1]), 0.9));
        assert!(!queue.push(&trajectory(&[1]), 0.95));
        assert!(queue.push(&trajectory(&[2]), 0.5));
        assert!(!queue.push(&trajectory(&[3]), 0.1));

        let rewards: Vec<f64> = queue.samples().iter().map(|s| s.reward).collect();
        assert_eq!(rewards, vec![0.9, 0.5]);
        // The evicted sequence can come back
        assert!(queue.push(&trajectory(&[0]), 0.7));

        let mut rng = StdRng::seed_from_u64(3);
        let drawn = queue.sample(5, &mut rng);
        assert_eq!(drawn.len(), 5);
        assert!(drawn.iter().all(|s| s.reward >= 0.7));
    }

    #[test]
    fn test_memory_queue_is_fifo_and_unique() {
        let mut memory = MemoryQueue::new(3);
        let (a, b, c, d) = (trajectory(&[0]), trajectory(&[1]), trajectory(&[2]), trajectory(&[3]));
        memory.push_batch(&[&a, &b, &a], &[0.1, 0.2, 0.3]);
        assert_eq!(memory.rewards(), vec![0.1, 0.2]);

        memory.push_batch(&[&c, &d], &[0.3, 0.4]);
        assert_eq!(memory.rewards(), vec![0.2, 0.3, 0.4]);
        assert!(!memory.contains(&a));
        assert!(memory.contains(&d));
    }

    #[test]
    fn test_weighted_quantile() {
        let values = [1.0, 4.0, 2.0, 3.0];
        assert_eq!(weighted_quantile(&values, &[1.0; 4], 0.5), 2.0);
        assert_eq!(weighted_quantile(&values, &[1.0; 4], 0.75), 3.0);
        assert_eq!(weighted_quantile(&values, &[1.0; 4], 1.0), 4.0);
        // Heavy weight on the largest value pulls the quantile up
        assert_eq!(weighted_quantile(&values, &[0.1, 5.0, 0.1, 0.1], 0.5), 4.0);
        assert!(weighted_quantile(&values, &[0.0; 4], 0.5).is_nan());
    }
}
