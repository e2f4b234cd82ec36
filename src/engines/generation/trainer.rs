//! Risk-seeking policy gradient.
//!
//! Only the top `ε` fraction of each batch contributes to the update, so the
//! controller is pushed toward its best-case rather than its average-case output.
//! Optionally the quantile is estimated over a memory of past samples, and a
//! supervised term on the best programs seen so far is added (priority queue training).

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Baseline, TrainingConfig};
use crate::engines::generation::controller::{read_floats, Controller, PolicyNetwork, Trajectory};
use crate::engines::generation::queues::{weighted_quantile, MemoryQueue, PriorityQueue};
use crate::error::{Result, SearchError};

/// Rewards are clipped to ±this before training.
pub const REWARD_CLIP: f64 = 1e6;

pub fn clip_reward(reward: f64) -> f64 {
    reward.clamp(-REWARD_CLIP, REWARD_CLIP)
}

/// Programs kept by the risk-seeking filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Batch indices, ascending
    pub indices: Vec<usize>,
    /// Lowest retained reward (R_ε)
    pub threshold: f64,
}

/// Keep exactly `ceil(ε·N)` programs with the highest rewards; ties go to the earlier program.
pub fn select_top_quantile(rewards: &[f64], epsilon: f64) -> Selection {
    let n = rewards.len();
    if n == 0 {
        return Selection {
            indices: Vec::new(),
            threshold: f64::NAN,
        };
    }
    let keep = if epsilon >= 1.0 {
        n
    } else {
        // Guard against ε·N landing a hair above an integer
        ((epsilon * n as f64 - 1e-9).ceil() as usize).clamp(1, n)
    };

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| rewards[b].total_cmp(&rewards[a]));
    order.truncate(keep);
    let threshold = order.last().map_or(f64::NAN, |&i| rewards[i]);
    order.sort_unstable();

    Selection {
        indices: order,
        threshold,
    }
}

/// Risk-seeking selection with the quantile taken over memory plus batch.
///
/// Memory samples carry their probability under the current policy; batch samples not
/// already in memory (`fresh`) share the remaining weight. Every batch program at or above
/// the quantile is kept. When none is, falls back to [`select_top_quantile`].
pub fn select_with_memory(
    memory_rewards: &[f64],
    memory_weights: &[f64],
    rewards: &[f64],
    fresh: &[bool],
    epsilon: f64,
) -> Selection {
    let memory_weight: f64 = memory_weights.iter().sum();
    let n_fresh = fresh.iter().filter(|&&f| f).count();
    let share = if n_fresh == 0 {
        0.0
    } else {
        ((1.0 - memory_weight) / n_fresh as f64).max(0.0)
    };

    let mut values = memory_rewards.to_vec();
    let mut weights = memory_weights.to_vec();
    for (&reward, _) in rewards.iter().zip(fresh).filter(|(_, is_fresh)| **is_fresh) {
        values.push(reward);
        weights.push(share);
    }

    let threshold = weighted_quantile(&values, &weights, 1.0 - epsilon);
    let indices: Vec<usize> = (0..rewards.len())
        .filter(|&i| rewards[i] >= threshold)
        .collect();
    if indices.is_empty() || !threshold.is_finite() {
        return select_top_quantile(rewards, epsilon);
    }
    Selection { indices, threshold }
}

/// Adam with optional gradient-norm clipping.
pub fn create_optimizer<B: AutodiffBackend>(
    config: &TrainingConfig,
) -> impl Optimizer<PolicyNetwork<B>, B> {
    AdamConfig::new()
        .with_grad_clipping(config.max_grad_norm.map(GradientClippingConfig::Norm))
        .init()
}

/// Exponentially weighted moving average used by the EWMA baselines.
#[derive(Debug, Clone, Default)]
pub struct Ewma {
    value: Option<f64>,
}

impl Ewma {
    pub fn update(&mut self, sample: f64, alpha: f64, jumpstart: bool) -> f64 {
        let previous = match self.value {
            Some(v) => v,
            None if jumpstart => sample,
            None => 0.0,
        };
        let next = alpha * sample + (1.0 - alpha) * previous;
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStep {
    pub loss: f64,
    /// Mean discounted entropy of the retained sequences
    pub entropy: f64,
    pub baseline: f64,
    pub threshold: f64,
    pub retained: usize,
    /// Total policy probability of the memory when the quantile used it
    pub memory_weight: Option<f64>,
}

pub struct Trainer {
    config: TrainingConfig,
    ewma: Ewma,
    priority_queue: Option<PriorityQueue>,
    memory: Option<MemoryQueue>,
    rng: StdRng,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            priority_queue: config.pqt.then(|| PriorityQueue::new(config.pqt_k)),
            memory: config.use_memory.then(|| MemoryQueue::new(config.memory_capacity)),
            rng: StdRng::seed_from_u64(config.seed),
            ewma: Ewma::default(),
            config,
        }
    }

    /// Reseed the priority queue sampler (independent runs).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn uses_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Add samples to the memory without training on them (warm start).
    pub fn remember(&mut self, trajectories: &[&Trajectory], rewards: &[f64]) {
        if let Some(memory) = self.memory.as_mut() {
            let clipped: Vec<f64> = rewards.iter().map(|&r| clip_reward(r)).collect();
            memory.push_batch(trajectories, &clipped);
        }
    }

    pub fn memory(&self) -> Option<&MemoryQueue> {
        self.memory.as_ref()
    }

    pub fn priority_queue(&self) -> Option<&PriorityQueue> {
        self.priority_queue.as_ref()
    }

    fn select<B: AutodiffBackend>(
        &self,
        controller: &Controller<B>,
        trajectories: &[&Trajectory],
        rewards: &[f64],
    ) -> Result<(Selection, Option<f64>)> {
        let memory = match self.memory.as_ref() {
            Some(memory) if !memory.is_empty() && self.config.epsilon < 1.0 => memory,
            _ => return Ok((select_top_quantile(rewards, self.config.epsilon), None)),
        };

        let (log_probs, _) = controller.replay(&memory.trajectories(), self.config.entropy_gamma)?;
        let weights: Vec<f64> = read_floats(log_probs)?
            .iter()
            .map(|&log_prob| (log_prob as f64).exp())
            .collect();
        let memory_weight: f64 = weights.iter().sum();
        let fresh: Vec<bool> = trajectories.iter().map(|t| !memory.contains(t)).collect();
        if !fresh.contains(&true) {
            log::warn!("No batch samples outside the memory; quantile uses memory only");
        }
        if self
            .config
            .memory_threshold
            .is_some_and(|limit| memory_weight > limit)
        {
            log::info!(
                "Memory carries {:.3} of the quantile weight ({} samples)",
                memory_weight,
                memory.len()
            );
        }

        let selection = select_with_memory(
            &memory.rewards(),
            &weights,
            rewards,
            &fresh,
            self.config.epsilon,
        );
        Ok((selection, Some(memory_weight)))
    }

    /// Baseline for this epoch; advances the EWMA state for the moving-average variants.
    pub fn baseline(&mut self, retained: &[f64], threshold: f64) -> f64 {
        let mean = retained.iter().sum::<f64>() / retained.len().max(1) as f64;
        let (alpha, jumpstart) = (self.config.alpha, self.config.b_jumpstart);
        match self.config.baseline {
            Baseline::RE => threshold,
            Baseline::EwmaR => self.ewma.update(mean, alpha, jumpstart),
            Baseline::EwmaRE => self.ewma.update(threshold, alpha, jumpstart),
            Baseline::Combined => threshold + self.ewma.update(mean - threshold, alpha, jumpstart),
        }
    }

    /// One policy-gradient update from a batch of trajectories and their rewards.
    pub fn step<B, O>(
        &mut self,
        controller: &mut Controller<B>,
        optimizer: &mut O,
        trajectories: &[&Trajectory],
        rewards: &[f64],
        epoch: usize,
    ) -> Result<TrainingStep>
    where
        B: AutodiffBackend,
        O: Optimizer<PolicyNetwork<B>, B>,
    {
        if trajectories.len() != rewards.len() {
            return Err(SearchError::Collaborator(format!(
                "{} trajectories for {} rewards",
                trajectories.len(),
                rewards.len()
            )));
        }

        let clipped: Vec<f64> = rewards.iter().map(|&r| clip_reward(r)).collect();
        let (selection, memory_weight) = self.select(controller, trajectories, &clipped)?;
        if selection.indices.is_empty() {
            return Err(SearchError::NumericInstability(
                "no programs retained for training".to_string(),
            ));
        }

        let retained: Vec<f64> = selection.indices.iter().map(|&i| clipped[i]).collect();
        let baseline = self.baseline(&retained, selection.threshold);
        let kept: Vec<&Trajectory> = selection.indices.iter().map(|&i| trajectories[i]).collect();

        let (log_probs, entropies) = controller.replay(&kept, self.config.entropy_gamma)?;
        let advantages: Vec<f32> = retained.iter().map(|r| (r - baseline) as f32).collect();
        let advantages = Tensor::<B, 1>::from_data(
            TensorData::new(advantages, [retained.len()]),
            controller.device(),
        );

        let policy_loss = (advantages * log_probs).mean().neg();
        let entropy = entropies.mean();
        let weight = self.config.entropy_weight_at(epoch) as f32;

        let pqt_loss = match self.priority_queue.as_mut() {
            Some(queue) => {
                for (&i, &reward) in selection.indices.iter().zip(&retained) {
                    queue.push(trajectories[i], reward);
                }
                let drawn: Vec<&Trajectory> = queue
                    .sample(self.config.pqt_batch_size, &mut self.rng)
                    .into_iter()
                    .map(|sample| &sample.trajectory)
                    .collect();
                if drawn.is_empty() {
                    None
                } else {
                    let (queue_log_probs, _) = controller.replay(&drawn, self.config.entropy_gamma)?;
                    Some(queue_log_probs.mean().neg().mul_scalar(self.config.pqt_weight as f32))
                }
            }
            None => None,
        };

        let entropy_bonus = entropy.clone().mul_scalar(weight);
        let loss = match pqt_loss {
            Some(pqt_loss) if self.config.pqt_use_pg => policy_loss - entropy_bonus + pqt_loss,
            Some(pqt_loss) => pqt_loss - entropy_bonus,
            None => policy_loss - entropy_bonus,
        };

        let loss_value = read_floats(loss.clone())?.first().copied().unwrap_or(f32::NAN) as f64;
        let entropy_value = read_floats(entropy)?.first().copied().unwrap_or(f32::NAN) as f64;
        if !loss_value.is_finite() {
            return Err(SearchError::NumericInstability(format!(
                "loss is {} at epoch {}",
                loss_value, epoch
            )));
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, controller.model());
        let model = optimizer.step(self.config.learning_rate, controller.model().clone(), grads);
        controller.set_model(model);

        if let Some(memory) = self.memory.as_mut() {
            memory.push_batch(&kept, &retained);
        }

        Ok(TrainingStep {
            loss: loss_value,
            entropy: entropy_value,
            baseline,
            threshold: selection.threshold,
            retained: retained.len(),
            memory_weight,
        })
    }
}
