use crate::engines::generation::constraints::{ConstraintEngine, ConstraintState};
use crate::engines::generation::controller::{Controller, Observation, StepRecord, Trajectory};
use crate::error::{Result, SearchError};
use crate::types::TokenId;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A complete traversal and the steps that produced it.
#[derive(Debug, Clone)]
pub struct SampledSequence {
    pub tokens: Vec<TokenId>,
    pub trajectory: Trajectory,
    /// Number of trailing tokens appended by truncation filling
    pub filled: usize,
}

impl SampledSequence {
    pub fn log_prob(&self) -> f32 {
        self.trajectory.iter().map(|step| step.log_prob).sum()
    }
}

#[derive(Debug, Default)]
pub struct SampledBatch {
    pub sequences: Vec<SampledSequence>,
    /// Sequences that hit the length limit with open slots and were discarded
    pub invalid: usize,
    /// Dead ends still unresolved after the last restart round
    pub dead_ends: usize,
    /// Extra rounds spent resampling dead ends
    pub restarts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Closed,
    DeadEnd,
}

/// Draws batches of constrained traversals from the controller.
pub struct BatchSampler {
    engine: Arc<ConstraintEngine>,
    rng: StdRng,
}

impl BatchSampler {
    pub fn new(engine: Arc<ConstraintEngine>, seed: u64) -> Self {
        Self {
            engine,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn engine(&self) -> &Arc<ConstraintEngine> {
        &self.engine
    }

    pub fn sample<B: AutodiffBackend>(
        &mut self,
        controller: &Controller<B>,
        batch_size: usize,
    ) -> Result<SampledBatch> {
        let mut batch = SampledBatch::default();
        let mut pending = batch_size;

        loop {
            let (sequences, invalid, dead_ends) = self.sample_round(controller, pending)?;
            batch.sequences.extend(sequences);
            batch.invalid += invalid;
            pending = dead_ends;

            if pending == 0 {
                break;
            }
            if batch.restarts >= self.engine.max_restarts() {
                log::warn!(
                    "{} sequences still dead-ended after {} restart rounds",
                    pending,
                    batch.restarts
                );
                batch.dead_ends = pending;
                break;
            }
            log::debug!("Resampling {} dead-ended sequences", pending);
            batch.restarts += 1;
        }

        Ok(batch)
    }

    /// One batched pass; returns (completed, truncated-invalid count, dead-end count).
    fn sample_round<B: AutodiffBackend>(
        &mut self,
        controller: &Controller<B>,
        n: usize,
    ) -> Result<(Vec<SampledSequence>, usize, usize)> {
        if n == 0 {
            return Ok((Vec::new(), 0, 0));
        }
        let library = self.engine.library().clone();
        let n_tokens = library.size();
        let open_mask = vec![true; n_tokens];

        let mut session = controller.inference();
        let mut states: Vec<ConstraintState> = (0..n).map(|_| self.engine.new_state()).collect();
        let mut trajectories: Vec<Trajectory> = vec![Vec::new(); n];
        let mut status = vec![Status::Open; n];

        for _ in 0..self.engine.max_length() {
            if !status.contains(&Status::Open) {
                break;
            }

            let observations: Vec<Observation> =
                states.iter().map(|state| controller.observe(state)).collect();
            let mut masks: Vec<Option<Vec<bool>>> = Vec::with_capacity(n);
            for (state, row_status) in states.iter().zip(status.iter_mut()) {
                if *row_status != Status::Open {
                    masks.push(None);
                    continue;
                }
                match self.engine.next_mask(state) {
                    Ok(mask) => masks.push(Some(mask)),
                    Err(SearchError::ConstraintExhaustion { length, reason }) => {
                        log::trace!("Dead end at length {}: {}", length, reason);
                        *row_status = Status::DeadEnd;
                        masks.push(None);
                    }
                    Err(e) => return Err(e),
                }
            }

            let mask_refs: Vec<&[bool]> = masks
                .iter()
                .map(|mask| mask.as_deref().unwrap_or(&open_mask))
                .collect();
            let log_probs = session.step(&observations, &mask_refs)?;

            for i in 0..n {
                let Some(mask) = masks[i].take() else {
                    continue;
                };
                let action = self.draw(&log_probs[i], &mask);
                trajectories[i].push(StepRecord {
                    observation: observations[i],
                    mask,
                    action,
                    log_prob: log_probs[i][action],
                });
                states[i].push(action, library.arity(action));
                if states[i].is_complete() {
                    status[i] = Status::Closed;
                }
            }
        }

        let mut sequences = Vec::with_capacity(n);
        let mut invalid = 0;
        let mut dead_ends = 0;
        for ((state, trajectory), row_status) in states.into_iter().zip(trajectories).zip(status) {
            match row_status {
                Status::Closed => sequences.push(SampledSequence {
                    tokens: state.tokens().to_vec(),
                    trajectory,
                    filled: 0,
                }),
                Status::DeadEnd => dead_ends += 1,
                Status::Open => match self.fill(&state) {
                    Some((tokens, filled)) => sequences.push(SampledSequence {
                        tokens,
                        trajectory,
                        filled,
                    }),
                    None => invalid += 1,
                },
            }
        }

        Ok((sequences, invalid, dead_ends))
    }

    /// Inverse-CDF draw restricted to legal tokens.
    fn draw(&mut self, log_probs: &[f32], mask: &[bool]) -> TokenId {
        let weights: Vec<f64> = log_probs
            .iter()
            .zip(mask)
            .map(|(&lp, &allowed)| if allowed { (lp as f64).exp() } else { 0.0 })
            .collect();
        let total: f64 = weights.iter().sum();
        let legal_fallback = || mask.iter().rposition(|&allowed| allowed).unwrap_or(0);
        if !(total > 0.0) {
            return legal_fallback();
        }

        let mut target = self.rng.gen::<f64>() * total;
        for (id, &weight) in weights.iter().enumerate() {
            if weight > 0.0 {
                if target < weight {
                    return id;
                }
                target -= weight;
            }
        }
        legal_fallback()
    }

    /// Close a truncated traversal with the first input terminal, when enabled.
    fn fill(&self, state: &ConstraintState) -> Option<(Vec<TokenId>, usize)> {
        if !self.engine.fill_on_truncation() {
            return None;
        }
        let library = self.engine.library();
        let filler = library
            .inputs()
            .first()
            .or_else(|| library.terminals().first())
            .copied()?;
        let filled = state.open_slots();
        let mut tokens = state.tokens().to_vec();
        tokens.extend(std::iter::repeat(filler).take(filled));
        Some((tokens, filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConstraintsConfig, ControllerConfig};
    use crate::functions::{FunctionRegistry, Library, LibrarySpec};
    use crate::types::ExprNode;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray>;

    fn setup(config: ConstraintsConfig) -> (Controller<B>, BatchSampler) {
        let spec = LibrarySpec {
            function_set: vec!["add".into(), "mul".into(), "sin".into(), "exp".into(), "log".into()],
            n_inputs: 2,
            anchor_dims: vec![],
            protected: false,
        };
        let library = Arc::new(Library::build(&spec, &FunctionRegistry::new()).unwrap());
        let controller = Controller::<B>::new(
            &ControllerConfig::default(),
            library.size(),
            config.max_length,
            Default::default(),
        );
        let engine = Arc::new(ConstraintEngine::new(&config, library).unwrap());
        (controller, BatchSampler::new(engine, 7))
    }

    #[test]
    fn sampled_sequences_are_complete_and_legal() {
        let (controller, mut sampler) = setup(ConstraintsConfig {
            max_length: 12,
            min_length: 3,
            ..Default::default()
        });
        let batch = sampler.sample(&controller, 64).unwrap();
        assert_eq!(batch.sequences.len() + batch.invalid + batch.dead_ends, 64);

        let engine = sampler.engine().clone();
        let library = engine.library();
        for sequence in &batch.sequences {
            assert!(sequence.tokens.len() >= 3 && sequence.tokens.len() <= 12);
            assert!(ExprNode::from_prefix(&sequence.tokens, |id| library.arity(id)).is_some());
            assert!(engine.check_traversal(&sequence.tokens).is_ok());
            assert_eq!(sequence.trajectory.len(), sequence.tokens.len());
            assert!(sequence.log_prob().is_finite());
        }
    }

    #[test]
    fn truncation_without_arity_rule() {
        let config = ConstraintsConfig {
            max_length: 3,
            min_length: 1,
            enforce_arity: false,
            fill_on_truncation: true,
            ..Default::default()
        };
        let (controller, mut sampler) = setup(config);
        let batch = sampler.sample(&controller, 32).unwrap();
        let library = sampler.engine().library().clone();
        for sequence in &batch.sequences {
            assert!(ExprNode::from_prefix(&sequence.tokens, |id| library.arity(id)).is_some());
            assert_eq!(sequence.tokens.len(), sequence.trajectory.len() + sequence.filled);
        }
        assert_eq!(batch.invalid, 0);
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = BatchSampler::new(setup(ConstraintsConfig::default()).1.engine().clone(), 3);
        let mut b = BatchSampler::new(a.engine().clone(), 3);
        let log_probs = vec![(0.25f32).ln(); 4];
        let mask = vec![true, true, false, true];
        for _ in 0..20 {
            let x = a.draw(&log_probs, &mask);
            assert_eq!(x, b.draw(&log_probs, &mask));
            assert_ne!(x, 2);
        }
    }
}
