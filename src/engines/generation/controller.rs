//! Autoregressive token policy.
//!
//! An LSTM cell reads embeddings of the previous token, the parent and the left
//! sibling of the slot being filled, plus the fraction of open slots, and emits
//! logits over the vocabulary. Sampling runs on the inner (non-autodiff) backend;
//! training replays the recorded observations with autodiff.

use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::backend::AutodiffBackend;

use crate::config::ControllerConfig;
use crate::engines::generation::constraints::ConstraintState;
use crate::error::{Result, SearchError};
use crate::types::TokenId;

/// Additive logit bias of illegal tokens.
const MASK_BIAS: f32 = -1e9;

#[derive(Config, Debug)]
pub struct PolicyNetworkConfig {
    /// Vocabulary size; embeddings get one extra "empty" index
    pub n_tokens: usize,
    #[config(default = 32)]
    pub num_units: usize,
    #[config(default = 8)]
    pub embedding_size: usize,
}

#[derive(Module, Debug)]
pub struct PolicyNetwork<B: Backend> {
    action_embed: Embedding<B>,
    parent_embed: Embedding<B>,
    sibling_embed: Embedding<B>,
    /// Input to gates: 3 * embedding_size + 1 -> 4 * num_units
    input_gates: Linear<B>,
    /// Recurrent gates: num_units -> 4 * num_units
    hidden_gates: Linear<B>,
    output: Linear<B>,
}

impl PolicyNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PolicyNetwork<B> {
        let input_size = 3 * self.embedding_size + 1;
        PolicyNetwork {
            action_embed: EmbeddingConfig::new(self.n_tokens + 1, self.embedding_size).init(device),
            parent_embed: EmbeddingConfig::new(self.n_tokens + 1, self.embedding_size).init(device),
            sibling_embed: EmbeddingConfig::new(self.n_tokens + 1, self.embedding_size).init(device),
            input_gates: LinearConfig::new(input_size, 4 * self.num_units).init(device),
            hidden_gates: LinearConfig::new(self.num_units, 4 * self.num_units)
                .with_bias(false)
                .init(device),
            output: LinearConfig::new(self.num_units, self.n_tokens).init(device),
        }
    }
}

pub struct LstmState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell: Tensor<B, 2>,
}

impl<B: Backend> LstmState<B> {
    pub fn zeros(batch: usize, num_units: usize, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros([batch, num_units], device),
            cell: Tensor::zeros([batch, num_units], device),
        }
    }
}

/// Batched observation tensors for one generation step.
pub struct StepInput<B: Backend> {
    pub actions: Tensor<B, 2, Int>,
    pub parents: Tensor<B, 2, Int>,
    pub siblings: Tensor<B, 2, Int>,
    pub open: Tensor<B, 2>,
}

impl<B: Backend> PolicyNetwork<B> {
    /// One LSTM step for every row of the batch.
    ///
    /// Returns `[batch, n_tokens]` logits and the next recurrent state.
    pub fn step(&self, input: StepInput<B>, state: LstmState<B>) -> (Tensor<B, 2>, LstmState<B>) {
        let [batch, units] = state.hidden.dims();

        let embed = |embedding: &Embedding<B>, ids: Tensor<B, 2, Int>| {
            let out = embedding.forward(ids); // [batch, 1, E]
            let size = out.dims()[2];
            out.reshape([batch, size])
        };
        let x = Tensor::cat(
            vec![
                embed(&self.action_embed, input.actions),
                embed(&self.parent_embed, input.parents),
                embed(&self.sibling_embed, input.siblings),
                input.open,
            ],
            1,
        );

        let gates = self.input_gates.forward(x) + self.hidden_gates.forward(state.hidden);
        let gate = |k: usize| gates.clone().narrow(1, k * units, units);
        let input_gate = activation::sigmoid(gate(0));
        let forget_gate = activation::sigmoid(gate(1));
        let candidate = activation::tanh(gate(2));
        let output_gate = activation::sigmoid(gate(3));

        let cell = forget_gate * state.cell + input_gate * candidate;
        let hidden = output_gate * activation::tanh(cell.clone());
        let logits = self.output.forward(hidden.clone());

        (logits, LstmState { hidden, cell })
    }
}

/// Log-softmax over legal tokens; illegal entries get probability exactly zero.
pub fn masked_log_probs<B: Backend>(logits: Tensor<B, 2>, bias: Tensor<B, 2>) -> Tensor<B, 2> {
    activation::log_softmax(logits + bias, 1)
}

/// Controller inputs derived from a constraint state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub action: usize,
    pub parent: usize,
    pub sibling: usize,
    pub open: f32,
}

/// One emitted token with the observation and mask it was drawn under.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub observation: Observation,
    pub mask: Vec<bool>,
    pub action: TokenId,
    pub log_prob: f32,
}

pub type Trajectory = Vec<StepRecord>;

fn step_input<B: Backend>(observations: &[Observation], device: &B::Device) -> StepInput<B> {
    let n = observations.len();
    let ids = |f: fn(&Observation) -> usize| {
        let data: Vec<i32> = observations.iter().map(|o| f(o) as i32).collect();
        Tensor::<B, 2, Int>::from_data(TensorData::new(data, [n, 1]), device)
    };
    let open: Vec<f32> = observations.iter().map(|o| o.open).collect();
    StepInput {
        actions: ids(|o| o.action),
        parents: ids(|o| o.parent),
        siblings: ids(|o| o.sibling),
        open: Tensor::from_data(TensorData::new(open, [n, 1]), device),
    }
}

fn mask_bias<B: Backend>(masks: &[&[bool]], n_tokens: usize, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = masks
        .iter()
        .flat_map(|mask| mask.iter().map(|&allowed| if allowed { 0.0 } else { MASK_BIAS }))
        .collect();
    Tensor::from_data(TensorData::new(data, [masks.len(), n_tokens]), device)
}

pub(crate) fn read_floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| SearchError::Collaborator(format!("Failed to read tensor data: {:?}", e)))
}

/// Trainable policy plus the bookkeeping needed to drive it.
pub struct Controller<B: AutodiffBackend> {
    model: PolicyNetwork<B>,
    device: B::Device,
    n_tokens: usize,
    num_units: usize,
    max_length: usize,
}

impl<B: AutodiffBackend> Controller<B> {
    pub fn new(
        config: &ControllerConfig,
        n_tokens: usize,
        max_length: usize,
        device: B::Device,
    ) -> Self {
        let model = PolicyNetworkConfig::new(n_tokens)
            .with_num_units(config.num_units)
            .with_embedding_size(config.embedding_size)
            .init(&device);
        Self {
            model,
            device,
            n_tokens,
            num_units: config.num_units,
            max_length,
        }
    }

    pub fn model(&self) -> &PolicyNetwork<B> {
        &self.model
    }

    pub fn set_model(&mut self, model: PolicyNetwork<B>) {
        self.model = model;
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn n_tokens(&self) -> usize {
        self.n_tokens
    }

    /// Index used for "no token" in the action, parent and sibling inputs.
    pub fn empty_index(&self) -> usize {
        self.n_tokens
    }

    pub fn observe(&self, state: &ConstraintState) -> Observation {
        Observation {
            action: state.tokens().last().copied().unwrap_or(self.n_tokens),
            parent: state.parent().unwrap_or(self.n_tokens),
            sibling: state.sibling().unwrap_or(self.n_tokens),
            open: state.open_slots() as f32 / self.max_length.max(1) as f32,
        }
    }

    /// Gradient-free stepping session; the recurrent state starts at zero.
    pub fn inference(&self) -> InferenceSession<B::InnerBackend> {
        InferenceSession {
            model: self.model.valid(),
            state: None,
            device: self.device.clone(),
            n_tokens: self.n_tokens,
            num_units: self.num_units,
        }
    }

    /// Differentiable replay of recorded trajectories.
    ///
    /// Returns per-trajectory summed log-probabilities and `Σ_t γ^t H_t` entropies.
    pub fn replay(
        &self,
        trajectories: &[&Trajectory],
        entropy_gamma: f64,
    ) -> Result<(Tensor<B, 1>, Tensor<B, 1>)> {
        let n = trajectories.len();
        let steps = trajectories.iter().map(|t| t.len()).max().unwrap_or(0);
        if n == 0 || steps == 0 {
            return Err(SearchError::NumericInstability(
                "nothing to replay".to_string(),
            ));
        }

        let padding = Observation {
            action: self.n_tokens,
            parent: self.n_tokens,
            sibling: self.n_tokens,
            open: 0.0,
        };
        let open_mask = vec![true; self.n_tokens];

        let mut state = LstmState::zeros(n, self.num_units, &self.device);
        let mut log_prob_sum = Tensor::<B, 2>::zeros([n, 1], &self.device);
        let mut entropy_sum = Tensor::<B, 2>::zeros([n, 1], &self.device);

        for t in 0..steps {
            let mut observations = Vec::with_capacity(n);
            let mut masks: Vec<&[bool]> = Vec::with_capacity(n);
            let mut actions = Vec::with_capacity(n);
            let mut active = Vec::with_capacity(n);
            for trajectory in trajectories {
                match trajectory.get(t) {
                    Some(record) => {
                        observations.push(record.observation);
                        masks.push(&record.mask);
                        actions.push(record.action as i32);
                        active.push(1.0f32);
                    }
                    None => {
                        observations.push(padding);
                        masks.push(&open_mask);
                        actions.push(0);
                        active.push(0.0);
                    }
                }
            }

            let (logits, next) = self.model.step(step_input(&observations, &self.device), state);
            state = next;
            let log_probs = masked_log_probs(logits, mask_bias(&masks, self.n_tokens, &self.device));

            let actions = Tensor::<B, 2, Int>::from_data(TensorData::new(actions, [n, 1]), &self.device);
            let active = Tensor::<B, 2>::from_data(TensorData::new(active, [n, 1]), &self.device);

            let chosen = log_probs.clone().gather(1, actions);
            let entropy = (log_probs.clone().exp() * log_probs).sum_dim(1).neg();

            log_prob_sum = log_prob_sum + chosen * active.clone();
            entropy_sum = entropy_sum + (entropy * active).mul_scalar(entropy_gamma.powi(t as i32) as f32);
        }

        Ok((log_prob_sum.reshape([n]), entropy_sum.reshape([n])))
    }
}

/// Stepping state for one batched sampling round.
pub struct InferenceSession<B: Backend> {
    model: PolicyNetwork<B>,
    state: Option<LstmState<B>>,
    device: B::Device,
    n_tokens: usize,
    num_units: usize,
}

impl<B: Backend> InferenceSession<B> {
    /// Advance every row one step and return its masked log-probabilities.
    ///
    /// The batch size must stay the same for the whole session.
    pub fn step(&mut self, observations: &[Observation], masks: &[&[bool]]) -> Result<Vec<Vec<f32>>> {
        let n = observations.len();
        let state = self
            .state
            .take()
            .unwrap_or_else(|| LstmState::zeros(n, self.num_units, &self.device));
        let (logits, next) = self.model.step(step_input(observations, &self.device), state);
        self.state = Some(next);

        let log_probs = masked_log_probs(logits, mask_bias(masks, self.n_tokens, &self.device));
        let flat = read_floats(log_probs)?;
        if flat.len() != n * self.n_tokens {
            return Err(SearchError::Collaborator(format!(
                "Controller produced {} values for a {}x{} batch",
                flat.len(),
                n,
                self.n_tokens
            )));
        }
        Ok(flat.chunks(self.n_tokens).map(|row| row.to_vec()).collect())
    }
}
