use burn::backend::{Autodiff, NdArray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use symsearch::config::{Baseline, ConstraintsConfig, ControllerConfig, TrainingConfig};
use symsearch::engines::generation::trainer::create_optimizer;
use symsearch::engines::generation::{
    select_top_quantile, BatchSampler, ConstraintEngine, Controller, Trainer,
};
use symsearch::functions::{FunctionRegistry, Library, LibrarySpec};

type B = Autodiff<NdArray>;

#[test]
fn selection_keeps_ceil_epsilon_n_best() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let n = rng.gen_range(1..300);
        let epsilon: f64 = rng.gen_range(0.01..1.0);
        // Coarse rewards so ties are common
        let rewards: Vec<f64> = (0..n).map(|_| rng.gen_range(0..20) as f64 / 4.0).collect();
        let selection = select_top_quantile(&rewards, epsilon);

        let expected = ((epsilon * n as f64 - 1e-9).ceil() as usize).clamp(1, n);
        assert_eq!(selection.indices.len(), expected);
        assert!(selection.indices.windows(2).all(|w| w[0] < w[1]));

        let min_kept = selection
            .indices
            .iter()
            .map(|&i| rewards[i])
            .fold(f64::INFINITY, f64::min);
        assert_eq!(min_kept, selection.threshold);
        for (i, &r) in rewards.iter().enumerate() {
            if selection.indices.contains(&i) {
                continue;
            }
            assert!(r <= selection.threshold);
            // A tied reward is only excluded if it comes after every retained tie
            if r == selection.threshold {
                let last_tie = selection
                    .indices
                    .iter()
                    .filter(|&&k| rewards[k] == r)
                    .max()
                    .copied()
                    .unwrap();
                assert!(i > last_tie);
            }
        }
    }
}

#[test]
fn training_raises_the_reward_of_sampled_batches() {
    let spec = LibrarySpec {
        function_set: vec!["add".into(), "mul".into()],
        n_inputs: 2,
        anchor_dims: vec![],
        protected: false,
    };
    let library = Arc::new(Library::build(&spec, &FunctionRegistry::new()).unwrap());
    let x1 = library.lookup("x1").unwrap();
    let constraints = ConstraintsConfig {
        max_length: 7,
        min_length: 1,
        ..Default::default()
    };
    let engine = Arc::new(ConstraintEngine::new(&constraints, library.clone()).unwrap());
    let mut controller = Controller::<B>::new(
        &ControllerConfig::default(),
        library.size(),
        constraints.max_length,
        Default::default(),
    );
    let mut sampler = BatchSampler::new(engine, 9);

    let training = TrainingConfig {
        epsilon: 0.2,
        baseline: Baseline::RE,
        learning_rate: 0.01,
        entropy_weight: 0.001,
        ..Default::default()
    };
    let mut optimizer = create_optimizer::<B>(&training);
    let mut trainer = Trainer::new(training);

    // Reward is the share of x1 among the leaves
    let reward = |tokens: &[usize]| {
        let leaves: Vec<&usize> = tokens.iter().filter(|&&t| library.arity(t) == 0).collect();
        leaves.iter().filter(|&&&t| t == x1).count() as f64 / leaves.len() as f64
    };

    let mut means = Vec::new();
    for epoch in 0..40 {
        let batch = sampler.sample(&controller, 200).unwrap();
        let rewards: Vec<f64> = batch.sequences.iter().map(|s| reward(&s.tokens)).collect();
        means.push(rewards.iter().sum::<f64>() / rewards.len() as f64);

        let trajectories: Vec<_> = batch.sequences.iter().map(|s| &s.trajectory).collect();
        let step = trainer
            .step(&mut controller, &mut optimizer, &trajectories, &rewards, epoch)
            .unwrap();
        assert_eq!(step.retained, (0.2 * rewards.len() as f64 - 1e-9).ceil() as usize);
        assert!(step.loss.is_finite());
    }

    let late = means[35..].iter().sum::<f64>() / 5.0;
    assert!(late > means[0], "mean reward went from {} to {}", means[0], late);
}
