use burn::backend::{Autodiff, NdArray};
use std::sync::Arc;
use symsearch::config::{ConstraintsConfig, ControllerConfig, RelationalRule};
use symsearch::engines::generation::{BatchSampler, ConstraintEngine, Controller};
use symsearch::functions::{FunctionRegistry, Library, LibrarySpec};
use symsearch::types::ExprNode;

type B = Autodiff<NdArray>;

fn library() -> Arc<Library> {
    let spec = LibrarySpec {
        function_set: ["add", "sub", "mul", "div", "sin", "cos", "exp", "log"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        n_inputs: 2,
        anchor_dims: vec![],
        protected: false,
    };
    Arc::new(Library::build(&spec, &FunctionRegistry::new()).unwrap())
}

#[test]
fn relational_rule_holds_over_ten_thousand_samples() {
    let library = library();
    let log = library.lookup("log").unwrap();
    let exp = library.lookup("exp").unwrap();
    let config = ConstraintsConfig {
        max_length: 16,
        min_length: 2,
        // Only the relational rule forbids the pair here
        inverse: false,
        relational: vec![RelationalRule {
            parent: "log".into(),
            child: "exp".into(),
        }],
        ..Default::default()
    };
    let engine = Arc::new(ConstraintEngine::new(&config, library.clone()).unwrap());
    let controller = Controller::<B>::new(
        &ControllerConfig::default(),
        library.size(),
        config.max_length,
        Default::default(),
    );
    let mut sampler = BatchSampler::new(engine.clone(), 2024);

    let mut checked = 0;
    for _ in 0..10 {
        let batch = sampler.sample(&controller, 1000).unwrap();
        for sequence in &batch.sequences {
            let tokens = &sequence.tokens;
            // In prefix order the first child of a unary operator is the next token
            assert!(
                !tokens.windows(2).any(|w| w[0] == log && w[1] == exp),
                "log wraps exp in {:?}",
                library.names(tokens)
            );
            assert!(ExprNode::from_prefix(tokens, |id| library.arity(id)).is_some());
            assert!(tokens.len() >= 2 && tokens.len() <= 16);
            assert!(engine.check_traversal(tokens).is_ok());
        }
        checked += batch.sequences.len();
    }
    assert!(checked > 9_000);
}

#[test]
fn default_rules_never_nest_trig() {
    let library = library();
    let config = ConstraintsConfig {
        max_length: 12,
        ..Default::default()
    };
    let trig = library.trig_ids();
    let engine = Arc::new(ConstraintEngine::new(&config, library.clone()).unwrap());
    let controller = Controller::<B>::new(
        &ControllerConfig::default(),
        library.size(),
        config.max_length,
        Default::default(),
    );
    let mut sampler = BatchSampler::new(engine, 3);
    let batch = sampler.sample(&controller, 500).unwrap();

    for sequence in &batch.sequences {
        let tree = ExprNode::from_prefix(&sequence.tokens, |id| library.arity(id)).unwrap();
        assert!(!nested_trig(&tree, &trig, false));
    }
}

fn nested_trig(node: &ExprNode, trig: &[usize], under_trig: bool) -> bool {
    let is_trig = trig.contains(&node.token);
    if is_trig && under_trig {
        return true;
    }
    node.children
        .iter()
        .any(|child| nested_trig(child, trig, under_trig || is_trig))
}
