use std::sync::{Arc, Mutex};
use symsearch::config::{AppConfig, ControlConfig, LibraryConfig, TaskKind};
use symsearch::engines::evaluation::{
    AnchorPolicy, ControlTask, EnvError, Environment, StepOutcome, Task,
};
use symsearch::engines::generation::{ActionSlot, NullProgressCallback, Program, SearchEngine};
use symsearch::functions::{FunctionRegistry, Library};
use symsearch::types::ComplexityMeasure;

type Log = Arc<Mutex<Vec<(Vec<f64>, Vec<f64>)>>>;

/// Two-dimensional point pushed by a three-dimensional action; records every step.
struct Plane {
    state: [f64; 2],
    log: Log,
}

impl Environment for Plane {
    fn observation_dim(&self) -> usize {
        2
    }

    fn action_dim(&self) -> usize {
        3
    }

    fn reset(&mut self, seed: u64) -> Result<Vec<f64>, EnvError> {
        self.state = [1.0 + seed as f64 * 0.5, -0.5];
        Ok(self.state.to_vec())
    }

    fn step(&mut self, action: &[f64]) -> Result<StepOutcome, EnvError> {
        self.log
            .lock()
            .unwrap()
            .push((self.state.to_vec(), action.to_vec()));
        self.state[0] = (self.state[0] + 0.1 * (action[0] + action[1])).clamp(-10.0, 10.0);
        self.state[1] = (self.state[1] + 0.1 * action[2]).clamp(-10.0, 10.0);
        Ok(StepOutcome {
            observation: self.state.to_vec(),
            reward: -(self.state[0].powi(2) + self.state[1].powi(2)),
            done: false,
        })
    }
}

struct Damping;

impl AnchorPolicy for Damping {
    fn act(&self, observation: &[f64]) -> Vec<f64> {
        vec![100.0, -0.5 * observation[0], observation[0] - observation[1]]
    }
}

fn control_task(log: &Log, config: ControlConfig) -> ControlTask {
    let log = log.clone();
    let factory = move || -> Box<dyn Environment> {
        Box::new(Plane {
            state: [0.0; 2],
            log: log.clone(),
        })
    };
    let library = LibraryConfig {
        function_set: vec!["add".into(), "mul".into(), "neg".into()],
        protected: false,
    };
    ControlTask::new("plane", Arc::new(factory), Some(Arc::new(Damping)), &library, config)
        .unwrap()
}

fn anchored_config() -> ControlConfig {
    ControlConfig {
        n_episodes: 2,
        max_steps: 15,
        action_spec: vec![ActionSlot::Learned, ActionSlot::Anchor, ActionSlot::Anchor],
        ..Default::default()
    }
}

fn assert_anchored(log: &Log) {
    let log = log.lock().unwrap();
    assert!(!log.is_empty());
    for (observation, action) in log.iter() {
        let anchor = Damping.act(observation);
        assert_eq!(action.len(), 3);
        assert_eq!(action[1], anchor[1]);
        assert_eq!(action[2], anchor[2]);
    }
}

#[test]
fn anchored_dimensions_follow_the_anchor_policy() {
    let log: Log = Arc::default();
    let task = control_task(&log, anchored_config());
    let library = Arc::new(Library::build(&task.library_spec(), &FunctionRegistry::new()).unwrap());
    let spec = task.action_spec(&library).unwrap();
    let program = Program::new(
        library.clone(),
        library.actionize("mul,x1,x2").unwrap(),
        &spec,
        ComplexityMeasure::Token,
        1.0,
    )
    .unwrap();

    let total = task.rollout(&program, &[], 0).unwrap();
    assert!(total.is_finite());
    assert_eq!(log.lock().unwrap().len(), 15);
    assert_anchored(&log);

    for (observation, action) in log.lock().unwrap().iter() {
        assert_eq!(action[0], observation[0] * observation[1]);
    }
}

#[test]
fn search_over_anchored_task_never_overrides_the_anchor() {
    let log: Log = Arc::default();
    let task = control_task(&log, anchored_config());

    let mut config = AppConfig::default();
    config.task.kind = TaskKind::Control;
    config.task.control = anchored_config();
    config.library.function_set = vec!["add".into(), "mul".into(), "neg".into()];
    config.constraints.max_length = 8;
    config.constraints.min_length = 1;
    config.training.n_epochs = Some(2);
    config.training.batch_size = 16;

    let mut engine = SearchEngine::new(config, Arc::new(task) as Arc<dyn Task>).unwrap();
    let result = engine.run(NullProgressCallback).unwrap();
    assert_eq!(result.epochs.len(), 2);
    assert!(result.best.is_some());
    assert_anchored(&log);
}

#[test]
fn anchor_slots_require_an_anchor_policy() {
    let log: Log = Arc::default();
    let log_for_factory = log.clone();
    let factory = move || -> Box<dyn Environment> {
        Box::new(Plane {
            state: [0.0; 2],
            log: log_for_factory.clone(),
        })
    };
    let result = ControlTask::new(
        "plane",
        Arc::new(factory),
        None,
        &LibraryConfig::default(),
        anchored_config(),
    );
    assert!(result.is_err());
}
