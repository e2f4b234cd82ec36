use std::sync::Arc;
use symsearch::config::{AppConfig, RegressionMetric};
use symsearch::engines::evaluation::{RegressionTask, Task};
use symsearch::engines::generation::{NullProgressCallback, SearchEngine, StopReason};

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.library.function_set = ["add", "sub", "mul", "div", "sin", "cos"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    config.constraints.max_length = 30;
    config.task.regression.benchmark = Some("x_plus_sin".into());
    config.task.regression.metric = RegressionMetric::InvNrmse;
    // R² above 0.99 on the held-out points
    config.task.regression.success_threshold = 0.01;
    config.training.batch_size = 500;
    config.training.n_epochs = Some(200);
    config.training.epsilon = 0.05;
    config.training.learning_rate = 0.0025;
    config.training.early_stopping = true;
    config.training.n_cores_batch = 0;
    config
}

#[test]
fn recovers_x_plus_sin() {
    let config = config();
    let task = RegressionTask::from_config(&config.library, &config.task.regression, 0).unwrap();
    let mut engine = SearchEngine::new(config, Arc::new(task) as Arc<dyn Task>).unwrap();
    let result = engine.run(NullProgressCallback).unwrap();

    let best = result.best.expect("a valid program");
    let r2 = best.diagnostics["r2_test"];
    assert!(r2 > 0.99, "best was {} with R² {}", best.program.expression, r2);
    assert_eq!(result.stop_reason, StopReason::Success);
}

#[test]
fn result_serializes_to_json() {
    let mut config = config();
    config.training.n_epochs = Some(2);
    config.training.batch_size = 50;
    let task = RegressionTask::from_config(&config.library, &config.task.regression, 1).unwrap();
    let mut engine = SearchEngine::new(config, Arc::new(task) as Arc<dyn Task>).unwrap();
    let result = engine.run(NullProgressCallback).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["seed"], 0);
    assert!(json["epochs"].as_array().unwrap().len() <= 2);
    assert!(json["hall_of_fame"].is_array());
}
