use crate::config::AppConfig;
use crate::engines::evaluation::Task;
use crate::engines::generation::progress::{ConsoleProgressCallback, NullProgressCallback};
use crate::engines::generation::search_engine::{SearchEngine, SearchResult};
use crate::error::Result;
use rayon::prelude::*;
use std::sync::Arc;

/// Run one search per seed in parallel; runs share nothing but the configuration.
///
/// `task_factory` builds the task for a seed. With `verbose`, each run logs its progress.
pub fn run_independent<F>(
    config: &AppConfig,
    seeds: &[u64],
    task_factory: F,
    verbose: bool,
) -> Result<Vec<SearchResult>>
where
    F: Fn(u64) -> Result<Arc<dyn Task>> + Sync,
{
    log::info!("Launching {} independent runs", seeds.len());
    seeds
        .par_iter()
        .map(|&seed| {
            let task = task_factory(seed)?;
            let mut engine = SearchEngine::new(config.clone(), task)?.with_seed(seed);
            if verbose {
                engine.run(ConsoleProgressCallback::default())
            } else {
                engine.run(NullProgressCallback)
            }
        })
        .collect()
}

/// The run whose best program has the highest reward.
pub fn best_run(results: &[SearchResult]) -> Option<&SearchResult> {
    results
        .iter()
        .filter_map(|r| Some((r, r.best.as_ref()?.program.reward?)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(r, _)| r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::RegressionTask;

    #[test]
    fn test_runs_are_independent() {
        let mut config = AppConfig::default();
        config.training.n_epochs = Some(2);
        config.training.batch_size = 20;
        config.constraints.max_length = 10;
        config.library.function_set = vec!["add".into(), "mul".into()];

        let results = run_independent(
            &config,
            &[1, 2, 3],
            |seed| {
                let task =
                    RegressionTask::from_config(&config.library, &config.task.regression, seed)?;
                Ok(Arc::new(task) as Arc<dyn Task>)
            },
            false,
        )
        .unwrap();

        let seeds: Vec<u64> = results.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![1, 2, 3]);
        assert!(best_run(&results).is_some());
    }
}
