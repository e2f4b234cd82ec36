use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use symsearch::config::{AppConfig, ConfigManager, TaskKind};
use symsearch::engines::evaluation::{RegressionTask, Task};
use symsearch::engines::generation::{
    best_run, run_independent, ConsoleProgressCallback, SearchEngine,
};

#[derive(Parser)]
#[command(
    name = "symsearch",
    version,
    about = "Search for symbolic expressions with a risk-seeking policy gradient"
)]
struct Cli {
    /// Configuration file (TOML or JSON); SYMSEARCH__* variables override it
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Numeric CSV dataset to regress on
    #[arg(long, value_name = "PATH")]
    data: Option<PathBuf>,

    /// Target column of the dataset (defaults to the last column)
    #[arg(long)]
    target: Option<String>,

    /// Seed of the first run; further runs use consecutive seeds
    #[arg(long)]
    seed: Option<u64>,

    /// Number of independent runs
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Write the full results as JSON
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn regression_task(config: &AppConfig, seed: u64) -> symsearch::Result<Arc<dyn Task>> {
    let task = RegressionTask::from_config(&config.library, &config.task.regression, seed)?;
    Ok(Arc::new(task))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let manager = ConfigManager::new();
    match &cli.config {
        Some(path) => manager
            .load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => manager.load_from_env()?,
    }
    manager.update(|config| {
        if let Some(data) = &cli.data {
            config.task.regression.dataset = Some(data.display().to_string());
        }
        if let Some(target) = &cli.target {
            config.task.regression.target = Some(target.clone());
        }
        if let Some(seed) = cli.seed {
            config.training.seed = seed;
        }
    })?;
    let config = manager.get();

    if config.task.kind == TaskKind::Control {
        bail!("control tasks need an environment; drive them through the library API");
    }

    let first = config.training.seed;
    let results = if cli.runs <= 1 {
        let task = regression_task(&config, first)?;
        let mut engine = SearchEngine::new(config.clone(), task)?.with_seed(first);
        vec![engine.run(ConsoleProgressCallback::default())?]
    } else {
        let seeds: Vec<u64> = (0..cli.runs as u64).map(|i| first + i).collect();
        run_independent(&config, &seeds, |seed| regression_task(&config, seed), true)?
    };

    match best_run(&results).and_then(|run| run.best.as_ref().map(|best| (run.seed, best))) {
        Some((seed, best)) => {
            println!("seed:       {}", seed);
            println!("expression: {}", best.program.expression);
            if let Some(reward) = best.program.reward {
                println!("reward:     {:.6}", reward);
            }
            let mut diagnostics: Vec<_> = best.diagnostics.iter().collect();
            diagnostics.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in diagnostics {
                println!("{:<11} {:.6}", format!("{}:", name), value);
            }
        }
        None => println!("no valid program was found"),
    }

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Results written to {}", path.display());
    }
    Ok(())
}
