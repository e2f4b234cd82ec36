use super::{
    const_optimizer::ConstOptimizerConfig, constraints::ConstraintsConfig,
    controller::ControllerConfig, library::LibraryConfig, task::TaskConfig,
    training::TrainingConfig, traits::ConfigSection,
};
use crate::error::SearchError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `SYMSEARCH__TRAINING__BATCH_SIZE=1000`.
pub const ENV_PREFIX: &str = "SYMSEARCH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub training: TrainingConfig,
    pub controller: ControllerConfig,
    pub constraints: ConstraintsConfig,
    pub const_optimizer: ConstOptimizerConfig,
    pub library: LibraryConfig,
    pub task: TaskConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        self.training.validate()?;
        self.controller.validate()?;
        self.constraints.validate()?;
        self.const_optimizer.validate()?;
        self.library.validate()?;
        self.task.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    env_prefix: String,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_env_prefix(ENV_PREFIX)
    }

    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
            env_prefix: prefix.to_string(),
        }
    }

    /// Load a TOML or JSON file (by extension), then apply environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SearchError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SearchError::Configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(self.environment())
            .build()?;
        self.install(settings.try_deserialize()?)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Defaults plus environment overrides only.
    pub fn load_from_env(&self) -> Result<(), SearchError> {
        let settings = Config::builder().add_source(self.environment()).build()?;
        self.install(settings.try_deserialize()?)
    }

    fn environment(&self) -> Environment {
        Environment::with_prefix(&self.env_prefix)
            .separator("__")
            .try_parsing(true)
    }

    fn install(&self, config: AppConfig) -> Result<(), SearchError> {
        config.validate()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SearchError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update<F>(&self, f: F) -> Result<(), SearchError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        self.install(candidate)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
