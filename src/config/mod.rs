pub mod const_optimizer;
pub mod constraints;
pub mod controller;
pub mod library;
pub mod manager;
pub mod task;
pub mod training;
pub mod traits;

pub use const_optimizer::{ConstOptMethod, ConstOptimizerConfig};
pub use constraints::{ConstraintsConfig, Domain, DomainRule, RelationalRule, RepeatRule};
pub use controller::ControllerConfig;
pub use library::LibraryConfig;
pub use manager::{AppConfig, ConfigManager, ENV_PREFIX};
pub use task::{ControlConfig, RegressionConfig, RegressionMetric, TaskConfig, TaskKind};
pub use training::{Baseline, TrainingConfig};
pub use traits::ConfigSection;
