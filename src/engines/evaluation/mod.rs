pub mod const_opt;
pub mod control;
pub mod regression;
pub mod reward;
pub mod task;

pub use const_opt::{ConstantOptimizer, OptimizedConstants};
pub use control::{AnchorPolicy, ControlTask, EnvError, Environment, EnvironmentFactory, StepOutcome};
pub use regression::RegressionTask;
pub use reward::{Evaluation, RewardEvaluator};
pub use task::{is_success, Task, TaskError};
