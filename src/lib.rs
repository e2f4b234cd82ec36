//! Neural-guided symbolic search: a recurrent policy samples prefix-notation
//! programs under structural constraints, fitted constants are optimized per
//! program, and the policy is trained with a risk-seeking policy gradient.

pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod functions;
pub mod types;

pub use config::{AppConfig, ConfigManager};
pub use engines::evaluation::{ControlTask, RegressionTask, Task};
pub use engines::generation::{SearchEngine, SearchResult};
pub use error::{Result, SearchError};
