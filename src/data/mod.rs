pub mod cache;
pub mod connectors;
pub mod dataset;

pub use cache::RewardCache;
pub use connectors::{CsvConnector, DataValidator};
pub use dataset::Dataset;
