pub mod epoch;
pub mod fit;

pub use epoch::EpochStats;
pub use fit::FitMetrics;
