pub mod action_spec;
pub mod constraints;
pub mod controller;
pub mod hall_of_fame;
pub mod pareto;
pub mod program;
pub mod progress;
pub mod queues;
pub mod runs;
pub mod sampler;
pub mod search_engine;
pub mod trainer;

pub use action_spec::{ActionSlot, ActionSpec};
pub use constraints::{Constraint, ConstraintEngine, ConstraintState};
pub use controller::{Controller, PolicyNetwork, PolicyNetworkConfig};
pub use hall_of_fame::{HallOfFame, HallOfFameEntry};
pub use pareto::{ParetoEntry, ParetoFront};
pub use program::{Program, ProgramSummary};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, NullProgressCallback, ProgressMessage};
pub use runs::{best_run, run_independent};
pub use sampler::{BatchSampler, SampledBatch, SampledSequence};
pub use search_engine::{
    BestProgram, DefaultBackend, ProgressCallback, SearchEngine, SearchResult, StopReason,
};
pub use queues::{MemoryQueue, PriorityQueue};
pub use trainer::{select_top_quantile, select_with_memory, Trainer};
