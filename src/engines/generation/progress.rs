use super::hall_of_fame::HallOfFameEntry;
use super::search_engine::{ProgressCallback, SearchResult};
use crate::engines::metrics::EpochStats;

/// Reports through the `log` facade; every `every` epochs at info level.
pub struct ConsoleProgressCallback {
    every: usize,
}

impl ConsoleProgressCallback {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_epoch_start(&mut self, epoch: usize, total_epochs: usize) {
        log::debug!("Epoch {}/{} starting...", epoch + 1, total_epochs);
    }

    fn on_epoch_complete(&mut self, stats: &EpochStats, best: Option<&HallOfFameEntry>) {
        if (stats.epoch + 1) % self.every != 0 {
            return;
        }
        log::info!(
            "Epoch {} complete. Mean reward: {:.4}, max: {:.4}, best: {:.4}, invalid: {}, failures: {}",
            stats.epoch + 1,
            stats.mean_reward,
            stats.max_reward,
            stats.best_reward,
            stats.n_invalid,
            stats.total_failures()
        );
        if let Some(best) = best {
            log::info!("  Best so far: {}", best.program.to_infix());
        }
    }

    fn on_finish(&mut self, result: &SearchResult) {
        log::info!(
            "Search finished after {} epochs ({:?}), {} programs sampled",
            result.epochs.len(),
            result.stop_reason,
            result.total_programs
        );
    }
}

/// Discards all progress events.
pub struct NullProgressCallback;

impl ProgressCallback for NullProgressCallback {
    fn on_epoch_start(&mut self, _epoch: usize, _total_epochs: usize) {}

    fn on_epoch_complete(&mut self, _stats: &EpochStats, _best: Option<&HallOfFameEntry>) {}
}

// For sending progress to another thread
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    EpochStart { epoch: usize, total_epochs: usize },
    EpochComplete { stats: EpochStats, best_expression: Option<String> },
    Finished { best_reward: Option<f64> },
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_epoch_start(&mut self, epoch: usize, total_epochs: usize) {
        let _ = self.sender.send(ProgressMessage::EpochStart { epoch, total_epochs });
    }

    fn on_epoch_complete(&mut self, stats: &EpochStats, best: Option<&HallOfFameEntry>) {
        let _ = self.sender.send(ProgressMessage::EpochComplete {
            stats: stats.clone(),
            best_expression: best.map(|e| e.program.to_infix()),
        });
    }

    fn on_finish(&mut self, result: &SearchResult) {
        let _ = self.sender.send(ProgressMessage::Finished {
            best_reward: result.best.as_ref().and_then(|b| b.program.reward),
        });
    }
}
