use crate::engines::generation::program::Program;

use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct HallOfFameEntry {
    pub program: Program,
    /// Ranking reward (running mean for stochastic tasks)
    pub reward: f64,
}

/// The best distinct programs seen so far, highest reward first.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    entries: Vec<HallOfFameEntry>,
    max_size: usize,
    seen_signatures: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_size + 1),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a program to the Hall of Fame
    pub fn try_add(&mut self, program: &Program, reward: f64) -> bool {
        // Deduplication check
        if self.seen_signatures.contains(program.key()) || !reward.is_finite() {
            return false;
        }
        if self.is_full() && self.min_reward().is_some_and(|min| reward <= min) {
            return false;
        }

        self.entries.push(HallOfFameEntry {
            program: program.clone(),
            reward,
        });
        self.seen_signatures.insert(program.key().to_string());
        self.sort_and_trim();
        true
    }

    /// Re-rank an entry whose reward changed, or offer the program if it is not present.
    pub fn update(&mut self, program: &Program, reward: f64) -> bool {
        match self.entries.iter_mut().find(|e| e.program.key() == program.key()) {
            Some(entry) => {
                entry.reward = reward;
                entry.program = program.clone();
                self.sort_and_trim();
                true
            }
            None => self.try_add(program, reward),
        }
    }

    /// Sort by reward (descending); earlier entries win ties
    fn sort_and_trim(&mut self) {
        self.entries.sort_by(|a, b| b.reward.total_cmp(&a.reward));

        while self.entries.len() > self.max_size {
            if let Some(removed) = self.entries.pop() {
                self.seen_signatures.remove(removed.program.key());
            }
        }
    }

    pub fn get_all(&self) -> &[HallOfFameEntry] {
        &self.entries
    }

    pub fn get_top_n(&self, n: usize) -> &[HallOfFameEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn best(&self) -> Option<&HallOfFameEntry> {
        self.entries.first()
    }

    pub fn min_reward(&self) -> Option<f64> {
        self.entries.last().map(|e| e.reward)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen_signatures.contains(key)
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
