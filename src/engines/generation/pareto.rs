//! Pareto front over (complexity, reward): simpler and better programs dominate.
use crate::engines::generation::program::Program;
use std::collections::HashMap;

/// Defines whether an objective should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationDirection {
    Maximize,
    Minimize,
}

/// Complexity is minimized, reward is maximized.
pub const FRONT_DIRECTIONS: [OptimizationDirection; 2] =
    [OptimizationDirection::Minimize, OptimizationDirection::Maximize];

/// Check if individual A dominates individual B
/// A dominates B if A is no worse than B in all objectives and strictly better in at least one
pub fn dominates(
    a_objectives: &[f64],
    b_objectives: &[f64],
    directions: &[OptimizationDirection],
) -> bool {
    if a_objectives.len() != b_objectives.len() || a_objectives.len() != directions.len() {
        return false;
    }

    let mut at_least_one_better = false;

    for i in 0..a_objectives.len() {
        let a_val = a_objectives[i];
        let b_val = b_objectives[i];

        let (a_better, b_better) = match directions[i] {
            OptimizationDirection::Maximize => (a_val > b_val, b_val > a_val),
            OptimizationDirection::Minimize => (a_val < b_val, b_val < a_val),
        };

        if b_better {
            return false;
        }

        if a_better {
            at_least_one_better = true;
        }
    }

    at_least_one_better
}

#[derive(Debug, Clone)]
pub struct ParetoEntry {
    pub program: Program,
    pub reward: f64,
}

impl ParetoEntry {
    pub fn complexity(&self) -> usize {
        self.program.complexity()
    }

    pub fn objectives(&self) -> [f64; 2] {
        [self.complexity() as f64, self.reward]
    }
}

/// Non-dominated programs, kept sorted by complexity.
///
/// Programs offered through [`ParetoFront::update`] are also recorded, so that a
/// program blocked by a neighbour can return once that neighbour's reward drops.
#[derive(Debug, Clone, Default)]
pub struct ParetoFront {
    entries: Vec<ParetoEntry>,
    recorded: HashMap<String, ParetoEntry>,
    /// Most recorded points kept; points on the front are never dropped
    capacity: Option<usize>,
}

impl ParetoFront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Insert a program unless it is dominated or already present; evicts what it dominates.
    pub fn insert(&mut self, program: &Program, reward: f64) -> bool {
        if self.entries.iter().any(|e| e.program.key() == program.key()) {
            return false;
        }
        self.insert_unique(program, reward)
    }

    /// Record the new reward of a program (running mean of a stochastic task) and
    /// rebuild the front from every recorded point. Returns whether it is on the front.
    pub fn update(&mut self, program: &Program, reward: f64) -> bool {
        if !reward.is_finite() {
            return false;
        }
        self.recorded.insert(
            program.key().to_string(),
            ParetoEntry {
                program: program.clone(),
                reward,
            },
        );
        self.rebuild();
        self.evict_recorded();
        self.entries.iter().any(|e| e.program.key() == program.key())
    }

    fn rebuild(&mut self) {
        let mut points: Vec<&ParetoEntry> = self.recorded.values().collect();
        points.sort_by(|a, b| {
            a.complexity()
                .cmp(&b.complexity())
                .then(b.reward.total_cmp(&a.reward))
                .then_with(|| a.program.key().cmp(b.program.key()))
        });

        // Best reward among strictly simpler programs
        let mut best_simpler = f64::NEG_INFINITY;
        let mut front = Vec::new();
        let mut i = 0;
        while i < points.len() {
            let complexity = points[i].complexity();
            let top = points[i].reward;
            let mut j = i;
            while j < points.len() && points[j].complexity() == complexity {
                if points[j].reward == top && top > best_simpler {
                    front.push(points[j].clone());
                }
                j += 1;
            }
            best_simpler = best_simpler.max(top);
            i = j;
        }
        self.entries = front;
    }

    fn evict_recorded(&mut self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.recorded.len() > capacity {
            let weakest = self
                .recorded
                .values()
                .filter(|p| !self.entries.iter().any(|e| e.program.key() == p.program.key()))
                .min_by(|a, b| {
                    a.reward
                        .total_cmp(&b.reward)
                        .then(b.complexity().cmp(&a.complexity()))
                        .then_with(|| a.program.key().cmp(b.program.key()))
                })
                .map(|p| p.program.key().to_string());
            match weakest {
                Some(key) => {
                    self.recorded.remove(&key);
                }
                None => break,
            }
        }
    }

    fn insert_unique(&mut self, program: &Program, reward: f64) -> bool {
        if !reward.is_finite() {
            return false;
        }
        let candidate = [program.complexity() as f64, reward];
        if self
            .entries
            .iter()
            .any(|e| dominates(&e.objectives(), &candidate, &FRONT_DIRECTIONS))
        {
            return false;
        }

        self.entries
            .retain(|e| !dominates(&candidate, &e.objectives(), &FRONT_DIRECTIONS));
        self.entries.push(ParetoEntry {
            program: program.clone(),
            reward,
        });
        self.entries.sort_by(|a, b| {
            a.complexity()
                .cmp(&b.complexity())
                .then(b.reward.total_cmp(&a.reward))
        });
        true
    }

    /// Points recorded through `update`, on the front or not.
    pub fn recorded(&self) -> impl Iterator<Item = &ParetoEntry> {
        self.recorded.values()
    }

    pub fn is_recorded(&self, key: &str) -> bool {
        self.recorded.contains_key(key)
    }

    pub fn entries(&self) -> &[ParetoEntry] {
        &self.entries
    }

    /// Whether some front entry dominates the given point.
    pub fn dominated(&self, complexity: usize, reward: f64) -> bool {
        let point = [complexity as f64, reward];
        self.entries
            .iter()
            .any(|e| dominates(&e.objectives(), &point, &FRONT_DIRECTIONS))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::action_spec::ActionSpec;
    use crate::functions::{FunctionRegistry, Library, LibrarySpec};
    use crate::types::ComplexityMeasure;
    use std::sync::Arc;

    fn library() -> Arc<Library> {
        let spec = LibrarySpec {
            function_set: vec!["add".into(), "mul".into(), "sin".into()],
            n_inputs: 2,
            anchor_dims: vec![],
            protected: false,
        };
        Arc::new(Library::build(&spec, &FunctionRegistry::new()).unwrap())
    }

    fn program(library: &Arc<Library>, text: &str) -> Program {
        Program::new(
            library.clone(),
            library.actionize(text).unwrap(),
            &ActionSpec::single(),
            ComplexityMeasure::Length,
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_dominance_mixed() {
        // Lower complexity and higher reward dominates
        assert!(dominates(&[1.0, 0.9], &[3.0, 0.5], &FRONT_DIRECTIONS));
        // Simpler but worse: no dominance either way
        assert!(!dominates(&[1.0, 0.4], &[3.0, 0.5], &FRONT_DIRECTIONS));
        assert!(!dominates(&[3.0, 0.5], &[1.0, 0.4], &FRONT_DIRECTIONS));
        // Equal points do not dominate
        assert!(!dominates(&[2.0, 0.5], &[2.0, 0.5], &FRONT_DIRECTIONS));
    }

    #[test]
    fn test_front_keeps_only_non_dominated() {
        let library = library();
        let mut front = ParetoFront::new();

        assert!(front.insert(&program(&library, "x1"), 0.2));
        assert!(front.insert(&program(&library, "add,x1,x2"), 0.6));
        // Same complexity as x1 but worse
        assert!(!front.insert(&program(&library, "x2"), 0.1));
        // Longer and worse than add,x1,x2
        assert!(!front.insert(&program(&library, "add,x1,sin,x2"), 0.5));
        // Dominates add,x1,x2
        assert!(front.insert(&program(&library, "mul,x1,x2"), 0.7));
        assert!(front.insert(&program(&library, "add,x1,sin,x2"), 0.9));
        // Duplicate key
        assert!(!front.insert(&program(&library, "x1"), 0.95));

        let keys: Vec<&str> = front.entries().iter().map(|e| e.program.key()).collect();
        assert_eq!(keys, vec!["x1", "mul,x1,x2", "add,x1,sin,x2"]);

        for (i, a) in front.entries().iter().enumerate() {
            for (j, b) in front.entries().iter().enumerate() {
                if i != j {
                    assert!(!dominates(&a.objectives(), &b.objectives(), &FRONT_DIRECTIONS));
                }
            }
        }
        assert!(front.dominated(3, 0.5));
        assert!(!front.dominated(2, 0.8));
    }

    #[test]
    fn test_update_can_drop_an_entry() {
        let library = library();
        let mut front = ParetoFront::new();
        front.update(&program(&library, "x1"), 0.5);
        front.update(&program(&library, "add,x1,x2"), 0.8);
        assert_eq!(front.len(), 2);
        assert!(!front.update(&program(&library, "add,x1,x2"), 0.4));
        assert_eq!(front.len(), 1);
        assert!(front.is_recorded("add,x1,x2"));
    }

    #[test]
    fn test_blocked_program_returns_when_blocker_drops() {
        let library = library();
        let mut front = ParetoFront::new();
        let simple = program(&library, "add,x1,x2");
        let longer = program(&library, "add,x1,mul,x1,x2");

        assert!(front.update(&simple, 0.8));
        assert!(!front.update(&longer, 0.7));
        assert!(!front.update(&simple, 0.4));

        let keys: Vec<&str> = front.entries().iter().map(|e| e.program.key()).collect();
        assert_eq!(keys, vec!["add,x1,x2", "add,x1,mul,x1,x2"]);
        for point in front.recorded() {
            let on_front = front.entries().iter().any(|e| e.program.key() == point.program.key());
            assert!(on_front || front.dominated(point.complexity(), point.reward));
        }
    }

    #[test]
    fn test_capacity_drops_weakest_dominated_point() {
        let library = library();
        let mut front = ParetoFront::with_capacity(Some(2));
        front.update(&program(&library, "x1"), 0.5);
        front.update(&program(&library, "add,x1,x2"), 0.3);
        front.update(&program(&library, "mul,x1,x2"), 0.2);

        assert_eq!(front.recorded().count(), 2);
        assert!(front.is_recorded("x1"));
        assert!(front.is_recorded("add,x1,x2"));
        assert!(!front.is_recorded("mul,x1,x2"));
        assert_eq!(front.len(), 1);
    }
}
