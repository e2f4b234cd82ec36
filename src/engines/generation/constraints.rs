//! Legal-next-token masks for partially generated traversals.
//!
//! Every rule only clears entries of the mask, so rules compose by running them in
//! sequence. The engine reports a dead end when nothing is left.

use crate::config::{ConstraintsConfig, Domain};
use crate::error::{Result, SearchError};
use crate::functions::{Library, TokenKind};
use crate::types::TokenId;
use std::collections::HashMap;
use std::sync::Arc;

/// Operator node whose argument slots are not all filled yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenNode {
    pub token: TokenId,
    pub arity: usize,
    pub children: Vec<TokenId>,
}

/// Incremental view of one in-progress traversal.
#[derive(Debug, Clone)]
pub struct ConstraintState {
    tokens: Vec<TokenId>,
    open: usize,
    stack: Vec<OpenNode>,
    counts: Vec<usize>,
}

impl ConstraintState {
    pub fn new(vocab_size: usize) -> Self {
        Self {
            tokens: Vec::new(),
            open: 1,
            stack: Vec::new(),
            counts: vec![0; vocab_size],
        }
    }

    /// Append a token. The caller guarantees the traversal is still open.
    pub fn push(&mut self, token: TokenId, arity: usize) {
        debug_assert!(self.open > 0, "push onto a closed traversal");
        self.tokens.push(token);
        self.counts[token] += 1;
        self.open = self.open + arity - 1;

        if let Some(top) = self.stack.last_mut() {
            top.children.push(token);
        }
        if arity > 0 {
            self.stack.push(OpenNode {
                token,
                arity,
                children: Vec::new(),
            });
        } else {
            while self
                .stack
                .last()
                .is_some_and(|top| top.children.len() == top.arity)
            {
                self.stack.pop();
            }
        }
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Argument slots still to be filled
    pub fn open_slots(&self) -> usize {
        self.open
    }

    pub fn is_complete(&self) -> bool {
        self.open == 0
    }

    /// Operator whose argument the next token fills
    pub fn parent(&self) -> Option<TokenId> {
        self.stack.last().map(|node| node.token)
    }

    /// Left sibling of the next token
    pub fn sibling(&self) -> Option<TokenId> {
        self.stack
            .last()
            .filter(|node| node.children.len() == 1)
            .map(|node| node.children[0])
    }

    /// Argument position the next token fills
    pub fn arg_index(&self) -> usize {
        self.stack.last().map_or(0, |node| node.children.len())
    }

    pub fn parent_arity(&self) -> Option<usize> {
        self.stack.last().map(|node| node.arity)
    }

    /// Open operators from the nearest parent up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.stack.iter().rev().map(|node| node.token)
    }

    pub fn count(&self, token: TokenId) -> usize {
        self.counts[token]
    }
}

/// One masking rule.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &'static str;

    /// Clear the entries of tokens that may not come next.
    fn apply(&self, state: &ConstraintState, mask: &mut [bool]);
}

struct AnchorExclusion {
    anchors: Vec<TokenId>,
}

impl Constraint for AnchorExclusion {
    fn name(&self) -> &'static str {
        "anchor"
    }

    fn apply(&self, _state: &ConstraintState, mask: &mut [bool]) {
        for &id in &self.anchors {
            mask[id] = false;
        }
    }
}

struct ArityClosure {
    arities: Vec<usize>,
    max_length: usize,
}

impl Constraint for ArityClosure {
    fn name(&self) -> &'static str {
        "arity"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        let remaining = self.max_length as isize - (state.len() as isize + 1);
        let open = state.open_slots() as isize;
        for (id, allowed) in mask.iter_mut().enumerate() {
            if open + self.arities[id] as isize - 1 > remaining {
                *allowed = false;
            }
        }
    }
}

struct MinLength {
    arities: Vec<usize>,
    min_length: usize,
}

impl Constraint for MinLength {
    fn name(&self) -> &'static str {
        "min_length"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        if state.len() + 1 >= self.min_length {
            return;
        }
        for (id, allowed) in mask.iter_mut().enumerate() {
            if state.open_slots() + self.arities[id] == 1 {
                *allowed = false;
            }
        }
    }
}

/// Parent x child table of forbidden direct children.
struct ForbiddenChildren {
    forbidden: Vec<Vec<bool>>,
}

impl Constraint for ForbiddenChildren {
    fn name(&self) -> &'static str {
        "relational"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        if let Some(parent) = state.parent() {
            for (allowed, &forbidden) in mask.iter_mut().zip(&self.forbidden[parent]) {
                if forbidden {
                    *allowed = false;
                }
            }
        }
    }
}

struct LiteralDomain {
    /// (operator, argument index) -> domains the argument must satisfy
    slots: HashMap<(TokenId, usize), Vec<Domain>>,
    literals: Vec<(TokenId, f64)>,
}

impl Constraint for LiteralDomain {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        let Some(parent) = state.parent() else {
            return;
        };
        if let Some(domains) = self.slots.get(&(parent, state.arg_index())) {
            for &(id, value) in &self.literals {
                if domains.iter().any(|domain| !domain.admits(value)) {
                    mask[id] = false;
                }
            }
        }
    }
}

/// `sub(a, a)` and `div(a, a)` for a repeated input or literal.
struct IdenticalOperands {
    operators: Vec<TokenId>,
    fixed_terminals: Vec<bool>,
}

impl Constraint for IdenticalOperands {
    fn name(&self) -> &'static str {
        "identical_operands"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        let (Some(parent), Some(sibling)) = (state.parent(), state.sibling()) else {
            return;
        };
        if self.operators.contains(&parent) && self.fixed_terminals[sibling] {
            mask[sibling] = false;
        }
    }
}

struct ConstantOnly {
    constants: Vec<TokenId>,
}

impl Constraint for ConstantOnly {
    fn name(&self) -> &'static str {
        "constant_only"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        let forbid = match state.parent_arity() {
            Some(1) => true,
            Some(2) => state
                .sibling()
                .is_some_and(|sibling| self.constants.contains(&sibling)),
            _ => false,
        };
        if forbid {
            for &id in &self.constants {
                mask[id] = false;
            }
        }
    }
}

struct NoNestedTrig {
    trig: Vec<TokenId>,
}

impl Constraint for NoNestedTrig {
    fn name(&self) -> &'static str {
        "nested_trig"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        if state.ancestors().any(|id| self.trig.contains(&id)) {
            for &id in &self.trig {
                mask[id] = false;
            }
        }
    }
}

struct RepeatLimit {
    limits: Vec<(TokenId, usize)>,
}

impl Constraint for RepeatLimit {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn apply(&self, state: &ConstraintState, mask: &mut [bool]) {
        for &(id, max) in &self.limits {
            if state.count(id) >= max {
                mask[id] = false;
            }
        }
    }
}

/// `reachable[l]` is whether some complete prefix traversal of exactly `l` tokens
/// can be built from tokens with these arities.
pub fn reachable_lengths(arities: &[usize], max_length: usize) -> Vec<bool> {
    let mut complete = vec![false; max_length + 1];
    // open[o]: a prefix of the current length leaves `o` slots to fill
    let mut open = vec![false; max_length + 2];
    open[1] = max_length > 0;
    for length in 0..max_length {
        let remaining = max_length - length - 1;
        let mut next = vec![false; max_length + 2];
        for slots in 1..open.len() {
            if !open[slots] {
                continue;
            }
            for &arity in arities {
                let after = slots + arity - 1;
                if after == 0 {
                    complete[length + 1] = true;
                } else if after <= remaining {
                    next[after] = true;
                }
            }
        }
        open = next;
    }
    complete
}

/// Ordered rule table over a shared library.
pub struct ConstraintEngine {
    library: Arc<Library>,
    rules: Vec<Box<dyn Constraint>>,
    max_length: usize,
    max_restarts: usize,
    fill_on_truncation: bool,
}

impl std::fmt::Debug for ConstraintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintEngine")
            .field("library", &self.library)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("max_length", &self.max_length)
            .field("max_restarts", &self.max_restarts)
            .field("fill_on_truncation", &self.fill_on_truncation)
            .finish()
    }
}

impl ConstraintEngine {
    /// Reject configurations under which no complete traversal fits the length window.
    fn check_reachable_length(config: &ConstraintsConfig, library: &Library) -> Result<()> {
        if !config.enforce_arity && config.fill_on_truncation {
            // Truncated prefixes are completed by filling
            return Ok(());
        }
        let arities: Vec<usize> = (0..library.size())
            .filter(|id| !library.anchors().contains(id))
            .map(|id| library.arity(id))
            .collect();
        let shortest = if config.enforce_min_length {
            config.min_length.max(1)
        } else {
            1
        };
        let reachable = reachable_lengths(&arities, config.max_length);
        if (shortest..=config.max_length).any(|length| reachable[length]) {
            return Ok(());
        }
        Err(SearchError::Configuration(format!(
            "No complete expression has between {} and {} tokens with this function set",
            shortest, config.max_length
        )))
    }

    pub fn new(config: &ConstraintsConfig, library: Arc<Library>) -> Result<Self> {
        let arities: Vec<usize> = (0..library.size()).map(|id| library.arity(id)).collect();
        Self::check_reachable_length(config, &library)?;
        let mut rules: Vec<Box<dyn Constraint>> = Vec::new();

        rules.push(Box::new(AnchorExclusion {
            anchors: library.anchors().to_vec(),
        }));

        if config.enforce_arity {
            rules.push(Box::new(ArityClosure {
                arities: arities.clone(),
                max_length: config.max_length,
            }));
        }

        if config.enforce_min_length && config.min_length > 1 {
            rules.push(Box::new(MinLength {
                arities: arities.clone(),
                min_length: config.min_length,
            }));
        }

        let forbidden = Self::forbidden_children(config, &library)?;
        if forbidden.iter().flatten().any(|&f| f) {
            rules.push(Box::new(ForbiddenChildren { forbidden }));
        }

        if config.enforce_domain {
            let mut slots: HashMap<(TokenId, usize), Vec<Domain>> = HashMap::new();
            for rule in &config.domain {
                let Some(id) = library.lookup(&rule.operator) else {
                    log::debug!("Skipping domain rule for absent operator '{}'", rule.operator);
                    continue;
                };
                if rule.arg >= library.arity(id) {
                    return Err(SearchError::Configuration(format!(
                        "Domain rule names argument {} of '{}', which has arity {}",
                        rule.arg,
                        rule.operator,
                        library.arity(id)
                    )));
                }
                slots.entry((id, rule.arg)).or_default().push(rule.domain);
            }
            let literals: Vec<(TokenId, f64)> = library
                .tokens()
                .iter()
                .enumerate()
                .filter_map(|(id, token)| match token.kind {
                    TokenKind::Literal(value) => Some((id, value)),
                    _ => None,
                })
                .collect();
            if !slots.is_empty() && !literals.is_empty() {
                rules.push(Box::new(LiteralDomain { slots, literals }));
            }

            let operators: Vec<TokenId> =
                ["sub", "div"].iter().filter_map(|name| library.lookup(name)).collect();
            if !operators.is_empty() {
                let fixed_terminals = library
                    .tokens()
                    .iter()
                    .map(|t| matches!(t.kind, TokenKind::Input(_) | TokenKind::Literal(_)))
                    .collect();
                rules.push(Box::new(IdenticalOperands {
                    operators,
                    fixed_terminals,
                }));
            }
        }

        if config.constant_only && !library.constants().is_empty() {
            rules.push(Box::new(ConstantOnly {
                constants: library.constants().to_vec(),
            }));
        }

        if config.no_nested_trig {
            let trig = library.trig_ids();
            if !trig.is_empty() {
                rules.push(Box::new(NoNestedTrig { trig }));
            }
        }

        let limits: Vec<(TokenId, usize)> = config
            .repeat
            .iter()
            .filter_map(|rule| library.lookup(&rule.token).map(|id| (id, rule.max)))
            .collect();
        if !limits.is_empty() {
            rules.push(Box::new(RepeatLimit { limits }));
        }

        let engine = Self {
            library,
            rules,
            max_length: config.max_length,
            max_restarts: config.max_restarts,
            fill_on_truncation: config.fill_on_truncation,
        };
        log::debug!("Constraint rules: {}", engine.rule_names().join(", "));
        Ok(engine)
    }

    fn forbidden_children(config: &ConstraintsConfig, library: &Library) -> Result<Vec<Vec<bool>>> {
        let size = library.size();
        let mut forbidden = vec![vec![false; size]; size];

        for rule in &config.relational {
            match (library.lookup(&rule.parent), library.lookup(&rule.child)) {
                (Some(parent), Some(child)) => {
                    if library.arity(parent) == 0 {
                        return Err(SearchError::Configuration(format!(
                            "Relational rule parent '{}' is a terminal",
                            rule.parent
                        )));
                    }
                    forbidden[parent][child] = true;
                }
                _ => log::debug!(
                    "Skipping relational rule {} -> {}: token not in library",
                    rule.parent,
                    rule.child
                ),
            }
        }

        if config.inverse {
            for (op, inverse) in library.inverse_pairs() {
                forbidden[op][inverse] = true;
                forbidden[inverse][op] = true;
            }
        }

        for name in &config.self_repeat {
            if let Some(id) = library.lookup(name) {
                forbidden[id][id] = true;
            }
        }

        Ok(forbidden)
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn max_restarts(&self) -> usize {
        self.max_restarts
    }

    pub fn fill_on_truncation(&self) -> bool {
        self.fill_on_truncation
    }

    pub fn new_state(&self) -> ConstraintState {
        ConstraintState::new(self.library.size())
    }

    /// Legal-next-token mask; may be all false.
    pub fn mask(&self, state: &ConstraintState) -> Vec<bool> {
        let mut mask = vec![true; self.library.size()];
        for rule in &self.rules {
            rule.apply(state, &mut mask);
        }
        mask
    }

    /// Legal-next-token mask, or a dead-end error when nothing is legal.
    pub fn next_mask(&self, state: &ConstraintState) -> Result<Vec<bool>> {
        let mask = self.mask(state);
        if mask.iter().any(|&allowed| allowed) {
            Ok(mask)
        } else {
            Err(SearchError::ConstraintExhaustion {
                length: state.len(),
                reason: format!(
                    "no legal token after [{}]",
                    self.library.names(state.tokens()).join(",")
                ),
            })
        }
    }

    /// Replay a complete traversal and confirm every token was legal when emitted.
    pub fn check_traversal(&self, traversal: &[TokenId]) -> Result<()> {
        let mut state = self.new_state();
        for &token in traversal {
            if state.is_complete() {
                return Err(SearchError::InvalidProgram("tokens after a complete expression".into()));
            }
            let mask = self.mask(&state);
            if !mask.get(token).copied().unwrap_or(false) {
                return Err(SearchError::InvalidProgram(format!(
                    "token '{}' is not allowed at position {}",
                    self.library.token(token).name,
                    state.len()
                )));
            }
            state.push(token, self.library.arity(token));
        }
        if state.is_complete() {
            Ok(())
        } else {
            Err(SearchError::InvalidProgram("traversal is incomplete".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationalRule;
    use crate::functions::{FunctionRegistry, LibrarySpec};

    fn library(function_set: &[&str], n_inputs: usize) -> Arc<Library> {
        let spec = LibrarySpec {
            function_set: function_set.iter().map(|s| s.to_string()).collect(),
            n_inputs,
            anchor_dims: vec![],
            protected: false,
        };
        Arc::new(Library::build(&spec, &FunctionRegistry::new()).unwrap())
    }

    fn allowed(engine: &ConstraintEngine, mask: &[bool]) -> Vec<String> {
        mask.iter()
            .enumerate()
            .filter(|(_, &a)| a)
            .map(|(id, _)| engine.library().token(id).name.clone())
            .collect()
    }

    fn state_after(engine: &ConstraintEngine, text: &str) -> ConstraintState {
        let library = engine.library().clone();
        let mut state = engine.new_state();
        for id in library.actionize(text).unwrap() {
            state.push(id, library.arity(id));
        }
        state
    }

    #[test]
    fn test_state_tracks_parent_and_sibling() {
        let library = library(&["add", "sin"], 2);
        let engine = ConstraintEngine::new(&ConstraintsConfig::default(), library.clone()).unwrap();

        let state = state_after(&engine, "add,sin");
        assert_eq!(state.parent(), library.lookup("sin"));
        assert_eq!(state.sibling(), None);
        assert_eq!(state.open_slots(), 2);

        let state = state_after(&engine, "add,sin,x1");
        assert_eq!(state.parent(), library.lookup("add"));
        assert_eq!(state.sibling(), library.lookup("sin"));
        assert_eq!(state.arg_index(), 1);

        let state = state_after(&engine, "add,sin,x1,x2");
        assert!(state.is_complete());
        assert_eq!(state.parent(), None);
    }

    #[test]
    fn test_arity_closure_at_max_length() {
        let library = library(&["add", "sin"], 1);
        let config = ConstraintsConfig {
            max_length: 4,
            min_length: 1,
            ..Default::default()
        };
        let engine = ConstraintEngine::new(&config, library).unwrap();

        // add,x1 leaves one slot and two positions: a unary still fits, a binary does not
        let state = state_after(&engine, "add,x1");
        let names = allowed(&engine, &engine.mask(&state));
        assert!(names.contains(&"sin".to_string()));
        assert!(!names.contains(&"add".to_string()));

        // add,sin leaves two slots and two positions: terminals only
        let state = state_after(&engine, "add,sin");
        assert_eq!(allowed(&engine, &engine.mask(&state)), vec!["x1"]);
    }

    #[test]
    fn test_min_length_blocks_early_close() {
        let library = library(&["add", "sin"], 1);
        let engine = ConstraintEngine::new(&ConstraintsConfig::default(), library).unwrap();
        let state = engine.new_state();
        let names = allowed(&engine, &engine.mask(&state));
        assert!(!names.contains(&"x1".to_string()));
    }

    #[test]
    fn test_inverse_and_self_repeat() {
        let library = library(&["exp", "log", "neg", "add"], 1);
        let engine = ConstraintEngine::new(&ConstraintsConfig::default(), library).unwrap();

        let names = allowed(&engine, &engine.mask(&state_after(&engine, "log")));
        assert!(!names.contains(&"exp".to_string()));
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "exp")));
        assert!(!names.contains(&"log".to_string()));
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "neg")));
        assert!(!names.contains(&"neg".to_string()));
        assert!(names.contains(&"add".to_string()));
    }

    #[test]
    fn test_custom_relational_rule() {
        let library = library(&["mul", "sin", "cos"], 1);
        let config = ConstraintsConfig {
            relational: vec![RelationalRule {
                parent: "mul".into(),
                child: "cos".into(),
            }],
            ..Default::default()
        };
        let engine = ConstraintEngine::new(&config, library).unwrap();
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "mul")));
        assert!(!names.contains(&"cos".to_string()));
        assert!(names.contains(&"sin".to_string()));
    }

    #[test]
    fn test_domain_rejects_bad_literals() {
        let library = library(&["div", "log", "add", "0.0", "-1.0", "2.0"], 1);
        let config = ConstraintsConfig {
            min_length: 1,
            ..Default::default()
        };
        let engine = ConstraintEngine::new(&config, library).unwrap();

        let names = allowed(&engine, &engine.mask(&state_after(&engine, "log")));
        assert!(!names.contains(&"0.0".to_string()));
        assert!(!names.contains(&"-1.0".to_string()));
        assert!(names.contains(&"2.0".to_string()));

        // numerator is unrestricted, denominator must be non-zero and differ from the numerator
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "add,div")));
        assert!(names.contains(&"0.0".to_string()));
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "add,div,2.0")));
        assert!(!names.contains(&"0.0".to_string()));
        assert!(!names.contains(&"2.0".to_string()));
        assert!(names.contains(&"-1.0".to_string()));
    }

    #[test]
    fn test_constant_only_and_nested_trig() {
        let library = library(&["add", "sin", "cos", "const"], 1);
        let config = ConstraintsConfig {
            min_length: 1,
            ..Default::default()
        };
        let engine = ConstraintEngine::new(&config, library).unwrap();

        let names = allowed(&engine, &engine.mask(&state_after(&engine, "sin")));
        assert!(!names.contains(&"const".to_string()));
        assert!(!names.contains(&"cos".to_string()));

        let names = allowed(&engine, &engine.mask(&state_after(&engine, "add,const")));
        assert!(!names.contains(&"const".to_string()));
        let names = allowed(&engine, &engine.mask(&state_after(&engine, "add")));
        assert!(names.contains(&"const".to_string()));
    }

    #[test]
    fn test_unreachable_length_window_is_rejected() {
        let library = library(&["add", "mul"], 2);
        let config = ConstraintsConfig {
            max_length: 4,
            min_length: 4,
            ..Default::default()
        };
        let err = ConstraintEngine::new(&config, library.clone()).unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));

        // Length 5 is reachable with binary operators only
        let config = ConstraintsConfig {
            max_length: 5,
            ..config
        };
        assert!(ConstraintEngine::new(&config, library.clone()).is_ok());

        // Without the minimum, a lone terminal is enough
        let config = ConstraintsConfig {
            max_length: 4,
            min_length: 4,
            enforce_min_length: false,
            ..Default::default()
        };
        assert!(ConstraintEngine::new(&config, library).is_ok());

        let unary = self::library(&["add", "sin"], 1);
        let config = ConstraintsConfig {
            max_length: 4,
            min_length: 4,
            ..Default::default()
        };
        assert!(ConstraintEngine::new(&config, unary).is_ok());
    }

    #[test]
    fn test_lengths_reachable_by_arity() {
        let reachable = reachable_lengths(&[0, 2], 6);
        assert_eq!(reachable, vec![false, true, false, true, false, true, false]);
        let reachable = reachable_lengths(&[0, 3], 7);
        assert_eq!(
            (0..=7).filter(|&l| reachable[l]).collect::<Vec<_>>(),
            vec![1, 4, 7]
        );
        assert!(reachable_lengths(&[1, 2], 5).iter().all(|&r| !r));
    }

    #[test]
    fn test_repeat_limit_and_dead_end() {
        let library = library(&["sin", "cos"], 1);
        let config = ConstraintsConfig {
            min_length: 1,
            repeat: vec![crate::config::RepeatRule {
                token: "x1".into(),
                max: 1,
            }],
            ..Default::default()
        };
        let engine = ConstraintEngine::new(&config, library).unwrap();
        // under sin, x1 is the only legal token; once it is used up nothing is left
        let mut state = engine.new_state();
        let x1 = engine.library().lookup("x1").unwrap();
        assert!(engine.next_mask(&state).unwrap()[x1]);
        state.push(x1, 0);
        let fresh = state_after(&engine, "sin");
        assert!(!engine.mask(&fresh).iter().enumerate().any(|(id, &a)| a && id != x1));
        assert!(engine.check_traversal(&[x1]).is_ok());

        let blocked = ConstraintState {
            counts: vec![0, 0, 1],
            ..fresh
        };
        assert!(matches!(
            engine.next_mask(&blocked),
            Err(SearchError::ConstraintExhaustion { .. })
        ));
    }
}
