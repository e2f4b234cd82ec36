use crate::engines::evaluation::reward::Evaluation;
use crate::engines::generation::action_spec::ActionSpec;
use crate::error::{FailureKind, Result, SearchError};
use crate::functions::{Library, TokenKind};
use crate::types::{ComplexityMeasure, ExprNode, TokenId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serializable view of a program for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub key: String,
    /// Token names of the learned traversal
    pub traversal: Vec<String>,
    pub expression: String,
    pub reward: Option<f64>,
    pub raw_reward: Option<f64>,
    pub complexity: usize,
    pub constants: Vec<f64>,
}

/// A complete sampled expression together with its spliced segments and evaluation state.
#[derive(Debug, Clone)]
pub struct Program {
    library: Arc<Library>,
    traversal: Vec<TokenId>,
    segments: Vec<Vec<TokenId>>,
    /// Index of the first constant of each segment
    constant_offsets: Vec<usize>,
    constants: Vec<f64>,
    complexity: usize,
    key: String,
    raw_reward: Option<f64>,
    reward: Option<f64>,
    failure: Option<FailureKind>,
}

impl Program {
    pub fn new(
        library: Arc<Library>,
        traversal: Vec<TokenId>,
        action_spec: &ActionSpec,
        measure: ComplexityMeasure,
        initial_constant: f64,
    ) -> Result<Self> {
        if traversal.is_empty() {
            return Err(SearchError::InvalidProgram("empty traversal".to_string()));
        }
        if let Some(&id) = traversal.iter().find(|&&id| id >= library.size()) {
            return Err(SearchError::InvalidProgram(format!("unknown token id {}", id)));
        }
        if traversal
            .iter()
            .any(|&id| matches!(library.token(id).kind, TokenKind::Anchor(_)))
        {
            return Err(SearchError::InvalidProgram(
                "anchor token in learned traversal".to_string(),
            ));
        }
        if ExprNode::from_prefix(&traversal, |id| library.arity(id)).is_none() {
            return Err(SearchError::InvalidProgram(format!(
                "traversal [{}] is not a complete expression",
                library.names(&traversal).join(",")
            )));
        }

        let segments = action_spec.splice(&traversal);

        let mut constant_offsets = Vec::with_capacity(segments.len());
        let mut n_constants = 0;
        for segment in &segments {
            constant_offsets.push(n_constants);
            n_constants += segment
                .iter()
                .filter(|&&id| library.token(id).kind == TokenKind::Constant)
                .count();
        }

        let complexity = segments
            .iter()
            .flatten()
            .map(|&id| {
                let token = library.token(id);
                match (measure, token.kind) {
                    (_, TokenKind::Anchor(_)) => 0,
                    (ComplexityMeasure::Token, _) => token.complexity,
                    (ComplexityMeasure::Length, _) => 1,
                }
            })
            .sum();

        let key = segments
            .iter()
            .map(|segment| library.names(segment).join(","))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            library,
            traversal,
            segments,
            constant_offsets,
            constants: vec![initial_constant; n_constants],
            complexity,
            key,
            raw_reward: None,
            reward: None,
            failure: None,
        })
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    /// The learned (sampled) traversal
    pub fn traversal(&self) -> &[TokenId] {
        &self.traversal
    }

    pub fn segments(&self) -> &[Vec<TokenId>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.traversal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traversal.is_empty()
    }

    /// Canonical key used for deduplication and caching.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn complexity(&self) -> usize {
        self.complexity
    }

    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    pub fn num_constants(&self) -> usize {
        self.constants.len()
    }

    pub fn set_constants(&mut self, constants: Vec<f64>) {
        debug_assert_eq!(constants.len(), self.constants.len());
        self.constants = constants;
    }

    pub fn raw_reward(&self) -> Option<f64> {
        self.raw_reward
    }

    /// Penalized reward, once evaluated
    pub fn reward(&self) -> Option<f64> {
        self.reward
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn is_evaluated(&self) -> bool {
        self.reward.is_some()
    }

    pub fn apply_evaluation(&mut self, evaluation: &Evaluation) {
        if evaluation.constants.len() == self.constants.len() {
            self.constants = evaluation.constants.clone();
        }
        self.raw_reward = Some(evaluation.raw_reward);
        self.reward = Some(evaluation.reward);
        self.failure = evaluation.failure;
    }

    /// Override the penalized reward (running mean for stochastic tasks).
    pub fn set_reward(&mut self, reward: f64) {
        self.reward = Some(reward);
    }

    pub fn tree(&self, segment: usize) -> Option<ExprNode> {
        ExprNode::from_prefix(self.segments.get(segment)?, |id| self.library.arity(id))
    }

    /// Whether a segment is a bare anchor placeholder.
    pub fn is_anchor_segment(&self, segment: usize) -> bool {
        matches!(
            self.segments.get(segment).map(|s| s.as_slice()),
            Some([id]) if matches!(self.library.token(*id).kind, TokenKind::Anchor(_))
        )
    }

    /// Evaluate the first segment on input columns with the program's own constants.
    pub fn execute(&self, inputs: &[&[f64]]) -> Result<Vec<f64>> {
        self.execute_segment(0, inputs, &self.constants)
    }

    /// Evaluate one segment on input columns with an explicit constant vector.
    ///
    /// Rows are the length of the input columns (one row when there are no inputs).
    pub fn execute_segment(
        &self,
        segment: usize,
        inputs: &[&[f64]],
        constants: &[f64],
    ) -> Result<Vec<f64>> {
        let tokens = self.segments.get(segment).ok_or_else(|| {
            SearchError::InvalidProgram(format!("program has no segment {}", segment))
        })?;
        let n_rows = inputs.first().map_or(1, |column| column.len());
        let protected = self.library.protected();

        let segment_constants = tokens
            .iter()
            .filter(|&&id| self.library.token(id).kind == TokenKind::Constant)
            .count();
        // Walking backwards, constants are consumed from the last one of the segment
        let mut next_constant = self.constant_offsets[segment] + segment_constants;

        let mut stack: Vec<Vec<f64>> = Vec::with_capacity(tokens.len());
        for &id in tokens.iter().rev() {
            let token = self.library.token(id);
            let value = match token.kind {
                TokenKind::Function => {
                    let primitive = token.primitive().ok_or_else(|| {
                        SearchError::InvalidProgram(format!("token '{}' has no primitive", token.name))
                    })?;
                    if stack.len() < token.arity {
                        return Err(SearchError::InvalidProgram(format!(
                            "operator '{}' is missing arguments",
                            token.name
                        )));
                    }
                    let args: Vec<Vec<f64>> =
                        (0..token.arity).filter_map(|_| stack.pop()).collect();
                    let arg_refs: Vec<&[f64]> = args.iter().map(|a| a.as_slice()).collect();
                    primitive.execute(&arg_refs, protected)
                }
                TokenKind::Input(i) => inputs
                    .get(i)
                    .map(|column| column.to_vec())
                    .ok_or_else(|| {
                        SearchError::InvalidProgram(format!(
                            "input x{} is out of range ({} inputs)",
                            i + 1,
                            inputs.len()
                        ))
                    })?,
                TokenKind::Constant => {
                    next_constant -= 1;
                    let value = constants.get(next_constant).copied().ok_or_else(|| {
                        SearchError::InvalidProgram("missing constant value".to_string())
                    })?;
                    vec![value; n_rows]
                }
                TokenKind::Literal(value) => vec![value; n_rows],
                TokenKind::Anchor(dim) => {
                    return Err(SearchError::InvalidProgram(format!(
                        "anchor for dimension {} has no expression value",
                        dim
                    )))
                }
            };
            stack.push(value);
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(SearchError::InvalidProgram(
                "traversal does not reduce to a single value".to_string(),
            )),
        }
    }

    pub fn summary(&self) -> ProgramSummary {
        ProgramSummary {
            key: self.key.clone(),
            traversal: self
                .library
                .names(&self.traversal)
                .into_iter()
                .map(String::from)
                .collect(),
            expression: self.to_infix(),
            reward: self.reward,
            raw_reward: self.raw_reward,
            complexity: self.complexity,
            constants: self.constants.clone(),
        }
    }

    /// Human-readable form with fitted constants substituted.
    pub fn to_infix(&self) -> String {
        let rendered: Vec<String> = (0..self.segments.len())
            .map(|segment| self.render_segment(segment))
            .collect();
        if rendered.len() == 1 {
            rendered.into_iter().next().unwrap_or_default()
        } else {
            format!("[{}]", rendered.join(", "))
        }
    }

    fn render_segment(&self, segment: usize) -> String {
        let Some(tree) = self.tree(segment) else {
            return String::from("<invalid>");
        };
        let mut next_constant = self.constant_offsets[segment];
        self.render_node(&tree, &mut next_constant)
    }

    fn render_node(&self, node: &ExprNode, next_constant: &mut usize) -> String {
        let token = self.library.token(node.token);
        match token.kind {
            TokenKind::Function => {
                let args: Vec<String> = node
                    .children
                    .iter()
                    .map(|child| self.render_node(child, next_constant))
                    .collect();
                match token.primitive() {
                    Some(primitive) => primitive.render(&args),
                    None => format!("{}({})", token.name, args.join(", ")),
                }
            }
            TokenKind::Constant => {
                let value = self.constants.get(*next_constant).copied();
                *next_constant += 1;
                value.map_or_else(|| token.name.clone(), |v| format!("{:.4}", v))
            }
            _ => token.name.clone(),
        }
    }
}
