use crate::error::{Result, SearchError};
use crate::functions::registry::FunctionRegistry;
use crate::functions::traits::Primitive;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the free-constant placeholder in function sets.
pub const CONSTANT_NAME: &str = "const";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Operator backed by a registry primitive
    Function,
    /// Input variable, zero-based column index
    Input(usize),
    /// Free constant resolved by the constant optimizer
    Constant,
    /// Fixed numeric value
    Literal(f64),
    /// Placeholder for an action dimension driven by the anchor policy
    Anchor(usize),
}

#[derive(Clone)]
pub struct Token {
    pub name: String,
    pub arity: usize,
    pub complexity: usize,
    pub kind: TokenKind,
    primitive: Option<Arc<dyn Primitive>>,
}

impl Token {
    fn terminal(name: String, kind: TokenKind, complexity: usize) -> Self {
        Self {
            name,
            arity: 0,
            complexity,
            kind,
            primitive: None,
        }
    }

    pub fn primitive(&self) -> Option<&Arc<dyn Primitive>> {
        self.primitive.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.arity == 0
    }

    pub fn is_trig(&self) -> bool {
        self.primitive.as_ref().is_some_and(|p| p.is_trig())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("complexity", &self.complexity)
            .field("kind", &self.kind)
            .finish()
    }
}

/// What a task asks the library to contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySpec {
    /// Operator aliases, `const`, and float literals
    pub function_set: Vec<String>,
    /// Number of input variables, exposed as `x1..xN`
    pub n_inputs: usize,
    /// Action dimensions driven by the anchor policy
    #[serde(default)]
    pub anchor_dims: Vec<usize>,
    #[serde(default)]
    pub protected: bool,
}

/// Immutable token catalog shared by every component of a run.
#[derive(Debug)]
pub struct Library {
    tokens: Vec<Token>,
    names: HashMap<String, TokenId>,
    protected: bool,
    terminals: Vec<TokenId>,
    unary: Vec<TokenId>,
    binary: Vec<TokenId>,
    inputs: Vec<TokenId>,
    constants: Vec<TokenId>,
    anchors: Vec<TokenId>,
}

impl Library {
    pub fn build(spec: &LibrarySpec, registry: &FunctionRegistry) -> Result<Self> {
        let mut tokens = Vec::new();

        for name in &spec.function_set {
            let name = name.trim();
            if name == CONSTANT_NAME {
                tokens.push(Token::terminal(name.to_string(), TokenKind::Constant, 1));
            } else if let Some(primitive) = registry.get_primitive(name) {
                tokens.push(Token {
                    name: name.to_string(),
                    arity: primitive.arity(),
                    complexity: primitive.complexity(),
                    kind: TokenKind::Function,
                    primitive: Some(primitive),
                });
            } else if let Ok(value) = name.parse::<f64>() {
                if !value.is_finite() {
                    return Err(SearchError::Configuration(format!(
                        "Literal token '{}' is not finite",
                        name
                    )));
                }
                tokens.push(Token::terminal(name.to_string(), TokenKind::Literal(value), 1));
            } else {
                return Err(SearchError::Configuration(format!(
                    "Unknown token '{}' in function set",
                    name
                )));
            }
        }

        for i in 0..spec.n_inputs {
            tokens.push(Token::terminal(format!("x{}", i + 1), TokenKind::Input(i), 1));
        }
        // Anchors are never sampled so they carry no complexity
        for &dim in &spec.anchor_dims {
            tokens.push(Token::terminal(anchor_name(dim), TokenKind::Anchor(dim), 0));
        }

        let mut names = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            if names.insert(token.name.clone(), id).is_some() {
                return Err(SearchError::Configuration(format!(
                    "Duplicate token '{}'",
                    token.name
                )));
            }
        }

        let ids_where = |pred: &dyn Fn(&Token) -> bool| -> Vec<TokenId> {
            tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| pred(t))
                .map(|(id, _)| id)
                .collect()
        };
        let terminals = ids_where(&|t| t.arity == 0 && !matches!(t.kind, TokenKind::Anchor(_)));
        let unary = ids_where(&|t| t.arity == 1);
        let binary = ids_where(&|t| t.arity == 2);
        let inputs = ids_where(&|t| matches!(t.kind, TokenKind::Input(_)));
        let constants = ids_where(&|t| t.kind == TokenKind::Constant);
        let anchors = ids_where(&|t| matches!(t.kind, TokenKind::Anchor(_)));

        if terminals.is_empty() {
            return Err(SearchError::Configuration(
                "Library has no terminal tokens (inputs, constants or literals)".to_string(),
            ));
        }

        log::debug!(
            "Built library with {} tokens ({} terminals, {} unary, {} binary)",
            tokens.len(),
            terminals.len(),
            unary.len(),
            binary.len()
        );

        Ok(Self {
            tokens,
            names,
            protected: spec.protected,
            terminals,
            unary,
            binary,
            inputs,
            constants,
            anchors,
        })
    }

    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn arity(&self, id: TokenId) -> usize {
        self.tokens[id].arity
    }

    pub fn token(&self, id: TokenId) -> &Token {
        &self.tokens[id]
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn lookup(&self, name: &str) -> Option<TokenId> {
        self.names.get(name).copied()
    }

    pub fn protected(&self) -> bool {
        self.protected
    }

    /// Parse a comma-separated list of token names into a traversal.
    pub fn actionize(&self, text: &str) -> Result<Vec<TokenId>> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                self.lookup(name).ok_or_else(|| {
                    SearchError::Configuration(format!("Unknown token '{}' in traversal", name))
                })
            })
            .collect()
    }

    /// Token names of a traversal, in order
    pub fn names(&self, traversal: &[TokenId]) -> Vec<&str> {
        traversal.iter().map(|&id| self.tokens[id].name.as_str()).collect()
    }

    pub fn terminals(&self) -> &[TokenId] {
        &self.terminals
    }

    pub fn unary(&self) -> &[TokenId] {
        &self.unary
    }

    pub fn binary(&self) -> &[TokenId] {
        &self.binary
    }

    pub fn inputs(&self) -> &[TokenId] {
        &self.inputs
    }

    pub fn constants(&self) -> &[TokenId] {
        &self.constants
    }

    pub fn anchors(&self) -> &[TokenId] {
        &self.anchors
    }

    pub fn anchor_id(&self, dim: usize) -> Option<TokenId> {
        self.lookup(&anchor_name(dim))
    }

    pub fn trig_ids(&self) -> Vec<TokenId> {
        (0..self.size()).filter(|&id| self.tokens[id].is_trig()).collect()
    }

    /// Token that undoes `id`, when both are present in the library.
    pub fn inverse_of(&self, id: TokenId) -> Option<TokenId> {
        let inverse = self.tokens[id].primitive()?.inverse()?;
        self.lookup(inverse)
    }

    /// All (operator, inverse) pairs present in the library
    pub fn inverse_pairs(&self) -> Vec<(TokenId, TokenId)> {
        (0..self.size())
            .filter_map(|id| self.inverse_of(id).map(|inv| (id, inv)))
            .collect()
    }
}

pub fn anchor_name(dim: usize) -> String {
    format!("anchor{}", dim + 1)
}
