use serde::{Deserialize, Serialize};

/// Stable index of a token inside a `Library`.
pub type TokenId = usize;

/// How a program's complexity is measured for penalties and the Pareto front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityMeasure {
    /// Sum of per-token complexity weights.
    #[default]
    Token,
    /// Number of tokens.
    Length,
}

/// Expression tree node derived from a prefix traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprNode {
    pub token: TokenId,
    pub children: Vec<ExprNode>,
}

impl ExprNode {
    /// Rebuild the tree of a complete prefix traversal.
    ///
    /// Returns `None` when the traversal does not close exactly at its last token.
    pub fn from_prefix(tokens: &[TokenId], arity: impl Fn(TokenId) -> usize) -> Option<ExprNode> {
        let mut position = 0;
        let node = Self::build(tokens, &arity, &mut position)?;
        if position == tokens.len() {
            Some(node)
        } else {
            None
        }
    }

    fn build(
        tokens: &[TokenId],
        arity: &impl Fn(TokenId) -> usize,
        position: &mut usize,
    ) -> Option<ExprNode> {
        let token = *tokens.get(*position)?;
        *position += 1;
        let children = (0..arity(token))
            .map(|_| Self::build(tokens, arity, position))
            .collect::<Option<Vec<_>>>()?;
        Some(ExprNode { token, children })
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ExprNode::size).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ExprNode::depth).max().unwrap_or(0)
    }

    /// Prefix-order token listing; inverse of `from_prefix`.
    pub fn to_prefix(&self) -> Vec<TokenId> {
        let mut out = Vec::with_capacity(self.size());
        self.collect_prefix(&mut out);
        out
    }

    fn collect_prefix(&self, out: &mut Vec<TokenId>) {
        out.push(self.token);
        for child in &self.children {
            child.collect_prefix(out);
        }
    }
}
