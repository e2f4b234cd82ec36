use crate::error::{Result, SearchError};
use crate::functions::{Library, TokenKind};
use crate::types::{ExprNode, TokenId};
use serde::{Deserialize, Serialize};

/// Configured role of one action dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSlot {
    /// Filled by the sampled traversal
    Learned,
    /// Driven by the anchor policy
    Anchor,
    /// Fixed traversal, comma-separated token names
    Fixed(String),
}

/// Action dimensions that an action spec hands to the anchor policy.
pub fn anchor_dims(slots: &[ActionSlot]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| **slot == ActionSlot::Anchor)
        .map(|(dim, _)| dim)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionSegment {
    Learned,
    Anchor(TokenId),
    Fixed(Vec<TokenId>),
}

/// Resolved action spec: how a learned traversal is spliced into per-dimension segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    segments: Vec<ActionSegment>,
}

impl ActionSpec {
    /// A single learned expression (regression).
    pub fn single() -> Self {
        Self {
            segments: vec![ActionSegment::Learned],
        }
    }

    pub fn resolve(slots: &[ActionSlot], library: &Library, action_dim: usize) -> Result<Self> {
        if slots.len() != action_dim {
            return Err(SearchError::Configuration(format!(
                "Action spec has {} entries but the environment has {} action dimensions",
                slots.len(),
                action_dim
            )));
        }
        let learned = slots.iter().filter(|s| **s == ActionSlot::Learned).count();
        if learned != 1 {
            return Err(SearchError::Configuration(format!(
                "Action spec must contain exactly one learned slot, found {}",
                learned
            )));
        }

        let segments = slots
            .iter()
            .enumerate()
            .map(|(dim, slot)| match slot {
                ActionSlot::Learned => Ok(ActionSegment::Learned),
                ActionSlot::Anchor => library
                    .anchor_id(dim)
                    .map(ActionSegment::Anchor)
                    .ok_or_else(|| {
                        SearchError::Configuration(format!(
                            "No anchor token for action dimension {}",
                            dim
                        ))
                    }),
                ActionSlot::Fixed(text) => {
                    let traversal = library.actionize(text)?;
                    Self::validate_fixed(&traversal, library, dim)?;
                    Ok(ActionSegment::Fixed(traversal))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    fn validate_fixed(traversal: &[TokenId], library: &Library, dim: usize) -> Result<()> {
        if traversal
            .iter()
            .any(|&id| matches!(library.token(id).kind, TokenKind::Anchor(_)))
        {
            return Err(SearchError::Configuration(format!(
                "Fixed traversal for dimension {} contains an anchor token",
                dim
            )));
        }
        if ExprNode::from_prefix(traversal, |id| library.arity(id)).is_none() {
            return Err(SearchError::Configuration(format!(
                "Fixed traversal for dimension {} is not a complete expression",
                dim
            )));
        }
        Ok(())
    }

    pub fn segments(&self) -> &[ActionSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Replace the learned slot with `learned`; anchors become single-token segments.
    pub fn splice(&self, learned: &[TokenId]) -> Vec<Vec<TokenId>> {
        self.segments
            .iter()
            .map(|segment| match segment {
                ActionSegment::Learned => learned.to_vec(),
                ActionSegment::Anchor(id) => vec![*id],
                ActionSegment::Fixed(traversal) => traversal.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{FunctionRegistry, LibrarySpec};

    fn library(anchor_dims: Vec<usize>) -> Library {
        let spec = LibrarySpec {
            function_set: vec!["add".into(), "mul".into(), "sin".into()],
            n_inputs: 2,
            anchor_dims,
            protected: false,
        };
        Library::build(&spec, &FunctionRegistry::new()).unwrap()
    }

    #[test]
    fn test_resolve_and_splice() {
        let slots = vec![
            ActionSlot::Fixed("add,x1,x2".into()),
            ActionSlot::Learned,
            ActionSlot::Anchor,
        ];
        let library = library(anchor_dims(&slots));
        let spec = ActionSpec::resolve(&slots, &library, 3).unwrap();

        let learned = library.actionize("sin,x1").unwrap();
        let segments = spec.splice(&learned);
        assert_eq!(segments.len(), 3);
        assert_eq!(library.names(&segments[0]), vec!["add", "x1", "x2"]);
        assert_eq!(segments[1], learned);
        assert_eq!(library.names(&segments[2]), vec!["anchor3"]);
    }

    #[test]
    fn test_resolve_rejects_bad_specs() {
        let library = library(vec![1]);

        // dimension mismatch
        let slots = vec![ActionSlot::Learned];
        assert!(ActionSpec::resolve(&slots, &library, 2).is_err());

        // two learned slots
        let slots = vec![ActionSlot::Learned, ActionSlot::Learned];
        assert!(ActionSpec::resolve(&slots, &library, 2).is_err());

        // incomplete fixed traversal
        let slots = vec![ActionSlot::Learned, ActionSlot::Fixed("add,x1".into())];
        assert!(ActionSpec::resolve(&slots, &library, 2).is_err());

        // anchor slot without an anchor token
        let slots = vec![ActionSlot::Anchor, ActionSlot::Learned];
        assert!(ActionSpec::resolve(&slots, &library, 2).is_err());
    }
}
