use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    /// A sibling group's specified weights break the 100% rule.
    #[error("{message}")]
    WeightLimitExceeded { message: String },

    /// Ancestor walk gave up on a leaf or category. Logged, never returned to IPC callers.
    #[error("unresolvable ancestor chain for {node}: {reason}")]
    UnresolvableAncestorChain { node: String, reason: String },

    /// Re-parenting a category would put it under itself or one of its descendants.
    #[error("category {category_id} cannot be moved under itself or its descendants")]
    CyclicCategory { category_id: i64 },
}

impl WeightError {
    pub fn code(&self) -> &'static str {
        match self {
            WeightError::WeightLimitExceeded { .. } => "weight_exceeds_limit",
            WeightError::UnresolvableAncestorChain { .. } => "ancestor_chain_unresolved",
            WeightError::CyclicCategory { .. } => "bad_params",
        }
    }
}
