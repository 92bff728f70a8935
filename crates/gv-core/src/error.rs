//! Error types shared by the view engine.
//!
//! None of these are fatal. The undo/redo no-ops and selection-size errors
//! are surfaced as disabled controls; fetch failures leave the view untouched
//! and can be retried by repeating the user action.

use crate::id::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("expected exactly {expected} selected entities, found {found}")]
    InvalidSelectionSize { expected: usize, found: usize },

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("entity {0} is not in the view")]
    UnknownEntity(EntityId),

    #[error("entity {0} is not a node")]
    NotANode(EntityId),

    #[error("edge {edge} references missing node {node}")]
    MissingEndpoint { edge: EntityId, node: EntityId },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Failure inside a layout computation. The orchestrator turns these into a
/// cancelled run and keeps the previous positions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("parameters for {expected} do not match the requested algorithm")]
    ParamsMismatch { expected: &'static str },

    #[error("layout computation failed: {0}")]
    Failed(String),
}

pub type ViewResult<T> = Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ViewError::InvalidSelectionSize {
            expected: 2,
            found: 3,
        };
        assert_eq!(err.to_string(), "expected exactly 2 selected entities, found 3");

        let err = ViewError::UnknownEntity(EntityId::intern("Ghost"));
        assert_eq!(err.to_string(), "entity Ghost is not in the view");

        let err = ViewError::MissingEndpoint {
            edge: EntityId::intern("Ben->Ghost"),
            node: EntityId::intern("Ghost"),
        };
        assert_eq!(err.to_string(), "edge Ben->Ghost references missing node Ghost");
    }
}
