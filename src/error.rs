//! Error types for model composition and elaboration.

use crate::model::Stage;
use thiserror::Error;

/// Result type used throughout the crate.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while composing, elaborating or exporting a model tree.
///
/// Every variant is raised at the point of violation; nothing is retried or
/// defaulted internally.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two nodes (or load groups) of the same tree share a name, or two
    /// synthesized symbol names coincide.
    #[error("name '{name}' is already used in this model tree")]
    NameCollision {
        /// The duplicated name.
        name: String,
    },

    /// Node names must be non-empty identifiers because symbol names are
    /// derived from them.
    #[error("'{name}' is not a valid model name (expected a non-empty identifier)")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A slot or binding rule was broken.
    #[error("constraint violated on '{node}': {reason}")]
    ConstraintViolation {
        /// The node whose slot or binding was involved.
        node: String,
        /// What went wrong.
        reason: String,
    },

    /// A stage (or the export) was requested out of order.
    #[error("cannot {operation} on '{node}' while it is {state:?}")]
    Ordering {
        /// The node that is not ready.
        node: String,
        /// The requested operation.
        operation: String,
        /// The state the node is currently in.
        state: Stage,
    },

    /// Something was queried before it exists.
    #[error("lookup failed: {what}")]
    Lookup {
        /// Description of the missing item.
        what: String,
    },

    /// A coordinate/speed partition does not match the exported system.
    #[error("invalid partition: {reason}")]
    Partition {
        /// Why the partition is inconsistent.
        reason: String,
    },

    /// The symbol interner refused a new name.
    #[error("symbol table cannot intern '{name}'")]
    SymbolTable {
        /// The name that could not be interned.
        name: String,
    },

    /// The algebra backend rejected an operation.
    #[error("mechanics backend: {0}")]
    Mechanics(#[from] MechanicsError),

    /// A configuration or parameter document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn violation(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn lookup(what: impl Into<String>) -> Self {
        Self::Lookup { what: what.into() }
    }

    pub(crate) fn ordering(
        node: impl Into<String>,
        operation: impl Into<String>,
        state: Stage,
    ) -> Self {
        Self::Ordering {
            node: node.into(),
            operation: operation.into(),
            state,
        }
    }

    pub(crate) fn partition(reason: impl Into<String>) -> Self {
        Self::Partition {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the planar mechanics backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MechanicsError {
    /// An object with this name already exists.
    #[error("an object named '{0}' already exists")]
    DuplicateName(String),

    /// The frame already has an orientation.
    #[error("frame '{0}' is already oriented")]
    AlreadyOriented(String),

    /// The point already has a position.
    #[error("point '{0}' is already located")]
    AlreadyLocated(String),

    /// The relation would close a cycle.
    #[error("relating '{0}' to '{1}' would create a cycle")]
    Cycle(String, String),

    /// Two objects do not share a common root.
    #[error("'{0}' and '{1}' are not connected")]
    Disconnected(String, String),

    /// A symbol has no numeric value during evaluation.
    #[error("no value for symbol '{0}'")]
    Unresolved(String),

    /// Only first and second time derivatives are represented.
    #[error("time derivative of order {order} of '{name}' is not supported")]
    DerivativeOrder {
        /// Symbol name.
        name: String,
        /// Requested derivative order.
        order: u8,
    },

    /// The Newtonian frame was declared twice.
    #[error("the Newtonian frame is already '{0}'")]
    NewtonianRedefined(String),
}
