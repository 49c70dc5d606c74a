//! Error types for graph construction and input mutation.
//!
//! Only configuration errors are represented here. Consistency violations
//! (reading a disposed node, reentrant propagation) are programming errors
//! and panic.

use thiserror::Error;

use crate::graph::NodeId;
use crate::value::ValueType;

/// Errors produced while building a graph or mutating its inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The handle does not refer to a live node in this graph.
    #[error("unknown or disposed node: NodeId({id})", id = id.raw())]
    UnknownNode { id: NodeId },

    /// A collection was required but the node produces a scalar.
    #[error("node NodeId({id}) is not a collection", id = id.raw())]
    NotACollection { id: NodeId },

    /// An operation only valid on an input node was applied elsewhere.
    #[error("node NodeId({id}) is not a {expected}", id = id.raw())]
    NotAnInput { id: NodeId, expected: &'static str },

    /// A lambda input name has no binding in the evaluation context.
    #[error("no binding named '{name}' in scope")]
    MissingBinding { name: String },

    /// A name was bound twice in the same scope.
    #[error("'{name}' is already bound in this scope")]
    DuplicateBinding { name: String },

    /// A value or lambda has the wrong declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    /// A fold operator cannot aggregate elements of this type.
    #[error("{fold} cannot fold elements of type {found}")]
    UnsupportedFold {
        fold: &'static str,
        found: ValueType,
    },

    /// A position or range falls outside a source sequence.
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
