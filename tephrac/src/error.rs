//! Error types for the backend.
//!
//! Two layers, matching how failures propagate:
//!
//! - [`BackendError`] - the execution engine or native target cannot be
//!   constructed. Fatal: surfaced once from session construction, nothing
//!   can be compiled without it.
//! - [`CompileError`] - everything else. Recoverable by design: each value
//!   carries the identity of the offending node, aborts only the current
//!   compilation, and leaves the session valid for subsequent requests.

use inkwell::builder::BuilderError;
use thiserror::Error;

use crate::tree::NodeId;

/// A per-compilation failure. Malformed or unsupported input never corrupts
/// session state or other compiled functions.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A tree-node shape the generator does not know how to lower.
    #[error("unsupported construct at {node}: {what}")]
    Unsupported { node: NodeId, what: String },

    /// A malformed type descriptor, or an unrecognized descriptor
    /// discriminator at any level.
    #[error("type error at {node}: {message}")]
    Type { node: NodeId, message: String },

    /// Unsupported multiplicity: multiple returns, wrong operand count,
    /// mismatched defvar variable/initializer counts.
    #[error("arity error at {node}: {message}")]
    Arity { node: NodeId, message: String },

    /// A required field is absent. A structural defect in the producer.
    #[error("malformed node {node}: missing field `{field}`")]
    MissingField { node: NodeId, field: &'static str },

    /// A required field holds the wrong payload kind.
    #[error("malformed node {node}: field `{field}` is not {expected}")]
    FieldKind {
        node: NodeId,
        field: &'static str,
        expected: &'static str,
    },

    /// An indexed element is absent or is not a node reference.
    #[error("malformed node {node}: element {index} is not a node reference")]
    ElementKind { node: NodeId, index: usize },

    /// A `var` expression was emitted before its definition's storage was
    /// materialized. A structural ordering defect in the producer.
    #[error("variable at {node} read before its storage was materialized")]
    UnboundVariable { node: NodeId },

    /// The session already compiled a function under this name. The first
    /// definition's code and entry pointer remain valid.
    #[error("duplicate definition of `{name}`")]
    DuplicateDefinition { name: String, node: NodeId },

    /// The generated function failed LLVM verification. A compiler-internal
    /// defect; the partially built function is discarded.
    #[error("generated function `{name}` failed verification")]
    Verification { name: String },

    /// An IR builder call failed.
    #[error("builder error: {0}")]
    Builder(#[from] BuilderError),

    /// Any other backend-reported failure (symbol lookup, engine refusal).
    #[error("backend failure: {0}")]
    Backend(String),
}

impl CompileError {
    pub fn unsupported(node: NodeId, what: impl Into<String>) -> Self {
        CompileError::Unsupported {
            node,
            what: what.into(),
        }
    }

    pub fn type_error(node: NodeId, message: impl Into<String>) -> Self {
        CompileError::Type {
            node,
            message: message.into(),
        }
    }

    pub fn arity(node: NodeId, message: impl Into<String>) -> Self {
        CompileError::Arity {
            node,
            message: message.into(),
        }
    }

    /// Identity of the node this error is attached to, when it has one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            CompileError::Unsupported { node, .. }
            | CompileError::Type { node, .. }
            | CompileError::Arity { node, .. }
            | CompileError::MissingField { node, .. }
            | CompileError::FieldKind { node, .. }
            | CompileError::ElementKind { node, .. }
            | CompileError::UnboundVariable { node }
            | CompileError::DuplicateDefinition { node, .. } => Some(*node),
            CompileError::Verification { .. }
            | CompileError::Builder(_)
            | CompileError::Backend(_) => None,
        }
    }
}

/// Backend infrastructure could not be brought up. Fatal at session start.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to initialize native target: {0}")]
    Target(String),

    #[error("failed to construct execution engine: {0}")]
    Engine(String),
}
