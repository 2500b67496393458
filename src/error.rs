use thiserror::Error;

use crate::ast::ExprId;

/// Classification of an inference failure.
///
/// The kind is stable API; `message` carries the human-readable detail
/// (including rendered types) and is not meant to be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unbound identifier")]
    UnboundIdentifier,
    #[error("arity mismatch")]
    ArityMismatch,
    #[error("type mismatch")]
    Mismatch,
    #[error("occurs check")]
    OccursCheck,
    #[error("row label missing")]
    RowLabelMissing,
    #[error("row label mismatch")]
    RowLabelMismatch,
    #[error("recursive row")]
    RecursiveRow,
    #[error("weak variable violation")]
    WeakViolation,
    #[error("size restriction")]
    SizeRestriction,
    #[error("unresolved constraint")]
    UnresolvedConstraint,
    #[error("invalid control flow")]
    ControlFlowInvalid,
    #[error("unexpected function type")]
    UnexpectedFunctionType,
    #[error("malformed input")]
    InternalMalformed,
}

/// A structured inference error.
///
/// The first failure aborts the inference walk; `at` identifies the
/// offending expression when the failure originated at (or was first
/// attributed to) an AST node.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TypeError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: Option<ExprId>,
}

impl TypeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        TypeError {
            kind,
            message: message.into(),
            at: None,
        }
    }

    /// Attribute the error to an expression unless already located.
    pub fn at(mut self, id: ExprId) -> Self {
        if self.at.is_none() {
            self.at = Some(id);
        }
        self
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        TypeError::new(ErrorKind::Mismatch, message)
    }

    pub fn unbound(name: &str) -> Self {
        TypeError::new(
            ErrorKind::UnboundIdentifier,
            format!("variable `{name}` is not defined"),
        )
    }
}
