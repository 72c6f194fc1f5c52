//! Model-layer errors: resolution failures and semantic violations.

use std::fmt;

use sybil_expr::ExprId;
use sybil_type::TypeError;

/// An identifier could not be bound in any enclosing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    /// The qualified name that failed to resolve.
    pub expr: ExprId,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved symbol")
    }
}

impl std::error::Error for ResolutionError {}

/// A structural rule of the modelling language was violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    /// `input`/`frozen`/`inertial` conflict on one variable.
    ConflictingFlags { var: ExprId },
    /// Guards are only allowed at TRANS toplevel.
    GuardPlacement { expr: ExprId },
    /// Assignments are only allowed in TRANS sections.
    AssignPlacement { expr: ExprId },
    /// A guarded action must be an assignment.
    GuardedActionNotAssignment { expr: ExprId },
    /// Assignment target must be an inertial, non-input, non-frozen
    /// lvalue.
    BadAssignTarget { expr: ExprId },
    /// Two local symbols share a name.
    DuplicateName { name: ExprId },
    /// Two modules share a name.
    DuplicateModule { name: sybil_base::Atom },
    /// An instance refers to a module the model does not contain.
    UnknownModule { expr: ExprId },
    /// Instantiation with the wrong number of actuals.
    ArityMismatch { expr: ExprId },
    /// A define call with the wrong number of actuals.
    DefineArity { expr: ExprId },
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::ConflictingFlags { .. } => {
                write!(f, "conflicting variable flags")
            }
            SemanticError::GuardPlacement { .. } => {
                write!(f, "guards are only allowed toplevel in TRANS sections")
            }
            SemanticError::AssignPlacement { .. } => {
                write!(f, "assignments are only allowed in TRANS sections")
            }
            SemanticError::GuardedActionNotAssignment { .. } => {
                write!(f, "guarded actions must be assignments")
            }
            SemanticError::BadAssignTarget { .. } => {
                write!(
                    f,
                    "assignment target must be an inertial, non-input, non-frozen lvalue"
                )
            }
            SemanticError::DuplicateName { .. } => write!(f, "duplicate local name"),
            SemanticError::DuplicateModule { .. } => write!(f, "duplicate module name"),
            SemanticError::UnknownModule { .. } => write!(f, "unknown module"),
            SemanticError::ArityMismatch { .. } => {
                write!(f, "wrong number of instance parameters")
            }
            SemanticError::DefineArity { .. } => {
                write!(f, "wrong number of define arguments")
            }
        }
    }
}

impl std::error::Error for SemanticError {}

/// Any failure raised while building, resolving or checking a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    Resolution(ResolutionError),
    Type(TypeError),
    Semantic(SemanticError),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Resolution(e) => e.fmt(f),
            ModelError::Type(e) => e.fmt(f),
            ModelError::Semantic(e) => e.fmt(f),
        }
    }
}

impl From<ResolutionError> for ModelError {
    fn from(e: ResolutionError) -> Self {
        ModelError::Resolution(e)
    }
}

impl From<TypeError> for ModelError {
    fn from(e: TypeError) -> Self {
        ModelError::Type(e)
    }
}

impl From<SemanticError> for ModelError {
    fn from(e: SemanticError) -> Self {
        ModelError::Semantic(e)
    }
}

impl std::error::Error for ModelError {}
