//! Compilation errors.

use std::fmt;

use sybil_expr::ExprId;
use sybil_model::ModelError;

#[derive(Debug, Clone)]
pub enum CompileError {
    /// Temporal operators (and TRANS constructs that survived analysis)
    /// cannot be compiled; LTL rewriting happens upstream.
    UnsupportedOperator { expr: ExprId },
    /// A module instance was used in value position.
    UnexpectedInstance { expr: ExprId },
    /// A constant does not fit the declared width.
    ConstantTooLarge { expr: ExprId, width: u32 },
    /// Resolution or typing failed mid-compile.
    Model(ModelError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnsupportedOperator { .. } => {
                write!(f, "operator not supported by the compiler")
            }
            CompileError::UnexpectedInstance { .. } => {
                write!(f, "module instance used in value position")
            }
            CompileError::ConstantTooLarge { width, .. } => {
                write!(f, "constant too large for width {}", width)
            }
            CompileError::Model(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ModelError> for CompileError {
    fn from(e: ModelError) -> Self {
        CompileError::Model(e)
    }
}

impl From<sybil_model::ResolutionError> for CompileError {
    fn from(e: sybil_model::ResolutionError) -> Self {
        CompileError::Model(ModelError::Resolution(e))
    }
}

impl From<sybil_type::TypeError> for CompileError {
    fn from(e: sybil_type::TypeError) -> Self {
        CompileError::Model(ModelError::Type(e))
    }
}
