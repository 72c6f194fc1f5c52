//! Type errors, raised with the offending AST node attached.

use std::fmt;

use sybil_expr::ExprId;

/// A failed type-level check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The node has a type outside the set its context allows.
    BadType { expr: ExprId, expected: &'static str },
    /// Two operands that must agree do not.
    TypeMismatch { expr: ExprId },
    /// An identifier was required (enum literal position, lvalue).
    IdentifierExpected { expr: ExprId },
    /// The same literal appears twice in an enum declaration.
    DuplicateLiteral { expr: ExprId },
}

impl TypeError {
    /// The AST node the error is attached to.
    pub fn expr(&self) -> ExprId {
        match *self {
            TypeError::BadType { expr, .. }
            | TypeError::TypeMismatch { expr }
            | TypeError::IdentifierExpected { expr }
            | TypeError::DuplicateLiteral { expr } => expr,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::BadType { expected, .. } => {
                write!(f, "bad type, expected {}", expected)
            }
            TypeError::TypeMismatch { .. } => write!(f, "operand types do not agree"),
            TypeError::IdentifierExpected { .. } => write!(f, "identifier expected"),
            TypeError::DuplicateLiteral { .. } => write!(f, "duplicate literal"),
        }
    }
}

impl std::error::Error for TypeError {}
