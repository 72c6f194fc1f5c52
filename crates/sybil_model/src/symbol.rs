//! Model symbols.
//!
//! Symbols are created during model construction and immutable
//! afterwards. Variables carry the flag set the analyzer polices:
//! `input` (chosen freely at every step), `frozen` (chosen once at step
//! 0), `inertial` (keeps its value unless a TRANS assignment changes it)
//! and `temp` (compiler-internal, hidden from witnesses).

use sybil_base::Atom;
use sybil_expr::ExprId;
use sybil_type::TypeId;

/// A state, input or frozen variable.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Name of the owning module.
    pub module: Atom,
    /// The identifier node of the variable's name.
    pub name: ExprId,
    pub ty: TypeId,
    pub input: bool,
    pub frozen: bool,
    pub inertial: bool,
    pub temp: bool,
    /// Hidden variables are omitted from witnesses.
    pub hidden: bool,
    /// Actual parameter expressions, for instance-typed variables.
    pub actuals: Vec<ExprId>,
}

impl Variable {
    pub fn new(module: Atom, name: ExprId, ty: TypeId) -> Self {
        Variable {
            module,
            name,
            ty,
            input: false,
            frozen: false,
            inertial: false,
            temp: false,
            hidden: false,
            actuals: Vec::new(),
        }
    }

    pub fn input(mut self) -> Self {
        self.input = true;
        self
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn inertial(mut self) -> Self {
        self.inertial = true;
        self
    }

    pub fn temp(mut self) -> Self {
        self.temp = true;
        self.hidden = true;
        self
    }

    pub fn with_actuals(mut self, actuals: Vec<ExprId>) -> Self {
        self.actuals = actuals;
        self
    }
}

/// A module-scoped named constant: typed, with a fixed value. Distinct
/// from [`Literal`], which belongs to an enum type rather than a
/// module.
///
/// Signed values are stored in two's complement; read them back with an
/// `as i64` cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    pub module: Atom,
    pub name: ExprId,
    pub ty: TypeId,
    pub value: u64,
}

/// A formal module parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub module: Atom,
    pub name: ExprId,
}

/// A define: a named expression body, optionally with formals.
#[derive(Debug, Clone)]
pub struct Define {
    pub module: Atom,
    pub name: ExprId,
    pub body: ExprId,
    /// Formal argument names; empty for plain defines.
    pub formals: Vec<ExprId>,
}

/// An enum literal with its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub name: Atom,
    pub ty: TypeId,
    pub value: u64,
}
