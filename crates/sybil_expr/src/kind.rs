//! Expression node tags.

/// The operator (or leaf class) of an expression node.
///
/// The split mirrors the surface language: temporal operators only ever
/// appear in property position, `Assign`/`Guard` only inside TRANS
/// sections (the analyzer erases both before compilation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    // linear temporal logic
    F,
    G,
    X,
    U,
    R,

    /// Time shift, arbitrarily nestable.
    Next,

    // arithmetic
    Neg,
    Add,
    Sub,
    Div,
    Mul,
    Mod,

    // bitwise
    BwNot,
    BwAnd,
    BwOr,
    BwXor,
    BwXnor,

    // logical
    Not,
    And,
    Or,
    Implies,
    Iff,

    // shifts
    Lshift,
    Rshift,

    // casts: lhs is a `TypeTag`, rhs the operand
    TypeTag,
    Cast,

    // relational
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,

    /// Ternary selection; always `Ite(Cond(c, then), else)`.
    Ite,
    Cond,

    // identifiers
    Ident,
    Dot,

    // TRANS-section constructs, erased by analysis
    Assign,
    Guard,

    /// Parameter application `instance(actuals)`.
    Params,

    /// Array indexing.
    Subscript,

    /// Non-deterministic choice `{...}`, wrapping a `Comma` chain.
    Set,
    Comma,

    // numeric constants, by radix
    IConst,
    HConst,
    OConst,
    FConst,

    /// The distinguished undefined value.
    Undef,
}

impl ExprKind {
    /// True for the four numeric-constant leaves.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst | ExprKind::FConst
        )
    }

    /// True for the LTL operators.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ExprKind::F | ExprKind::G | ExprKind::X | ExprKind::U | ExprKind::R
        )
    }

    /// True for operators taking exactly one operand.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            ExprKind::F
                | ExprKind::G
                | ExprKind::X
                | ExprKind::Next
                | ExprKind::Neg
                | ExprKind::Not
                | ExprKind::BwNot
                | ExprKind::Set
        )
    }

    /// True for the binary relational operators.
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            ExprKind::Eq
                | ExprKind::Ne
                | ExprKind::Ge
                | ExprKind::Gt
                | ExprKind::Le
                | ExprKind::Lt
        )
    }

    /// True for binary arithmetic operators.
    pub fn is_arithmetical(self) -> bool {
        matches!(
            self,
            ExprKind::Add | ExprKind::Sub | ExprKind::Div | ExprKind::Mul | ExprKind::Mod
        )
    }

    /// True for binary connectives over booleans.
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            ExprKind::And | ExprKind::Or | ExprKind::Implies | ExprKind::Iff
        )
    }
}
