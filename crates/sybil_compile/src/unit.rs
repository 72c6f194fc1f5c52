//! Compilation units and operator descriptors.
//!
//! A unit is the compiler's output for one `(context, body)` pair: the
//! result diagram vector plus the sideband descriptors the CNFiser
//! materialises later. Operators that would blow up as diagrams leave
//! fresh result bits behind and a descriptor saying how to constrain
//! them.

use std::fmt;

use sybil_dd::AddId;

/// Operators compiled through clause templates instead of diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlinedOp {
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BwAnd,
    BwOr,
    BwXor,
    BwXnor,
}

impl InlinedOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            InlinedOp::Mul => "mul",
            InlinedOp::Div => "div",
            InlinedOp::Mod => "mod",
            InlinedOp::Shl => "shl",
            InlinedOp::Shr => "shr",
            InlinedOp::BwAnd => "and",
            InlinedOp::BwOr => "or",
            InlinedOp::BwXor => "xor",
            InlinedOp::BwXnor => "xnor",
        }
    }
}

/// Microcode signature: one clause template per distinct value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpSignature {
    pub op: InlinedOp,
    pub width: u32,
    pub signed: bool,
}

impl fmt::Display for OpSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}{}",
            self.op.mnemonic(),
            if self.signed { "s" } else { "u" },
            self.width
        )
    }
}

/// A wide operator left for template inlining: inputs are diagram
/// vectors (little endian), the result is a vector of fresh bit
/// variables.
#[derive(Debug, Clone)]
pub struct InlinedOperatorDescriptor {
    pub sig: OpSignature,
    pub lhs: Vec<AddId>,
    pub rhs: Vec<AddId>,
    pub res: Vec<u32>,
}

/// One arm of a fused selection: its condition diagram, the fresh bit
/// the condition is bound to at injection time, and the branch value.
#[derive(Debug, Clone)]
pub struct SelectionBranch {
    pub cond: AddId,
    pub cond_bit: u32,
    pub then_bits: Vec<AddId>,
}

/// A fused algebraic selection: a whole right-spine ITE chain collapsed
/// into one priority multiplexer. `res` takes the first branch whose
/// condition holds, or `else_bits` when none does; a single-armed
/// descriptor is the plain binary `res = cond ? then : else`.
#[derive(Debug, Clone)]
pub struct BinarySelectionDescriptor {
    /// Chain arms, outermost condition first.
    pub branches: Vec<SelectionBranch>,
    pub else_bits: Vec<AddId>,
    pub res: Vec<u32>,
}

/// A non-constant array subscript: a multiplexer over all elements.
#[derive(Debug, Clone)]
pub struct MultiwaySelectionDescriptor {
    pub elem_width: u32,
    pub nelems: u32,
    pub index_bits: Vec<AddId>,
    pub array_bits: Vec<AddId>,
    pub res: Vec<u32>,
}

/// Output of one compile: result diagrams plus descriptor sidebands.
///
/// Each selection descriptor covers a whole ITE chain: nested
/// else-branch cascades are collapsed before they get here, so one
/// multi-way choice costs one result vector, not a cascade of them.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub dds: Vec<AddId>,
    pub inlined: Vec<InlinedOperatorDescriptor>,
    pub selections: Vec<BinarySelectionDescriptor>,
    pub multiway: Vec<MultiwaySelectionDescriptor>,
}

impl CompilationUnit {
    /// True when asserting this unit needs no descriptor clauses.
    pub fn is_pure(&self) -> bool {
        self.inlined.is_empty() && self.selections.is_empty() && self.multiway.is_empty()
    }
}
