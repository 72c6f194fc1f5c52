//! Symbolic compilation: from typed expressions to decision-diagram
//! vectors plus CNF-ready operator descriptors.
//!
//! The [`enc::EncodingMgr`] maps typed symbols to vectors of diagram bit
//! variables and keeps the bit → UCBI inverse map. The [`Compiler`]
//! walks expression trees and produces [`CompilationUnit`]s: result
//! diagrams plus sideband descriptors for the operators that are not
//! expanded into diagrams (wide arithmetic, selections, multiplexers).

pub mod compiler;
pub mod enc;
pub mod error;
pub mod unit;

pub use compiler::Compiler;
pub use enc::{DecodedValue, Encoding, EncodingKind, EncodingMgr};
pub use error::CompileError;
pub use unit::{
    BinarySelectionDescriptor, CompilationUnit, InlinedOp, InlinedOperatorDescriptor,
    MultiwaySelectionDescriptor, OpSignature, SelectionBranch,
};
