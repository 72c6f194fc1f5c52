//! sybil: a bounded symbolic model checker.
//!
//! The driver crate ties the pipeline together: the surface-language
//! front end ([`lexer`], [`parser`]), the shared manager [`context`],
//! the SAT-based [`algorithms`], the command [`interpreter`](cmd) and
//! the [`trace`] dumpers.

pub mod algorithms;
pub mod cmd;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod trace;

pub use context::Context;
pub use error::Error;
