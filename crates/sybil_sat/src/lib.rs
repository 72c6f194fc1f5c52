//! The SAT layer: kernel, time mapping, operator microcode, and the
//! engine that turns compilation units into time-stamped clauses.
//!
//! The kernel is deliberately small: a watched-literal DPLL procedure
//! with assumptions, behind the narrow interface the engine needs
//! (`new_var`, `add_clause`, `solve(assumptions)`, `value`). Everything
//! incremental is layered on top with group literals: each injected
//! clause carries its group's negated literal, active groups are passed
//! as positive assumptions, and retiring a group asserts the negation.

mod builder;
pub mod engine;
pub mod error;
pub mod microcode;
pub mod solver;
pub mod time_mapper;

pub use engine::{Engine, Group};
pub use error::EngineError;
pub use microcode::MicrocodeCache;
pub use solver::{Lit, SolveResult, Solver, Var};
pub use time_mapper::TimeMapper;
