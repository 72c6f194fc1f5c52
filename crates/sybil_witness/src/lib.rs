//! Witnesses: traces reconstructed from satisfying assignments.
//!
//! A witness is an ordered sequence of time frames mapping qualified
//! names to concrete value expressions. Reconstruction reverses the
//! encoding: each bit of each visible symbol is timed, read from the
//! solver model (don't-cares default to 0) and decoded back into a
//! value. Defines are evaluated on demand by the recursive
//! [`Evaluator`].

pub mod evaluator;
pub mod store;
pub mod witness;

pub use evaluator::Evaluator;
pub use store::WitnessStore;
pub use witness::{reconstruct, TimeFrame, Witness};
