//! The sybil type system.
//!
//! Types are canonical, interned descriptors: asking the [`TypeMgr`] for
//! the same description twice yields the same [`TypeId`]. Width and
//! signedness rules are fixed here; the inference table implemented by
//! [`TypeMgr::result_type`] is what the model-layer type checker applies
//! node by node.

pub mod error;
pub mod mgr;
pub mod types;

pub use error::TypeError;
pub use mgr::TypeMgr;
pub use types::{TypeDesc, TypeId};
