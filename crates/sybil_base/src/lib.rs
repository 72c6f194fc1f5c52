//! Structural atoms shared by every sybil crate.
//!
//! This crate holds the pieces with no domain knowledge at all: the
//! deduplicating atom pool, byte-offset source spans, and the spanned
//! error type used by the surface-language front end.

pub mod error;
pub mod intern;
pub mod span;

pub use error::{Result, SpannedError};
pub use intern::{Atom, AtomPool};
pub use span::Span;
