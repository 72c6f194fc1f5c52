//! Atom interning for O(1) identifier equality.
//!
//! Every identifier that enters the system is stored exactly once in an
//! [`AtomPool`]; consumers hold lightweight [`Atom`] handles and compare
//! them as integers. Unlike a single-threaded interner, the pool guards
//! its table with a mutex so that construction may be invoked from any
//! thread (expression construction is serialized the same way one level
//! up).
//!
//! ## Example
//!
//! ```
//! use sybil_base::AtomPool;
//!
//! let pool = AtomPool::new();
//! let a = pool.intern("state");
//! let b = pool.intern("state");
//! assert_eq!(a, b);
//! assert_eq!(&*pool.resolve(a), "state");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A handle to an interned string.
///
/// Atoms are `Copy` and compare in O(1) regardless of string length. Use
/// [`AtomPool::resolve`] to get the text back.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    /// The empty atom, always at index 0.
    pub const EMPTY: Atom = Atom(0);

    /// Internal index of this atom, usable for dense side tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Atom {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Default)]
struct Inner {
    map: HashMap<Arc<str>, Atom>,
    vec: Vec<Arc<str>>,
}

/// A deduplicating, thread-safe string pool.
///
/// Each unique string is stored once; interning it again returns the same
/// [`Atom`]. Strings are handed out as `Arc<str>` so callers never borrow
/// through the internal lock.
pub struct AtomPool {
    inner: Mutex<Inner>,
}

impl AtomPool {
    /// Creates a pool with only the empty string pre-interned.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        let empty: Arc<str> = Arc::from("");
        inner.map.insert(empty.clone(), Atom::EMPTY);
        inner.vec.push(empty);
        AtomPool {
            inner: Mutex::new(inner),
        }
    }

    /// Interns a string, returning its atom.
    pub fn intern(&self, s: &str) -> Atom {
        let mut inner = self.inner.lock().expect("atom pool poisoned");
        if let Some(&atom) = inner.map.get(s) {
            return atom;
        }
        let atom = Atom(inner.vec.len() as u32);
        let stored: Arc<str> = Arc::from(s);
        inner.vec.push(stored.clone());
        inner.map.insert(stored, atom);
        atom
    }

    /// Returns the text of an atom.
    ///
    /// # Panics
    ///
    /// Panics if `atom` was not created by this pool.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        let inner = self.inner.lock().expect("atom pool poisoned");
        inner.vec[atom.0 as usize].clone()
    }

    /// Looks up an atom without interning.
    pub fn lookup(&self, s: &str) -> Option<Atom> {
        let inner = self.inner.lock().expect("atom pool poisoned");
        inner.map.get(s).copied()
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("atom pool poisoned").vec.len()
    }

    /// True if nothing beyond the empty string has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for AtomPool {
    fn default() -> Self {
        Self::new()
    }
}
