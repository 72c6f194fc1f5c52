//! The witness registry.
//!
//! Algorithms record witnesses under unique, auto-incremented ids
//! (`cex_1`, `sim_2`, ...); the trace dumpers read them back. The store
//! also tracks the current witness, the implicit target of `dump-trace`
//! and `simulate` continuations.

use std::collections::HashMap;
use std::fmt;

use crate::witness::Witness;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateId(String),
    UnknownId(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateId(id) => write!(f, "duplicate witness id `{}`", id),
            StoreError::UnknownId(id) => write!(f, "unknown witness id `{}`", id),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Default)]
pub struct WitnessStore {
    map: HashMap<String, Witness>,
    order: Vec<String>,
    current: Option<String>,
    autoincrement: u64,
}

impl WitnessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh witness id with the given prefix.
    pub fn auto_id(&mut self, prefix: &str) -> String {
        self.autoincrement += 1;
        format!("{}_{}", prefix, self.autoincrement)
    }

    /// Records a witness and makes it current.
    pub fn record(&mut self, witness: Witness) -> Result<(), StoreError> {
        let id = witness.id().to_string();
        if self.map.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        self.order.push(id.clone());
        self.current = Some(id.clone());
        self.map.insert(id, witness);
        Ok(())
    }

    pub fn witness(&self, id: &str) -> Result<&Witness, StoreError> {
        self.map
            .get(id)
            .ok_or_else(|| StoreError::UnknownId(id.to_string()))
    }

    pub fn current(&self) -> Option<&Witness> {
        self.current.as_deref().and_then(|id| self.map.get(id))
    }

    pub fn set_current(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.map.contains_key(id) {
            return Err(StoreError::UnknownId(id.to_string()));
        }
        self.current = Some(id.to_string());
        Ok(())
    }

    /// Recorded ids, oldest first.
    pub fn ids(&self) -> &[String] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_ids_increment() {
        let mut store = WitnessStore::new();
        assert_eq!(store.auto_id("sim"), "sim_1");
        assert_eq!(store.auto_id("cex"), "cex_2");
    }

    #[test]
    fn record_sets_current_and_rejects_duplicates() {
        let mut store = WitnessStore::new();
        store.record(Witness::new("w1", "first")).unwrap();
        assert_eq!(store.current().unwrap().id(), "w1");

        let dup = store.record(Witness::new("w1", "again"));
        assert!(matches!(dup, Err(StoreError::DuplicateId(_))));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let store = WitnessStore::new();
        assert!(matches!(
            store.witness("ghost"),
            Err(StoreError::UnknownId(_))
        ));
    }
}
