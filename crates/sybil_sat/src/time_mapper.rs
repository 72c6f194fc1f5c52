//! Time mapping: TCBIs to solver variables and back.
//!
//! The mapper keeps a bidirectional map between timed canonical bit
//! identifiers and kernel variables. The forward direction allocates on
//! first use; the inverse is what the witness extractor walks.

use std::collections::HashMap;

use sybil_expr::Tcbi;

use crate::solver::{Solver, Var};

#[derive(Default)]
pub struct TimeMapper {
    tcbi_to_var: HashMap<Tcbi, Var>,
    var_to_tcbi: HashMap<Var, Tcbi>,
}

impl TimeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// The solver variable for a TCBI, allocating one on first use.
    pub fn var(&mut self, solver: &mut Solver, tcbi: Tcbi) -> Var {
        if let Some(&v) = self.tcbi_to_var.get(&tcbi) {
            return v;
        }
        let v = solver.new_var();
        self.tcbi_to_var.insert(tcbi, v);
        self.var_to_tcbi.insert(v, tcbi);
        v
    }

    /// The TCBI already mapped to this variable, if any. Auxiliary
    /// variables (groups, template internals) have none.
    pub fn tcbi(&self, var: Var) -> Option<Tcbi> {
        self.var_to_tcbi.get(&var).copied()
    }

    /// Forward lookup without allocation.
    pub fn lookup(&self, tcbi: Tcbi) -> Option<Var> {
        self.tcbi_to_var.get(&tcbi).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sybil_expr::{ExprPool, Tcbi, Ucbi};

    #[test]
    fn var_allocates_once_per_tcbi() {
        let pool = ExprPool::new();
        let x = pool.make_ident("x");
        let mut solver = Solver::new();
        let mut mapper = TimeMapper::new();

        let t0 = Tcbi::new(Ucbi::new(x, 0, 0), 0);
        let t1 = Tcbi::new(Ucbi::new(x, 0, 0), 1);

        let v0 = mapper.var(&mut solver, t0);
        let v1 = mapper.var(&mut solver, t1);
        assert_ne!(v0, v1);
        assert_eq!(mapper.var(&mut solver, t0), v0);
        assert_eq!(solver.num_vars(), 2);
    }

    #[test]
    fn tcbi_is_the_inverse_of_var() {
        let pool = ExprPool::new();
        let x = pool.make_ident("x");
        let mut solver = Solver::new();
        let mut mapper = TimeMapper::new();

        let t = Tcbi::new(Ucbi::new(x, 1, 3), 2);
        let v = mapper.var(&mut solver, t);
        assert_eq!(mapper.tcbi(v), Some(t));
        assert_eq!(mapper.tcbi(solver.new_var()), None);
    }
}
