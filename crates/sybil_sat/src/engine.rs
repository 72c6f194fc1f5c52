//! The CNF engine.
//!
//! `push` turns a compilation unit into clauses at a given time step:
//! result diagrams are asserted by blocking every path to a non-true
//! terminal, operator descriptors are materialised from their clause
//! templates, and selection descriptors get their multiplexer clauses.
//! Every clause carries the negated literal of its group; solving
//! assumes the active groups, and retiring a group asserts its negation
//! so its clauses go vacuous for good.

use std::collections::HashMap;
use std::path::PathBuf;

use sybil_compile::{
    BinarySelectionDescriptor, CompilationUnit, EncodingMgr, InlinedOperatorDescriptor,
    MultiwaySelectionDescriptor,
};
use sybil_dd::{AddId, AddMgr, ERROR_VALUE};
use sybil_expr::{Step, Tcbi};
use tracing::debug;

use crate::error::EngineError;
use crate::microcode::MicrocodeCache;
use crate::solver::{Lit, SolveResult, Solver, Var};
use crate::time_mapper::TimeMapper;

/// A retractable clause group, named by its activation variable.
pub type Group = Var;

/// How an operand bit reaches the solver: as a constant, as an existing
/// variable, or through a fresh variable tied to its diagram.
#[derive(Clone, Copy)]
enum Bound {
    Const(bool),
    Literal(Lit),
}

pub struct Engine {
    solver: Solver,
    mapper: TimeMapper,
    microcode: MicrocodeCache,
    active_groups: Vec<Var>,
    main_group: Var,
}

impl Engine {
    pub fn new(microcode_dir: impl Into<PathBuf>) -> Self {
        let mut solver = Solver::new();
        let main_group = solver.new_var();
        Engine {
            solver,
            mapper: TimeMapper::new(),
            microcode: MicrocodeCache::new(microcode_dir),
            active_groups: vec![main_group],
            main_group,
        }
    }

    /// The permanent group.
    pub fn main_group(&self) -> Group {
        self.main_group
    }

    pub fn new_group(&mut self) -> Group {
        let g = self.solver.new_var();
        self.active_groups.push(g);
        g
    }

    /// Deactivates a group and asserts its negation: its clauses are
    /// satisfied from now on.
    pub fn retire_group(&mut self, group: Group) {
        self.active_groups.retain(|&g| g != group);
        self.solver.add_clause(vec![Lit::negative(group)]);
    }

    /// Drops a group from the assumption set without poisoning its
    /// clauses (it may be re-activated later).
    pub fn deactivate_group(&mut self, group: Group) {
        self.active_groups.retain(|&g| g != group);
    }

    pub fn new_sat_var(&mut self) -> Var {
        self.solver.new_var()
    }

    pub fn add_clause(&mut self, lits: Vec<Lit>) {
        self.solver.add_clause(lits);
    }

    /// The solver variable of a timed bit.
    pub fn tcbi_var(&mut self, tcbi: Tcbi) -> Var {
        self.mapper.var(&mut self.solver, tcbi)
    }

    pub fn tcbi_of(&self, var: Var) -> Option<Tcbi> {
        self.mapper.tcbi(var)
    }

    /// Forward lookup without allocating: `None` means the bit never
    /// reached the solver (outside the cone of influence).
    pub fn tcbi_lookup(&self, tcbi: Tcbi) -> Option<Var> {
        self.mapper.lookup(tcbi)
    }

    pub fn value(&self, var: Var) -> Option<bool> {
        self.solver.value(var)
    }

    /// Solves under the active groups plus any extra assumptions.
    pub fn solve(&mut self, extra: &[Lit]) -> SolveResult {
        let mut assumptions: Vec<Lit> = self
            .active_groups
            .iter()
            .map(|&g| Lit::positive(g))
            .collect();
        assumptions.extend_from_slice(extra);

        let started = std::time::Instant::now();
        let result = self.solver.solve(&assumptions);
        debug!(?result, elapsed = ?started.elapsed(), vars = self.solver.num_vars(), "solve");
        result
    }

    /// Injects a compilation unit at `time` under `group`.
    pub fn push(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        unit: &CompilationUnit,
        time: Step,
        group: Group,
    ) -> Result<(), EngineError> {
        let started = std::time::Instant::now();

        for &f in &unit.dds {
            self.assert_diagram(dd, enc, f, time, group);
        }
        for md in &unit.inlined {
            self.inject_inlined(dd, enc, md, time, group)?;
        }
        for desc in &unit.selections {
            self.inject_selection(dd, enc, desc, time, group);
        }
        for md in &unit.multiway {
            self.inject_multiway(dd, enc, md, time, group);
        }

        debug!(time, elapsed = ?started.elapsed(), "unit injected");
        Ok(())
    }

    // -- clause generation ---------------------------------------------------

    /// The positive literal of a diagram bit variable at `time`.
    fn bit_lit(&mut self, enc: &EncodingMgr, dd_var: u32, time: Step) -> Lit {
        let ucbi = enc.find_ucbi(dd_var);
        let tcbi = Tcbi::new(ucbi, time);
        Lit::positive(self.mapper.var(&mut self.solver, tcbi))
    }

    /// Blocks every path of `f` that does not reach the 1 terminal.
    /// Paths into the error terminal are blocked as well: an asserted
    /// formula cannot hold through an undefined value.
    fn assert_diagram(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        f: AddId,
        time: Step,
        group: Group,
    ) {
        let cubes = dd.blocked_cubes(f);
        for cube in cubes {
            let mut clause = Vec::with_capacity(cube.len() + 1);
            clause.push(Lit::negative(group));
            for (var, polarity) in cube {
                let lit = self.bit_lit(enc, var, time);
                clause.push(if polarity { !lit } else { lit });
            }
            self.solver.add_clause(clause);
        }
    }

    /// Binds an operand diagram bit: constants stay constants, bare
    /// variables map directly, anything else gets a fresh variable tied
    /// to the diagram path by path. Error-valued bits are left
    /// unconstrained.
    fn bind_bit(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        f: AddId,
        time: Step,
        group: Group,
    ) -> Bound {
        if let Some(v) = dd.constant_value(f) {
            if v == ERROR_VALUE {
                return Bound::Literal(Lit::positive(self.solver.new_var()));
            }
            return Bound::Const(v != 0);
        }
        if let Some(var) = dd.as_var(f) {
            return Bound::Literal(self.bit_lit(enc, var, time));
        }

        let aux = Lit::positive(self.solver.new_var());
        self.tie_to_diagram(dd, enc, f, time, group, aux);
        Bound::Literal(aux)
    }

    /// Emits `target <-> f` under the group, path by path.
    fn tie_to_diagram(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        f: AddId,
        time: Step,
        group: Group,
        target: Lit,
    ) {
        let mut paths: Vec<(Vec<(u32, bool)>, i64)> = Vec::new();
        dd.walk_paths(f, &mut |cube, leaf| paths.push((cube.to_vec(), leaf)));

        for (cube, leaf) in paths {
            if leaf == ERROR_VALUE {
                continue;
            }
            let mut clause = Vec::with_capacity(cube.len() + 2);
            clause.push(Lit::negative(group));
            for (var, polarity) in cube {
                let lit = self.bit_lit(enc, var, time);
                clause.push(if polarity { !lit } else { lit });
            }
            clause.push(if leaf != 0 { target } else { !target });
            self.solver.add_clause(clause);
        }
    }

    /// A descriptor result bit as a solver literal.
    fn res_lit(&mut self, enc: &EncodingMgr, dd_var: u32, time: Step) -> Lit {
        self.bit_lit(enc, dd_var, time)
    }

    fn inject_inlined(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        md: &InlinedOperatorDescriptor,
        time: Step,
        group: Group,
    ) -> Result<(), EngineError> {
        let template = self.microcode.require(md.sig)?;
        let w = md.sig.width as usize;

        let lhs: Vec<Bound> = md
            .lhs
            .iter()
            .map(|&f| self.bind_bit(dd, enc, f, time, group))
            .collect();
        let rhs: Vec<Bound> = md
            .rhs
            .iter()
            .map(|&f| self.bind_bit(dd, enc, f, time, group))
            .collect();
        let res: Vec<Lit> = md
            .res
            .iter()
            .map(|&v| self.res_lit(enc, v, time))
            .collect();

        let mut aux: HashMap<u32, Var> = HashMap::new();

        'clauses: for tclause in template.iter() {
            let mut clause = vec![Lit::negative(group)];
            for &tlit in tclause {
                let id = tlit.unsigned_abs();
                let positive = tlit > 0;
                let bound = if id as usize <= w {
                    Bound::Literal(res[id as usize - 1])
                } else if id as usize <= 2 * w {
                    lhs[id as usize - 1 - w]
                } else if id as usize <= 3 * w {
                    rhs[id as usize - 1 - 2 * w]
                } else {
                    let var = *aux
                        .entry(id)
                        .or_insert_with(|| self.solver.new_var());
                    Bound::Literal(Lit::positive(var))
                };
                match bound {
                    Bound::Const(b) => {
                        if b == positive {
                            continue 'clauses; // satisfied
                        }
                        // false literal: drop it
                    }
                    Bound::Literal(lit) => {
                        clause.push(if positive { lit } else { !lit });
                    }
                }
            }
            self.solver.add_clause(clause);
        }
        Ok(())
    }

    /// A fused selection is one priority multiplexer: arm `j` drives the
    /// result when its condition holds and no earlier one does, the else
    /// value when none does. For a single arm this degenerates to the
    /// plain binary form `(!c | !t | r), (!c | t | !r), (c | !e | r),
    /// (c | e | !r)`; deeper chains extend the guard prefix with the
    /// earlier condition bits instead of cascading result vectors.
    fn inject_selection(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        desc: &BinarySelectionDescriptor,
        time: Step,
        group: Group,
    ) {
        let res: Vec<Lit> = desc
            .res
            .iter()
            .map(|&v| self.res_lit(enc, v, time))
            .collect();

        // earlier arms' condition bits, satisfied clauses when one holds
        let mut prefix: Vec<Lit> = vec![Lit::negative(group)];

        for branch in &desc.branches {
            let cb = self.bit_lit(enc, branch.cond_bit, time);
            // bind the condition unless it already is this very bit
            if dd.as_var(branch.cond) != Some(branch.cond_bit) {
                self.tie_to_diagram(dd, enc, branch.cond, time, group, cb);
            }

            let bits: Vec<Bound> = branch
                .then_bits
                .iter()
                .map(|&f| self.bind_bit(dd, enc, f, time, group))
                .collect();
            for (i, &r) in res.iter().enumerate() {
                self.mux_clause(&prefix, Some(!cb), bits[i], true, r);
                self.mux_clause(&prefix, Some(!cb), bits[i], false, !r);
            }
            prefix.push(cb);
        }

        let else_bits: Vec<Bound> = desc
            .else_bits
            .iter()
            .map(|&f| self.bind_bit(dd, enc, f, time, group))
            .collect();
        for (i, &r) in res.iter().enumerate() {
            self.mux_clause(&prefix, None, else_bits[i], true, r);
            self.mux_clause(&prefix, None, else_bits[i], false, !r);
        }
    }

    /// One multiplexer clause: `prefix ∨ arm? ∨ branch? ∨ out` with the
    /// branch bit possibly constant. `negate_branch` selects the
    /// implication direction.
    fn mux_clause(
        &mut self,
        prefix: &[Lit],
        arm: Option<Lit>,
        branch: Bound,
        negate_branch: bool,
        out: Lit,
    ) {
        let mut clause = prefix.to_vec();
        if let Some(l) = arm {
            clause.push(l);
        }
        match branch {
            Bound::Const(b) => {
                // the branch literal is (b != negate_branch)
                if b != negate_branch {
                    return; // clause satisfied
                }
            }
            Bound::Literal(lit) => {
                clause.push(if negate_branch { !lit } else { lit });
            }
        }
        clause.push(out);
        self.solver.add_clause(clause);
    }

    fn inject_multiway(
        &mut self,
        dd: &AddMgr,
        enc: &EncodingMgr,
        md: &MultiwaySelectionDescriptor,
        time: Step,
        group: Group,
    ) {
        let index: Vec<Bound> = md
            .index_bits
            .iter()
            .map(|&f| self.bind_bit(dd, enc, f, time, group))
            .collect();
        let array: Vec<Bound> = md
            .array_bits
            .iter()
            .map(|&f| self.bind_bit(dd, enc, f, time, group))
            .collect();
        let res: Vec<Lit> = md
            .res
            .iter()
            .map(|&v| self.res_lit(enc, v, time))
            .collect();

        'values: for v in 0..md.nelems {
            // (index != v) as a disjunction of bit mismatches
            let mut mismatch: Vec<Lit> = Vec::with_capacity(index.len());
            for (k, &bound) in index.iter().enumerate() {
                let vk = (v >> k) & 1 == 1;
                match bound {
                    Bound::Const(b) => {
                        if b != vk {
                            continue 'values; // index can never equal v
                        }
                    }
                    Bound::Literal(lit) => {
                        mismatch.push(if vk { !lit } else { lit });
                    }
                }
            }

            for (i, &r) in res.iter().enumerate() {
                let a = array[(v * md.elem_width) as usize + i];
                let mut base = vec![Lit::negative(group)];
                base.extend_from_slice(&mismatch);

                // res_i <-> array_{v,i} when index = v
                match a {
                    Bound::Const(b) => {
                        let mut c1 = base.clone();
                        c1.push(if b { r } else { !r });
                        self.solver.add_clause(c1);
                    }
                    Bound::Literal(alit) => {
                        let mut c1 = base.clone();
                        c1.push(!alit);
                        c1.push(r);
                        self.solver.add_clause(c1);
                        let mut c2 = base;
                        c2.push(alit);
                        c2.push(!r);
                        self.solver.add_clause(c2);
                    }
                }
            }
        }
    }
}
