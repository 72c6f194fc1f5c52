//! SAT-based algorithms: compiled FSM handling, bounded model checking,
//! simulation and consistency checks.
//!
//! Each algorithm owns its engine and receives it explicitly; the only
//! shared state is the read-only model and the managers in the
//! [`Context`]. Cancellation is polled between injections and solves.

pub mod bmc;
pub mod check;
pub mod sim;

use sybil_compile::{CompilationUnit, Compiler};
use sybil_expr::{ExprId, Step, Tcbi, TimedExpr, FROZEN};
use sybil_model::Model;
use sybil_sat::{Engine, Group, Lit};
use tracing::debug;

use crate::context::Context;
use crate::error::Error;

/// The compiled FSM: one unit per section body per instance.
pub struct Fsm {
    init: Vec<CompilationUnit>,
    invar: Vec<CompilationUnit>,
    trans: Vec<CompilationUnit>,
}

impl Fsm {
    /// Compiles every INIT/INVAR/TRANS fragment of every instance,
    /// walking the hierarchy from `main`.
    pub fn compile(
        ctx: &Context,
        model: &Model,
        compiler: &mut Compiler,
    ) -> Result<Fsm, Error> {
        let mut fsm = Fsm {
            init: Vec::new(),
            invar: Vec::new(),
            trans: Vec::new(),
        };

        for &(ictx, index) in model.instances() {
            let module = &model.modules()[index];
            for &body in module.init() {
                debug!(body = %ctx.pool.display(body), "processing INIT");
                fsm.init.push(compiler.process(ictx, body)?);
            }
            for &body in module.invar() {
                debug!(body = %ctx.pool.display(body), "processing INVAR");
                fsm.invar.push(compiler.process(ictx, body)?);
            }
            for &body in module.trans() {
                debug!(body = %ctx.pool.display(body), "processing TRANS");
                fsm.trans.push(compiler.process(ictx, body)?);
            }
        }
        Ok(fsm)
    }

    pub fn assert_init(
        &self,
        ctx: &Context,
        engine: &mut Engine,
        time: Step,
        group: Group,
    ) -> Result<(), Error> {
        debug!(time, fragments = self.init.len(), "CNFizing INIT");
        for unit in &self.init {
            engine.push(&ctx.dd, &ctx.enc, unit, time, group)?;
        }
        Ok(())
    }

    pub fn assert_invar(
        &self,
        ctx: &Context,
        engine: &mut Engine,
        time: Step,
        group: Group,
    ) -> Result<(), Error> {
        debug!(time, fragments = self.invar.len(), "CNFizing INVAR");
        for unit in &self.invar {
            engine.push(&ctx.dd, &ctx.enc, unit, time, group)?;
        }
        Ok(())
    }

    pub fn assert_trans(
        &self,
        ctx: &Context,
        engine: &mut Engine,
        time: Step,
        group: Group,
    ) -> Result<(), Error> {
        debug!(time, fragments = self.trans.len(), "CNFizing TRANS");
        for unit in &self.trans {
            engine.push(&ctx.dd, &ctx.enc, unit, time, group)?;
        }
        Ok(())
    }
}

/// Asserts a single formula unit at `time`.
pub fn assert_formula(
    ctx: &Context,
    engine: &mut Engine,
    unit: &CompilationUnit,
    time: Step,
    group: Group,
) -> Result<(), Error> {
    debug!(time, "CNFizing formula");
    engine.push(&ctx.dd, &ctx.enc, unit, time, group)?;
    Ok(())
}

/// Uniqueness constraint between two unrolling frames: under `group`,
/// at least one bit of one non-input, non-temporary state variable
/// differs between steps `j` and `k`.
pub fn assert_uniqueness(
    ctx: &Context,
    model: &Model,
    engine: &mut Engine,
    j: Step,
    k: Step,
    group: Group,
) {
    debug!(j, k, "CNFizing uniqueness");
    let mut difference_vars = Vec::new();

    for (vctx, var) in model.each_variable() {
        if var.input || var.temp || ctx.tm.is_instance(var.ty) {
            continue;
        }
        let fqn = ctx.pool.make_dot(vctx, var.name);
        let key_time = if var.frozen { FROZEN } else { 0 };
        let Some(encoding) = ctx.enc.find_encoding(TimedExpr::new(fqn, key_time)) else {
            continue;
        };

        for &bit in &encoding.bits {
            let ucbi = ctx.enc.find_ucbi(bit);
            let jvar = engine.tcbi_var(Tcbi::new(ucbi, j));
            let kvar = engine.tcbi_var(Tcbi::new(ucbi, k));

            // u -> (jvar != kvar)
            let u = engine.new_sat_var();
            difference_vars.push(u);
            engine.add_clause(vec![
                Lit::negative(u),
                Lit::negative(jvar),
                Lit::negative(kvar),
            ]);
            engine.add_clause(vec![
                Lit::negative(u),
                Lit::positive(jvar),
                Lit::positive(kvar),
            ]);
        }
    }

    // ... and some difference variable must hold
    let mut clause = vec![Lit::negative(group)];
    clause.extend(difference_vars.into_iter().map(Lit::positive));
    engine.add_clause(clause);
}

/// True when the expression contains an LTL operator.
pub fn has_temporal(ctx: &Context, expr: ExprId) -> bool {
    let pool = &ctx.pool;
    if pool.kind(expr).is_temporal() {
        return true;
    }
    match pool.node(expr).data {
        sybil_expr::ExprData::Unary(l) => has_temporal(ctx, l),
        sybil_expr::ExprData::Binary(l, r) => {
            has_temporal(ctx, l) || has_temporal(ctx, r)
        }
        _ => false,
    }
}
