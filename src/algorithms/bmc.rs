//! Bounded reachability checking.
//!
//! For an invariant property `p`, the loop unrolls the FSM step by
//! step: at each bound `k` the negation `!p@k` is injected in a fresh
//! group and solved. SAT produces a counterexample trace; UNSAT retires
//! the group, asserts `p@k` as an invariant and deepens the unrolling.
//! If the unrolling itself goes UNSAT every execution has been covered
//! and the violation is unreachable outright; otherwise the search
//! stops undecided at the user-supplied cap.

use sybil_compile::Compiler;
use sybil_expr::{ExprId, Step};
use sybil_model::{Model, TypeChecker};
use sybil_sat::{Engine, SolveResult};
use sybil_witness::{reconstruct, Witness};
use tracing::{debug, info};

use crate::algorithms::{assert_formula, has_temporal, Fsm};
use crate::context::Context;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McStatus {
    /// A violating state is reachable; a witness was recorded.
    Reachable,
    /// The unrolling is exhausted: no execution violates the property.
    Unreachable,
    /// No violation up to the bound cap.
    Undecided,
    Interrupted,
}

pub struct VerifyOutcome {
    pub status: McStatus,
    pub witness: Option<Witness>,
}

/// BMC reachability for the invariant `property`, up to `cap` steps.
pub fn verify(
    ctx: &Context,
    model: &Model,
    property: ExprId,
    cap: Step,
    trace_id: String,
) -> Result<VerifyOutcome, Error> {
    if has_temporal(ctx, property) {
        // the LTL algorithm slot is a stub
        return Err(Error::TemporalUnsupported);
    }
    TypeChecker::new(&ctx.pool, &ctx.tm, model)
        .process_boolean(ctx.pool.empty_expr(), property)?;

    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(ctx, model, &mut compiler)?;

    let negated = ctx.pool.make_not(property);
    let violation = compiler.process(ctx.pool.empty_expr(), negated)?;
    let invariant = compiler.process(ctx.pool.empty_expr(), property)?;

    let mut engine = Engine::new(&ctx.microcode_dir);
    let main = engine.main_group();

    fsm.assert_init(ctx, &mut engine, 0, main)?;
    fsm.assert_invar(ctx, &mut engine, 0, main)?;

    let mut k: Step = 0;
    loop {
        if ctx.cancelled() {
            return Ok(VerifyOutcome {
                status: McStatus::Interrupted,
                witness: None,
            });
        }

        info!(k, "checking violation");
        let group = engine.new_group();
        assert_formula(ctx, &mut engine, &violation, k, group)?;

        if engine.solve(&[]) == SolveResult::Sat {
            let witness = reconstruct(
                &ctx.pool,
                &ctx.tm,
                model,
                &ctx.enc,
                &engine,
                k,
                trace_id,
                format!("BMC counterexample at depth {}", k),
            );
            return Ok(VerifyOutcome {
                status: McStatus::Reachable,
                witness: Some(witness),
            });
        }

        engine.retire_group(group);
        debug!(k, "no violation, asserting the property as invariant");
        assert_formula(ctx, &mut engine, &invariant, k, main)?;

        if k == cap {
            return Ok(VerifyOutcome {
                status: McStatus::Undecided,
                witness: None,
            });
        }

        fsm.assert_trans(ctx, &mut engine, k, main)?;
        fsm.assert_invar(ctx, &mut engine, k + 1, main)?;
        k += 1;

        // unrolling exhausted: every execution is shorter than k
        if engine.solve(&[]) == SolveResult::Unsat {
            return Ok(VerifyOutcome {
                status: McStatus::Unreachable,
                witness: None,
            });
        }
    }
}
