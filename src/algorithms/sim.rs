//! FSM simulation.
//!
//! `pick_state` solves `INIT@0 ∧ INVAR@0` (plus user constraints) and
//! records the chosen state as a one-frame trace. `simulate` keeps
//! extending the unrolling one step at a time: a step whose INVAR or
//! TRANS goes unsatisfiable deadlocks, an optional halting condition
//! stops the run early, and cancellation interrupts it with the trace
//! of the last successful solve.

use sybil_compile::{CompilationUnit, Compiler};
use sybil_expr::{ExprId, Step};
use sybil_model::{Model, TypeChecker};
use sybil_sat::{Engine, SolveResult};
use sybil_witness::{reconstruct, Witness};
use tracing::info;

use crate::algorithms::{assert_formula, has_temporal, Fsm};
use crate::context::Context;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    /// All requested steps performed.
    Done,
    /// The FSM cannot take another step (or has no initial state).
    Deadlocked,
    /// The halting condition was reached.
    Halted,
    Interrupted,
}

pub struct SimOutcome {
    pub status: SimStatus,
    pub witness: Option<Witness>,
}

struct Prepared {
    fsm: Fsm,
    constraints: Vec<CompilationUnit>,
    halt: Option<CompilationUnit>,
}

fn prepare(
    ctx: &Context,
    model: &Model,
    halt: Option<ExprId>,
    constraints: &[ExprId],
) -> Result<Prepared, Error> {
    let mut checker = TypeChecker::new(&ctx.pool, &ctx.tm, model);
    for &c in constraints.iter().chain(halt.iter()) {
        if has_temporal(ctx, c) {
            return Err(Error::TemporalUnsupported);
        }
        checker.process_boolean(ctx.pool.empty_expr(), c)?;
    }

    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(ctx, model, &mut compiler)?;
    let constraints = constraints
        .iter()
        .map(|&c| compiler.process(ctx.pool.empty_expr(), c))
        .collect::<Result<Vec<_>, _>>()?;
    let halt = halt
        .map(|h| compiler.process(ctx.pool.empty_expr(), h))
        .transpose()?;

    Ok(Prepared {
        fsm,
        constraints,
        halt,
    })
}

/// Chooses an initial state satisfying INIT, INVAR and the extra
/// constraints. `None` when no such state exists.
pub fn pick_state(
    ctx: &Context,
    model: &Model,
    constraints: &[ExprId],
    trace_id: String,
) -> Result<Option<Witness>, Error> {
    let prepared = prepare(ctx, model, None, constraints)?;
    let mut engine = Engine::new(&ctx.microcode_dir);
    let main = engine.main_group();

    prepared.fsm.assert_init(ctx, &mut engine, 0, main)?;
    prepared.fsm.assert_invar(ctx, &mut engine, 0, main)?;
    for unit in &prepared.constraints {
        assert_formula(ctx, &mut engine, unit, 0, main)?;
    }

    if engine.solve(&[]) == SolveResult::Unsat {
        return Ok(None);
    }
    Ok(Some(reconstruct(
        &ctx.pool,
        &ctx.tm,
        model,
        &ctx.enc,
        &engine,
        0,
        trace_id,
        "picked initial state",
    )))
}

/// Simulates up to `k` steps.
pub fn simulate(
    ctx: &Context,
    model: &Model,
    halt: Option<ExprId>,
    constraints: &[ExprId],
    k: Step,
    trace_id: String,
) -> Result<SimOutcome, Error> {
    let prepared = prepare(ctx, model, halt, constraints)?;
    let mut engine = Engine::new(&ctx.microcode_dir);
    let main = engine.main_group();

    prepared.fsm.assert_init(ctx, &mut engine, 0, main)?;
    prepared.fsm.assert_invar(ctx, &mut engine, 0, main)?;
    for unit in &prepared.constraints {
        assert_formula(ctx, &mut engine, unit, 0, main)?;
    }

    if engine.solve(&[]) == SolveResult::Unsat {
        info!("no initial state");
        return Ok(SimOutcome {
            status: SimStatus::Deadlocked,
            witness: None,
        });
    }

    let witness_of = |engine: &Engine, steps: Step, status: &str| {
        reconstruct(
            &ctx.pool,
            &ctx.tm,
            model,
            &ctx.enc,
            engine,
            steps,
            trace_id.clone(),
            format!("simulation trace ({})", status),
        )
    };

    let mut reached: Step = 0;
    while reached < k {
        if ctx.cancelled() {
            return Ok(SimOutcome {
                status: SimStatus::Interrupted,
                witness: Some(witness_of(&engine, reached, "interrupted")),
            });
        }

        // halting condition first: stop as soon as it can hold here
        if let Some(halt_unit) = &prepared.halt {
            let group = engine.new_group();
            assert_formula(ctx, &mut engine, halt_unit, reached, group)?;
            if engine.solve(&[]) == SolveResult::Sat {
                info!(step = reached, "halt condition reached");
                return Ok(SimOutcome {
                    status: SimStatus::Halted,
                    witness: Some(witness_of(&engine, reached, "halted")),
                });
            }
            engine.retire_group(group);
        }

        prepared.fsm.assert_trans(ctx, &mut engine, reached, main)?;
        prepared
            .fsm
            .assert_invar(ctx, &mut engine, reached + 1, main)?;
        for unit in &prepared.constraints {
            assert_formula(ctx, &mut engine, unit, reached + 1, main)?;
        }

        if engine.solve(&[]) == SolveResult::Unsat {
            info!(step = reached, "deadlock");
            return Ok(SimOutcome {
                status: SimStatus::Deadlocked,
                witness: Some(witness_of(&engine, reached, "deadlocked")),
            });
        }
        reached += 1;
    }

    Ok(SimOutcome {
        status: SimStatus::Done,
        witness: Some(witness_of(&engine, reached, "done")),
    })
}
