//! FSM consistency checks.
//!
//! Propositional satisfiability of the section conjunctions: `OK` when
//! a model exists, `KO` when the section is inconsistent, `??` when the
//! check was interrupted before a verdict.

use sybil_compile::Compiler;
use sybil_model::Model;
use sybil_sat::{Engine, SolveResult};

use crate::algorithms::Fsm;
use crate::context::Context;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Ok,
    Ko,
    Undecided,
}

impl Consistency {
    pub fn as_str(self) -> &'static str {
        match self {
            Consistency::Ok => "OK",
            Consistency::Ko => "KO",
            Consistency::Undecided => "??",
        }
    }
}

fn run(
    ctx: &Context,
    model: &Model,
    with_init: bool,
    with_invar: bool,
    with_trans: bool,
) -> Result<Consistency, Error> {
    let mut compiler = Compiler::new(&ctx.pool, &ctx.tm, model, &ctx.dd, &ctx.enc);
    let fsm = Fsm::compile(ctx, model, &mut compiler)?;

    let mut engine = Engine::new(&ctx.microcode_dir);
    let main = engine.main_group();

    if with_init {
        fsm.assert_init(ctx, &mut engine, 0, main)?;
    }
    if with_invar {
        fsm.assert_invar(ctx, &mut engine, 0, main)?;
    }
    if with_trans {
        fsm.assert_trans(ctx, &mut engine, 0, main)?;
        fsm.assert_invar(ctx, &mut engine, 1, main)?;
    }

    if ctx.cancelled() {
        return Ok(Consistency::Undecided);
    }
    Ok(match engine.solve(&[]) {
        SolveResult::Sat => Consistency::Ok,
        SolveResult::Unsat => Consistency::Ko,
    })
}

/// Are the initial states consistent?
pub fn check_init(ctx: &Context, model: &Model) -> Result<Consistency, Error> {
    run(ctx, model, true, true, false)
}

/// Are the invariants satisfiable at all?
pub fn check_invar(ctx: &Context, model: &Model) -> Result<Consistency, Error> {
    run(ctx, model, false, true, false)
}

/// Can any transition be taken?
pub fn check_trans(ctx: &Context, model: &Model) -> Result<Consistency, Error> {
    run(ctx, model, false, true, true)
}
