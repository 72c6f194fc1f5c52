//! Model pretty-printing for `dump-model` and `write-model`.
//!
//! Prints the analyzed model, so TRANS assignments appear in their
//! rewritten `next(x) = e` form.

use std::fmt::Write as _;

use sybil_model::{Model, Module, Variable};

use crate::context::Context;

pub fn render_model(ctx: &Context, model: &Model) -> String {
    let mut out = String::new();
    for module in model.modules() {
        render_module(ctx, module, &mut out);
    }
    out
}

fn render_module(ctx: &Context, module: &Module, out: &mut String) {
    let atoms = ctx.pool.atoms();
    let _ = write!(out, "MODULE {}", atoms.resolve(module.name()));
    if !module.params().is_empty() {
        let names: Vec<String> = module
            .params()
            .iter()
            .map(|p| ctx.pool.to_text(p.name))
            .collect();
        let _ = write!(out, "({})", names.join(", "));
    }
    let _ = writeln!(out);

    let plain: Vec<&Variable> = module
        .vars()
        .iter()
        .filter(|v| !v.input && !v.frozen)
        .collect();
    let inputs: Vec<&Variable> = module.vars().iter().filter(|v| v.input).collect();
    let frozen: Vec<&Variable> = module.vars().iter().filter(|v| v.frozen).collect();

    render_var_section(ctx, "VAR", &plain, out);
    render_var_section(ctx, "IVAR", &inputs, out);
    render_var_section(ctx, "FROZENVAR", &frozen, out);

    if !module.constants().is_empty() {
        let _ = writeln!(out, "CONSTANT");
        for konst in module.constants() {
            let value = konst.value as i64;
            let _ = writeln!(
                out,
                "    {} : {} := {};",
                ctx.pool.to_text(konst.name),
                ctx.tm.display(konst.ty, ctx.pool.atoms()),
                value
            );
        }
    }

    if !module.defines().is_empty() {
        let _ = writeln!(out, "DEFINE");
        for def in module.defines() {
            let _ = write!(out, "    {}", ctx.pool.to_text(def.name));
            if !def.formals.is_empty() {
                let names: Vec<String> = def
                    .formals
                    .iter()
                    .map(|&f| ctx.pool.to_text(f))
                    .collect();
                let _ = write!(out, "({})", names.join(", "));
            }
            let _ = writeln!(out, " := {};", ctx.pool.to_text(def.body));
        }
    }

    for &body in module.init() {
        let _ = writeln!(out, "INIT {};", ctx.pool.to_text(body));
    }
    for &body in module.invar() {
        let _ = writeln!(out, "INVAR {};", ctx.pool.to_text(body));
    }
    for &body in module.trans() {
        let _ = writeln!(out, "TRANS {};", ctx.pool.to_text(body));
    }
    let _ = writeln!(out);
}

fn render_var_section(ctx: &Context, keyword: &str, vars: &[&Variable], out: &mut String) {
    if vars.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", keyword);
    for var in vars {
        let _ = write!(out, "    ");
        if var.inertial {
            let _ = write!(out, "inertial ");
        }
        let _ = write!(
            out,
            "{} : {}",
            ctx.pool.to_text(var.name),
            ctx.tm.display(var.ty, ctx.pool.atoms())
        );
        if !var.actuals.is_empty() {
            let args: Vec<String> =
                var.actuals.iter().map(|&a| ctx.pool.to_text(a)).collect();
            let _ = write!(out, "({})", args.join(", "));
        }
        let _ = writeln!(out, ";");
    }
}
