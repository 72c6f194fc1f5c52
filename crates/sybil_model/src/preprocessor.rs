//! Define expansion.
//!
//! Functional defines (`DEFINE f(a, b) := a + b;`) are expanded by
//! substitution at every call site; the compiler and the type checker
//! never see a `Params` node survive.

use std::collections::HashMap;

use sybil_expr::{ExprData, ExprId, ExprKind, ExprPool};

use crate::error::{ModelError, SemanticError};
use crate::model::Model;
use crate::resolver::{Resolved, Resolver};
use sybil_type::TypeMgr;

/// Flattens a right-nested `Comma` chain into a list.
pub fn comma_list(pool: &ExprPool, expr: ExprId) -> Vec<ExprId> {
    let mut out = Vec::new();
    let mut cur = expr;
    while pool.kind(cur) == ExprKind::Comma {
        out.push(pool.lhs(cur));
        cur = pool.rhs(cur);
    }
    out.push(cur);
    out
}

/// Capture-free substitution of identifiers.
pub fn substitute(
    pool: &ExprPool,
    body: ExprId,
    bindings: &HashMap<ExprId, ExprId>,
) -> ExprId {
    let node = pool.node(body);
    match node.data {
        ExprData::Atom(_) => {
            if node.kind == ExprKind::Ident {
                if let Some(&replacement) = bindings.get(&body) {
                    return replacement;
                }
            }
            body
        }
        ExprData::Value(_) | ExprData::Nil => body,
        ExprData::Unary(l) => {
            let nl = substitute(pool, l, bindings);
            if nl == l {
                body
            } else {
                pool.make(node.kind, ExprData::Unary(nl))
            }
        }
        ExprData::Binary(l, r) => {
            let nl = substitute(pool, l, bindings);
            let nr = substitute(pool, r, bindings);
            if nl == l && nr == r {
                body
            } else {
                pool.make(node.kind, ExprData::Binary(nl, nr))
            }
        }
    }
}

/// Expands a `Params` node: resolves the callee define and substitutes
/// actuals for formals. Returns the rewritten body.
pub fn expand_call(
    pool: &ExprPool,
    tm: &TypeMgr,
    model: &Model,
    ctx: ExprId,
    call: ExprId,
) -> Result<ExprId, ModelError> {
    debug_assert_eq!(pool.kind(call), ExprKind::Params);
    let callee = pool.lhs(call);
    let args = comma_list(pool, pool.rhs(call));

    let resolver = Resolver::new(pool, tm, model);
    let resolved = resolver.resolve(ctx, callee)?;
    let def = match resolved {
        Resolved::Define { def, .. } => def,
        _ => {
            return Err(ModelError::Semantic(SemanticError::DefineArity {
                expr: call,
            }))
        }
    };

    if def.formals.len() != args.len() {
        return Err(ModelError::Semantic(SemanticError::DefineArity {
            expr: call,
        }));
    }

    let bindings: HashMap<ExprId, ExprId> =
        def.formals.iter().copied().zip(args).collect();
    Ok(substitute(pool, def.body, &bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::symbol::Define;

    #[test]
    fn substitute_rebuilds_only_what_changes() {
        let pool = ExprPool::new();
        let a = pool.make_ident("a");
        let x = pool.make_ident("x");
        let body = pool.make_add(a, pool.make_iconst(1));

        let mut bindings = HashMap::new();
        bindings.insert(a, x);
        let out = substitute(&pool, body, &bindings);
        assert_eq!(out, pool.make_add(x, pool.make_iconst(1)));

        // no bindings: identity, same node
        assert_eq!(substitute(&pool, body, &HashMap::new()), body);
    }

    #[test]
    fn expand_call_binds_formals_in_order() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let mut model = Model::new();

        let main = pool.atoms().intern("main");
        let f = pool.make_ident("f");
        let a = pool.make_ident("a");
        let b = pool.make_ident("b");

        let mut m = Module::new(main);
        m.add_define(Define {
            module: main,
            name: f,
            body: pool.make_sub(a, b),
            formals: vec![a, b],
        })
        .unwrap();
        model.add_module(m).unwrap();

        let x = pool.make_ident("x");
        let y = pool.make_ident("y");
        let call = pool.make_params(f, pool.make_comma(x, y));
        let out = expand_call(&pool, &tm, &model, pool.empty_expr(), call).unwrap();
        assert_eq!(out, pool.make_sub(x, y));
    }

    #[test]
    fn expand_call_checks_arity() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let mut model = Model::new();

        let main = pool.atoms().intern("main");
        let f = pool.make_ident("f");
        let a = pool.make_ident("a");

        let mut m = Module::new(main);
        m.add_define(Define {
            module: main,
            name: f,
            body: a,
            formals: vec![a],
        })
        .unwrap();
        model.add_module(m).unwrap();

        let call = pool.make_params(
            f,
            pool.make_comma(pool.make_iconst(1), pool.make_iconst(2)),
        );
        assert!(expand_call(&pool, &tm, &model, pool.empty_expr(), call).is_err());
    }
}
