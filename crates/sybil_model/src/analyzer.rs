//! Semantic analysis.
//!
//! The analyzer runs once after model construction and before any
//! compilation:
//!
//! 1. variable flag sanity (`input`/`frozen`/`inertial` conflicts);
//! 2. parameter binding across the instance hierarchy;
//! 3. section rules: guards only at TRANS toplevel with an assignment
//!    action, assignments only in TRANS, neither in INIT/INVAR/DEFINE;
//! 4. rewriting: `x := e` becomes `next(x) = e`, `g ?-> x := e` becomes
//!    `g -> next(x) = e`, and every inertial variable targeted by guards
//!    gets the synthesised inertia constraint
//!    `(!g1 & ... & !gn) -> next(x) = x`;
//! 5. a full type check of every section body in every instance context.
//!
//! Type errors are collected rather than short-circuited, so a command
//! can report all of them at once.

use std::collections::HashMap;

use sybil_base::Atom;
use sybil_expr::{ExprId, ExprKind, ExprPool};
use sybil_type::TypeMgr;
use tracing::debug;

use crate::error::{ModelError, SemanticError};
use crate::model::Model;
use crate::typecheck::TypeChecker;

/// Result of a successful analysis: for each module, the recorded
/// guard → assignment-target dependencies, in TRANS order.
pub struct Analysis {
    pub dependencies: HashMap<Atom, Vec<(ExprId, ExprId)>>,
}

pub struct Analyzer;

impl Analyzer {
    /// Validates and normalises the model in place.
    pub fn process(
        pool: &ExprPool,
        tm: &TypeMgr,
        model: &mut Model,
    ) -> Result<Analysis, Vec<ModelError>> {
        check_flags(model).map_err(|e| vec![e])?;

        model
            .bind_params(pool, tm)
            .map_err(|e| vec![ModelError::Semantic(e)])?;

        let dependencies = normalise_sections(pool, model).map_err(|e| vec![e])?;

        synthesise_inertia(pool, model, &dependencies);

        let errors = type_check(pool, tm, model);
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Analysis { dependencies })
    }
}

fn check_flags(model: &Model) -> Result<(), ModelError> {
    for module in model.modules() {
        for var in module.vars() {
            let conflicting = (var.input && var.inertial)
                || (var.input && var.frozen)
                || (var.inertial && var.frozen);
            if conflicting {
                return Err(SemanticError::ConflictingFlags { var: var.name }.into());
            }
        }
    }
    Ok(())
}

/// Depth-first search for a node kind; returns the offending node.
fn find_kind(pool: &ExprPool, expr: ExprId, pred: fn(ExprKind) -> bool) -> Option<ExprId> {
    if pred(pool.kind(expr)) {
        return Some(expr);
    }
    match pool.node(expr).data {
        sybil_expr::ExprData::Unary(l) => find_kind(pool, l, pred),
        sybil_expr::ExprData::Binary(l, r) => {
            find_kind(pool, l, pred).or_else(|| find_kind(pool, r, pred))
        }
        _ => None,
    }
}

fn is_trans_construct(kind: ExprKind) -> bool {
    matches!(kind, ExprKind::Assign | ExprKind::Guard)
}

fn normalise_sections(
    pool: &ExprPool,
    model: &mut Model,
) -> Result<HashMap<Atom, Vec<(ExprId, ExprId)>>, ModelError> {
    let mut dependencies: HashMap<Atom, Vec<(ExprId, ExprId)>> = HashMap::new();

    let names: Vec<Atom> = model.modules().iter().map(|m| m.name()).collect();
    for name in names {
        // read phase: validate and build the rewritten section bodies
        let (init, invar, trans, defines): (Vec<_>, Vec<_>, Vec<_>, Vec<_>) = {
            let module = model.module(name).expect("module vanished");
            (
                module.init().to_vec(),
                module.invar().to_vec(),
                module.trans().to_vec(),
                module.defines().iter().map(|d| d.body).collect(),
            )
        };

        for &body in init.iter().chain(invar.iter()) {
            if let Some(bad) = find_kind(pool, body, is_trans_construct) {
                return Err(match pool.kind(bad) {
                    ExprKind::Guard => SemanticError::GuardPlacement { expr: bad }.into(),
                    _ => SemanticError::AssignPlacement { expr: bad }.into(),
                });
            }
            reject_temporal(pool, body)?;
        }

        for &body in &defines {
            if let Some(bad) = find_kind(pool, body, is_trans_construct) {
                return Err(match pool.kind(bad) {
                    ExprKind::Guard => SemanticError::GuardPlacement { expr: bad }.into(),
                    _ => SemanticError::AssignPlacement { expr: bad }.into(),
                });
            }
        }

        let mut deps = Vec::new();
        let mut new_trans = Vec::with_capacity(trans.len());
        for body in trans {
            reject_temporal(pool, body)?;
            let rewritten = match pool.kind(body) {
                ExprKind::Guard => {
                    let guard = pool.lhs(body);
                    let action = pool.rhs(body);
                    if pool.kind(action) != ExprKind::Assign {
                        return Err(SemanticError::GuardedActionNotAssignment {
                            expr: body,
                        }
                        .into());
                    }
                    if let Some(bad) = find_kind(pool, guard, is_trans_construct) {
                        return Err(SemanticError::GuardPlacement { expr: bad }.into());
                    }
                    let lhs = check_assignment(pool, model, name, action)?;
                    debug!(
                        guard = %pool.display(guard),
                        target = %pool.display(lhs),
                        "tracking guard dependency"
                    );
                    deps.push((guard, lhs));

                    let eq = assignment_equation(pool, action);
                    pool.make_implies(guard, eq)
                }
                ExprKind::Assign => {
                    check_assignment(pool, model, name, body)?;
                    assignment_equation(pool, body)
                }
                _ => {
                    if let Some(bad) = find_kind(pool, body, is_trans_construct) {
                        return Err(match pool.kind(bad) {
                            ExprKind::Guard => {
                                SemanticError::GuardPlacement { expr: bad }.into()
                            }
                            _ => SemanticError::AssignPlacement { expr: bad }.into(),
                        });
                    }
                    body
                }
            };
            new_trans.push(rewritten);
        }

        dependencies.insert(name, deps);

        let module = model.module_mut(name).expect("module vanished");
        module.set_init(init);
        module.set_invar(invar);
        module.set_trans(new_trans);
    }

    Ok(dependencies)
}

fn reject_temporal(pool: &ExprPool, body: ExprId) -> Result<(), ModelError> {
    if let Some(bad) = find_kind(pool, body, ExprKind::is_temporal) {
        return Err(sybil_type::TypeError::BadType {
            expr: bad,
            expected: "no temporal operators in FSM sections",
        }
        .into());
    }
    Ok(())
}

/// Validates an assignment's target and returns the lhs identifier.
fn check_assignment(
    pool: &ExprPool,
    model: &Model,
    module: Atom,
    assign: ExprId,
) -> Result<ExprId, ModelError> {
    let lhs = pool.lhs(assign);
    if !pool.is_ident(lhs) {
        return Err(SemanticError::BadAssignTarget { expr: lhs }.into());
    }
    let var = model
        .module(module)
        .and_then(|m| m.var(lhs))
        .ok_or(SemanticError::BadAssignTarget { expr: lhs })?;
    if !var.inertial || var.input || var.frozen {
        return Err(SemanticError::BadAssignTarget { expr: lhs }.into());
    }
    Ok(lhs)
}

/// `x := e` as the transition equation `next(x) = e`.
fn assignment_equation(pool: &ExprPool, assign: ExprId) -> ExprId {
    let lhs = pool.lhs(assign);
    let rhs = pool.rhs(assign);
    pool.make_eq(pool.make_next(lhs), rhs)
}

/// Appends `(!g1 & ... & !gn) -> next(x) = x` for every inertial
/// variable targeted by at least one guarded assignment.
fn synthesise_inertia(
    pool: &ExprPool,
    model: &mut Model,
    dependencies: &HashMap<Atom, Vec<(ExprId, ExprId)>>,
) {
    for (&name, deps) in dependencies {
        if deps.is_empty() {
            continue;
        }

        // group guards by assignment target, preserving order
        let mut order: Vec<ExprId> = Vec::new();
        let mut by_target: HashMap<ExprId, Vec<ExprId>> = HashMap::new();
        for &(guard, lhs) in deps {
            if !by_target.contains_key(&lhs) {
                order.push(lhs);
            }
            by_target.entry(lhs).or_default().push(guard);
        }

        let mut synthesised = Vec::new();
        for lhs in order {
            let guards = &by_target[&lhs];
            let mut none = pool.make_not(guards[0]);
            for &g in &guards[1..] {
                none = pool.make_and(none, pool.make_not(g));
            }
            let hold = pool.make_eq(pool.make_next(lhs), lhs);
            synthesised.push(pool.make_implies(none, hold));
        }

        let module = model.module_mut(name).expect("module vanished");
        for expr in synthesised {
            module.add_trans(expr);
        }
    }
}

fn type_check(pool: &ExprPool, tm: &TypeMgr, model: &Model) -> Vec<ModelError> {
    let mut errors = Vec::new();
    let mut tc = TypeChecker::new(pool, tm, model);

    for &(ctx, index) in model.instances() {
        let module = model.module_at(index);
        for &body in module.init().iter().chain(module.invar()).chain(module.trans()) {
            if let Err(e) = tc.process_boolean(ctx, body) {
                errors.push(e);
            }
        }
        for def in module.defines() {
            if !def.formals.is_empty() {
                // functional defines are checked at their call sites
                continue;
            }
            if let Err(e) = tc.process(ctx, def.body) {
                errors.push(e);
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::symbol::Variable;

    fn simple_model(
        pool: &ExprPool,
        tm: &TypeMgr,
        build: impl FnOnce(&mut Module, Atom),
    ) -> Model {
        let mut model = Model::new();
        let main = pool.atoms().intern("main");
        let mut m = Module::new(main);
        build(&mut m, main);
        model.add_module(m).unwrap();
        model
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, x, tm.find_boolean()).input().frozen())
                .unwrap();
        });
        let err = Analyzer::process(&pool, &tm, &mut model).unwrap_err();
        assert!(matches!(
            err[0],
            ModelError::Semantic(SemanticError::ConflictingFlags { .. })
        ));
    }

    #[test]
    fn assignments_rewrite_to_next_equations() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, x, tm.find_unsigned(2)).inertial())
                .unwrap();
            let assign = pool.make_assign(x, pool.make_add(x, pool.make_iconst(1)));
            m.add_trans(assign);
        });

        Analyzer::process(&pool, &tm, &mut model).unwrap();

        let main = pool.atoms().lookup("main").unwrap();
        let trans = model.module(main).unwrap().trans();
        let expected = pool.make_eq(
            pool.make_next(x),
            pool.make_add(x, pool.make_iconst(1)),
        );
        assert_eq!(trans, &[expected]);
    }

    #[test]
    fn guards_rewrite_and_synthesise_inertia() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let b = pool.make_ident("b");
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, b, tm.find_boolean())).unwrap();
            m.add_var(Variable::new(main, x, tm.find_unsigned(2)).inertial())
                .unwrap();
            let action = pool.make_assign(x, pool.make_add(x, pool.make_iconst(1)));
            m.add_trans(pool.make_guard(b, action));
        });

        let analysis = Analyzer::process(&pool, &tm, &mut model).unwrap();
        let main = pool.atoms().lookup("main").unwrap();
        assert_eq!(analysis.dependencies[&main], vec![(b, x)]);

        let trans = model.module(main).unwrap().trans();
        assert_eq!(trans.len(), 2);
        // guarded update
        let update = pool.make_implies(
            b,
            pool.make_eq(pool.make_next(x), pool.make_add(x, pool.make_iconst(1))),
        );
        // inertia: !b -> next(x) = x
        let hold = pool.make_implies(
            pool.make_not(b),
            pool.make_eq(pool.make_next(x), x),
        );
        assert_eq!(trans, &[update, hold]);
    }

    #[test]
    fn assignments_outside_trans_are_rejected() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, x, tm.find_unsigned(2)).inertial())
                .unwrap();
            m.add_init(pool.make_assign(x, pool.make_iconst(0)));
        });
        let err = Analyzer::process(&pool, &tm, &mut model).unwrap_err();
        assert!(matches!(
            err[0],
            ModelError::Semantic(SemanticError::AssignPlacement { .. })
        ));
    }

    #[test]
    fn assignment_on_non_inertial_target_is_rejected() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, x, tm.find_unsigned(2))).unwrap();
            m.add_trans(pool.make_assign(x, pool.make_iconst(0)));
        });
        let err = Analyzer::process(&pool, &tm, &mut model).unwrap_err();
        assert!(matches!(
            err[0],
            ModelError::Semantic(SemanticError::BadAssignTarget { .. })
        ));
    }

    #[test]
    fn guards_must_wrap_assignments() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let b = pool.make_ident("b");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, b, tm.find_boolean())).unwrap();
            m.add_trans(pool.make_guard(b, b));
        });
        let err = Analyzer::process(&pool, &tm, &mut model).unwrap_err();
        assert!(matches!(
            err[0],
            ModelError::Semantic(SemanticError::GuardedActionNotAssignment { .. })
        ));
    }

    #[test]
    fn temporal_operators_are_rejected_in_sections() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let b = pool.make_ident("b");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, b, tm.find_boolean())).unwrap();
            m.add_invar(pool.make_g(b));
        });
        assert!(Analyzer::process(&pool, &tm, &mut model).is_err());
    }

    #[test]
    fn well_typed_model_passes() {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let x = pool.make_ident("x");
        let mut model = simple_model(&pool, &tm, |m, main| {
            m.add_var(Variable::new(main, x, tm.find_unsigned(2))).unwrap();
            m.add_init(pool.make_eq(x, pool.make_iconst(0)));
            m.add_trans(pool.make_eq(
                pool.make_next(x),
                pool.make_add(x, pool.make_iconst(1)),
            ));
        });
        assert!(Analyzer::process(&pool, &tm, &mut model).is_ok());
    }
}
