//! The memoising type checker.
//!
//! A structural walk over the expression DAG in a module context,
//! applying the inference table. Results are memoised per
//! `(context, expression)`; the pool's hash-consing makes those keys
//! canonical already.

use std::collections::HashMap;

use sybil_expr::{ExprId, ExprKind, ExprPool};
use sybil_type::{TypeError, TypeId, TypeMgr};

use crate::error::{ModelError, SemanticError};
use crate::model::Model;
use crate::preprocessor;
use crate::resolver::{Resolved, Resolver};

pub struct TypeChecker<'m> {
    pool: &'m ExprPool,
    tm: &'m TypeMgr,
    model: &'m Model,
    cache: HashMap<(ExprId, ExprId), TypeId>,
}

impl<'m> TypeChecker<'m> {
    pub fn new(pool: &'m ExprPool, tm: &'m TypeMgr, model: &'m Model) -> Self {
        TypeChecker {
            pool,
            tm,
            model,
            cache: HashMap::new(),
        }
    }

    /// Infers and checks the type of `expr` in `ctx`.
    pub fn process(&mut self, ctx: ExprId, expr: ExprId) -> Result<TypeId, ModelError> {
        if let Some(&ty) = self.cache.get(&(ctx, expr)) {
            return Ok(ty);
        }
        let ty = self.walk(ctx, expr)?;
        self.cache.insert((ctx, expr), ty);
        Ok(ty)
    }

    /// Like [`Self::process`], additionally requiring a boolean result.
    pub fn process_boolean(&mut self, ctx: ExprId, expr: ExprId) -> Result<TypeId, ModelError> {
        let ty = self.process(ctx, expr)?;
        if !self.tm.is_boolean(ty) {
            return Err(TypeError::BadType {
                expr,
                expected: "boolean",
            }
            .into());
        }
        Ok(ty)
    }

    fn walk(&mut self, ctx: ExprId, expr: ExprId) -> Result<TypeId, ModelError> {
        let pool = self.pool;
        let tm = self.tm;
        let kind = pool.kind(expr);

        match kind {
            ExprKind::Ident => self.walk_leaf(ctx, expr),

            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst | ExprKind::FConst => {
                Ok(tm.find_int_const())
            }

            ExprKind::Undef => Err(TypeError::BadType {
                expr,
                expected: "a defined value",
            }
            .into()),

            ExprKind::Next => self.process(ctx, pool.lhs(expr)),

            ExprKind::Not => {
                let ty = self.process(ctx, pool.lhs(expr))?;
                if tm.is_boolean(ty) {
                    Ok(ty)
                } else {
                    Err(TypeError::BadType {
                        expr,
                        expected: "boolean",
                    }
                    .into())
                }
            }

            ExprKind::Neg | ExprKind::BwNot => {
                let ty = self.process(ctx, pool.lhs(expr))?;
                if tm.is_algebraic(ty) {
                    Ok(ty)
                } else {
                    Err(TypeError::BadType {
                        expr,
                        expected: "algebraic",
                    }
                    .into())
                }
            }

            ExprKind::F | ExprKind::G | ExprKind::X => {
                self.process_boolean(ctx, pool.lhs(expr))?;
                Ok(tm.find_boolean())
            }

            ExprKind::U | ExprKind::R => {
                self.process_boolean(ctx, pool.lhs(expr))?;
                self.process_boolean(ctx, pool.rhs(expr))?;
                Ok(tm.find_boolean())
            }

            ExprKind::Add
            | ExprKind::Sub
            | ExprKind::Mul
            | ExprKind::Div
            | ExprKind::Mod
            | ExprKind::BwAnd
            | ExprKind::BwOr
            | ExprKind::BwXor
            | ExprKind::BwXnor
            | ExprKind::And
            | ExprKind::Or
            | ExprKind::Implies
            | ExprKind::Iff
            | ExprKind::Lshift
            | ExprKind::Rshift
            | ExprKind::Eq
            | ExprKind::Ne
            | ExprKind::Lt
            | ExprKind::Le
            | ExprKind::Gt
            | ExprKind::Ge => {
                let lhs = self.process(ctx, pool.lhs(expr))?;
                let rhs = self.process(ctx, pool.rhs(expr))?;
                Ok(tm.result_type(expr, kind, lhs, rhs)?)
            }

            ExprKind::Ite => {
                let cond_node = pool.lhs(expr);
                debug_assert_eq!(pool.kind(cond_node), ExprKind::Cond);
                self.process_boolean(ctx, pool.lhs(cond_node))?;
                let then_ty = self.process(ctx, pool.rhs(cond_node))?;
                let else_ty = self.process(ctx, pool.rhs(expr))?;
                Ok(tm.ite_type(expr, then_ty, else_ty)?)
            }

            ExprKind::Cond => Err(TypeError::BadType {
                expr,
                expected: "a complete conditional",
            }
            .into()),

            ExprKind::Dot => {
                let nested = self.instance_ctx(ctx, pool.lhs(expr))?;
                self.process(nested, pool.rhs(expr))
            }

            ExprKind::Subscript => {
                let array_ty = self.process(ctx, pool.lhs(expr))?;
                let index_ty = self.process(ctx, pool.rhs(expr))?;
                if !self.tm.is_algebraic(index_ty) {
                    return Err(TypeError::BadType {
                        expr,
                        expected: "algebraic index",
                    }
                    .into());
                }
                match tm.desc(array_ty) {
                    sybil_type::TypeDesc::Array { elem, .. } => Ok(elem),
                    _ => Err(TypeError::BadType {
                        expr,
                        expected: "array",
                    }
                    .into()),
                }
            }

            ExprKind::Cast => self.walk_cast(ctx, expr),

            ExprKind::Set => self.process(ctx, pool.lhs(expr)),

            ExprKind::Comma => {
                let lhs = self.process(ctx, pool.lhs(expr))?;
                let rhs = self.process(ctx, pool.rhs(expr))?;
                Ok(tm.ite_type(expr, lhs, rhs)?)
            }

            ExprKind::Params => {
                let body =
                    preprocessor::expand_call(pool, tm, self.model, ctx, expr)?;
                self.process(ctx, body)
            }

            ExprKind::Assign | ExprKind::Guard => {
                Err(SemanticError::AssignPlacement { expr }.into())
            }

            ExprKind::TypeTag => Err(TypeError::BadType {
                expr,
                expected: "a value, not a type",
            }
            .into()),
        }
    }

    fn walk_leaf(&mut self, ctx: ExprId, expr: ExprId) -> Result<TypeId, ModelError> {
        let pool = self.pool;
        let tm = self.tm;

        if pool.is_bool_const(expr) {
            return Ok(tm.find_boolean());
        }

        let resolver = Resolver::new(pool, tm, self.model);
        match resolver.resolve(ctx, expr)? {
            Resolved::Variable { var, .. } => Ok(var.ty),
            Resolved::Constant(konst) => Ok(konst.ty),
            Resolved::Literal(lit) => Ok(lit.ty),
            Resolved::Define { ctx: dctx, def } => {
                if !def.formals.is_empty() {
                    return Err(SemanticError::DefineArity { expr }.into());
                }
                self.process(dctx, def.body)
            }
            Resolved::Parameter { fqn } => {
                let (rctx, actual) =
                    self.model.rewrite_parameter(fqn).ok_or_else(|| {
                        ModelError::Resolution(crate::error::ResolutionError { expr: fqn })
                    })?;
                self.process(rctx, actual)
            }
        }
    }

    fn walk_cast(&mut self, ctx: ExprId, expr: ExprId) -> Result<TypeId, ModelError> {
        let pool = self.pool;
        let tm = self.tm;
        let tag = pool.lhs(expr);
        let src = self.process(ctx, pool.rhs(expr))?;

        match pool.node(tag).data {
            // bool(e): boolean stays, algebraic collapses to boolean
            sybil_expr::ExprData::Atom(_) => {
                if tm.is_boolean(src) || tm.is_algebraic(src) {
                    Ok(tm.find_boolean())
                } else {
                    Err(TypeError::BadType {
                        expr,
                        expected: "boolean or algebraic",
                    }
                    .into())
                }
            }
            // resize(e, w): width resize preserving signedness;
            // booleans widen to unsigned
            sybil_expr::ExprData::Value(w) => {
                let w = w as u32;
                if tm.is_boolean(src) {
                    Ok(tm.find_unsigned(w))
                } else if tm.is_signed(src) {
                    Ok(tm.find_signed(w))
                } else if tm.is_algebraic(src) {
                    Ok(tm.find_unsigned(w))
                } else {
                    Err(TypeError::BadType {
                        expr,
                        expected: "boolean or algebraic",
                    }
                    .into())
                }
            }
            _ => Err(TypeError::BadType {
                expr,
                expected: "a cast target",
            }
            .into()),
        }
    }

    /// The instance context denoted by the left side of a `Dot`.
    fn instance_ctx(&mut self, ctx: ExprId, prefix: ExprId) -> Result<ExprId, ModelError> {
        crate::resolver::instance_context(self.pool, self.tm, self.model, ctx, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::symbol::{Define, Variable};

    fn model_with_main() -> (ExprPool, TypeMgr, Model) {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let mut model = Model::new();
        model
            .add_module(Module::new(pool.atoms().intern("main")))
            .unwrap();
        (pool, tm, model)
    }

    #[test]
    fn constants_are_int_const() {
        let (pool, tm, model) = model_with_main();
        let mut tc = TypeChecker::new(&pool, &tm, &model);
        let ty = tc.process(pool.empty_expr(), pool.make_iconst(7)).unwrap();
        assert!(tm.is_int_const(ty));
    }

    #[test]
    fn arithmetic_promotes_constants() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let x = pool.make_ident("x");
        model
            .module_mut(main)
            .unwrap()
            .add_var(Variable::new(main, x, tm.find_unsigned(4)))
            .unwrap();

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        let e = pool.make_add(x, pool.make_iconst(1));
        let ty = tc.process(pool.empty_expr(), e).unwrap();
        assert_eq!(ty, tm.find_unsigned(4));
    }

    #[test]
    fn next_is_type_transparent() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let x = pool.make_ident("x");
        model
            .module_mut(main)
            .unwrap()
            .add_var(Variable::new(main, x, tm.find_signed(8)))
            .unwrap();

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        let ty = tc.process(pool.empty_expr(), pool.make_next(x)).unwrap();
        assert_eq!(ty, tm.find_signed(8));
    }

    #[test]
    fn temporal_operators_demand_booleans() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let b = pool.make_ident("b");
        let n = pool.make_ident("n");
        {
            let m = model.module_mut(main).unwrap();
            m.add_var(Variable::new(main, b, tm.find_boolean())).unwrap();
            m.add_var(Variable::new(main, n, tm.find_unsigned(2))).unwrap();
        }

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        assert!(tc.process(pool.empty_expr(), pool.make_g(b)).is_ok());
        assert!(tc.process(pool.empty_expr(), pool.make_g(n)).is_err());
    }

    #[test]
    fn subscript_yields_the_element_type() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let a = pool.make_ident("a");
        let elem = tm.find_unsigned(4);
        model
            .module_mut(main)
            .unwrap()
            .add_var(Variable::new(main, a, tm.find_array(elem, 3)))
            .unwrap();

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        let e = pool.make_subscript(a, pool.make_iconst(2));
        assert_eq!(tc.process(pool.empty_expr(), e).unwrap(), elem);
    }

    #[test]
    fn defines_type_as_their_bodies() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let x = pool.make_ident("x");
        let d = pool.make_ident("d");
        {
            let m = model.module_mut(main).unwrap();
            m.add_var(Variable::new(main, x, tm.find_unsigned(2))).unwrap();
            m.add_define(Define {
                module: main,
                name: d,
                body: pool.make_add(x, pool.make_iconst(1)),
                formals: vec![],
            })
            .unwrap();
        }

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        assert_eq!(
            tc.process(pool.empty_expr(), d).unwrap(),
            tm.find_unsigned(2)
        );
    }

    #[test]
    fn casts_follow_the_rules() {
        let (pool, tm, mut model) = model_with_main();
        let main = pool.atoms().intern("main");
        let x = pool.make_ident("x");
        let b = pool.make_ident("b");
        {
            let m = model.module_mut(main).unwrap();
            m.add_var(Variable::new(main, x, tm.find_unsigned(4))).unwrap();
            m.add_var(Variable::new(main, b, tm.find_boolean())).unwrap();
        }

        let mut tc = TypeChecker::new(&pool, &tm, &model);
        let to_bool = pool.make_cast(pool.make_boolean_tag(), x);
        assert_eq!(
            tc.process(pool.empty_expr(), to_bool).unwrap(),
            tm.find_boolean()
        );

        let widened = pool.make_cast(pool.make_width_tag(8), x);
        assert_eq!(
            tc.process(pool.empty_expr(), widened).unwrap(),
            tm.find_unsigned(8)
        );

        let from_bool = pool.make_cast(pool.make_width_tag(4), b);
        assert_eq!(
            tc.process(pool.empty_expr(), from_bool).unwrap(),
            tm.find_unsigned(4)
        );
    }
}
