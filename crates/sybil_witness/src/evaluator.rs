//! The witness evaluator.
//!
//! A small recursive interpreter that computes the value of an
//! expression (typically a define body) against a witness: symbol
//! lookups consult the frame at the current step, `next` advances the
//! step, `Dot` shifts the resolution context. A missing value anywhere
//! collapses the result to the distinguished `UNDEF` expression.

use std::collections::HashMap;

use sybil_expr::{ExprId, ExprKind, ExprPool, Step};
use sybil_model::{preprocessor, resolver, Model, Resolved, Resolver};
use sybil_type::{TypeId, TypeMgr};

use crate::witness::Witness;

/// Evaluation stops on the first missing value or unsupported shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    /// The witness has no value for a symbol at the requested step.
    NoValue,
    /// The expression shape is outside the evaluator's fragment.
    Unsupported,
}

pub struct Evaluator<'a> {
    pool: &'a ExprPool,
    tm: &'a TypeMgr,
    model: &'a Model,
    witness: &'a Witness,
    cache: HashMap<(ExprId, ExprId, Step), (i64, TypeId)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        pool: &'a ExprPool,
        tm: &'a TypeMgr,
        model: &'a Model,
        witness: &'a Witness,
    ) -> Self {
        Evaluator {
            pool,
            tm,
            model,
            witness,
            cache: HashMap::new(),
        }
    }

    /// Evaluates `body` in `ctx` at `step`, rendering the result as a
    /// value expression. Missing values yield `UNDEF`.
    pub fn process(&mut self, ctx: ExprId, body: ExprId, step: Step) -> ExprId {
        match self.eval(ctx, body, step) {
            Ok((value, ty)) => self.render(value, ty),
            Err(_) => self.pool.undef_expr(),
        }
    }

    fn render(&self, value: i64, ty: TypeId) -> ExprId {
        if self.tm.is_boolean(ty) {
            return if value != 0 {
                self.pool.true_expr()
            } else {
                self.pool.false_expr()
            };
        }
        if let sybil_type::TypeDesc::Enum(lits) = self.tm.desc(ty) {
            let index = (value as usize).min(lits.len() - 1);
            return self.pool.make_ident_atom(lits[index]);
        }
        self.pool.make_signed_const(value)
    }

    fn eval(
        &mut self,
        ctx: ExprId,
        expr: ExprId,
        step: Step,
    ) -> Result<(i64, TypeId), EvalError> {
        if let Some(&hit) = self.cache.get(&(ctx, expr, step)) {
            return Ok(hit);
        }
        let out = self.walk(ctx, expr, step)?;
        self.cache.insert((ctx, expr, step), out);
        Ok(out)
    }

    fn walk(
        &mut self,
        ctx: ExprId,
        expr: ExprId,
        step: Step,
    ) -> Result<(i64, TypeId), EvalError> {
        let pool = self.pool;
        let tm = self.tm;
        let boolean = tm.find_boolean();

        match pool.kind(expr) {
            ExprKind::Ident => self.walk_leaf(ctx, expr, step),

            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst | ExprKind::FConst => {
                Ok((pool.value(expr) as i64, tm.find_int_const()))
            }

            ExprKind::Next => self.eval(ctx, pool.lhs(expr), step + 1),

            ExprKind::Not => {
                let (v, _) = self.eval(ctx, pool.lhs(expr), step)?;
                Ok(((v == 0) as i64, boolean))
            }

            ExprKind::Neg => {
                let (v, ty) = self.eval(ctx, pool.lhs(expr), step)?;
                Ok((v.wrapping_neg(), ty))
            }

            ExprKind::BwNot => {
                let (v, ty) = self.eval(ctx, pool.lhs(expr), step)?;
                Ok((!v, ty))
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
            | ExprKind::Lshift
            | ExprKind::Rshift => {
                let (l, lt) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, rt) = self.eval(ctx, pool.rhs(expr), step)?;
                let ty = if tm.is_int_const(lt) { rt } else { lt };
                let v = match pool.kind(expr) {
                    ExprKind::Add => l.wrapping_add(r),
                    ExprKind::Sub => l.wrapping_sub(r),
                    ExprKind::Mul => l.wrapping_mul(r),
                    ExprKind::Div => l.checked_div(r).ok_or(EvalError::NoValue)?,
                    ExprKind::Mod => l.checked_rem(r).ok_or(EvalError::NoValue)?,
                    ExprKind::BwAnd => l & r,
                    ExprKind::BwOr => l | r,
                    ExprKind::BwXor => l ^ r,
                    ExprKind::BwXnor => !(l ^ r),
                    ExprKind::Lshift => l.checked_shl(r as u32).unwrap_or(0),
                    ExprKind::Rshift => {
                        if (0..64).contains(&r) {
                            ((l as u64) >> r) as i64
                        } else {
                            0
                        }
                    }
                    _ => unreachable!(),
                };
                Ok((self.truncate(v, ty), ty))
            }

            ExprKind::And => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                Ok(((l != 0 && r != 0) as i64, boolean))
            }
            ExprKind::Or => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                Ok(((l != 0 || r != 0) as i64, boolean))
            }
            ExprKind::Implies => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                Ok(((l == 0 || r != 0) as i64, boolean))
            }
            ExprKind::Iff => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                Ok((((l != 0) == (r != 0)) as i64, boolean))
            }

            ExprKind::Eq | ExprKind::Ne => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                let eq = l == r;
                Ok(
                    ((if pool.kind(expr) == ExprKind::Eq { eq } else { !eq }) as i64,
                        boolean),
                )
            }

            ExprKind::Lt | ExprKind::Le | ExprKind::Gt | ExprKind::Ge => {
                let (l, _) = self.eval(ctx, pool.lhs(expr), step)?;
                let (r, _) = self.eval(ctx, pool.rhs(expr), step)?;
                let v = match pool.kind(expr) {
                    ExprKind::Lt => l < r,
                    ExprKind::Le => l <= r,
                    ExprKind::Gt => l > r,
                    ExprKind::Ge => l >= r,
                    _ => unreachable!(),
                };
                Ok((v as i64, boolean))
            }

            ExprKind::Ite => {
                let cond_node = pool.lhs(expr);
                let (c, _) = self.eval(ctx, pool.lhs(cond_node), step)?;
                if c != 0 {
                    self.eval(ctx, pool.rhs(cond_node), step)
                } else {
                    self.eval(ctx, pool.rhs(expr), step)
                }
            }

            ExprKind::Dot => {
                let nested = resolver::instance_context(
                    self.pool,
                    self.tm,
                    self.model,
                    ctx,
                    pool.lhs(expr),
                )
                .map_err(|_| EvalError::NoValue)?;
                self.eval(nested, pool.rhs(expr), step)
            }

            ExprKind::Params => {
                let body = preprocessor::expand_call(pool, tm, self.model, ctx, expr)
                    .map_err(|_| EvalError::NoValue)?;
                self.eval(ctx, body, step)
            }

            ExprKind::Subscript => self.walk_subscript(ctx, expr, step),

            ExprKind::Cast => {
                let (v, src) = self.eval(ctx, pool.rhs(expr), step)?;
                match pool.node(pool.lhs(expr)).data {
                    sybil_expr::ExprData::Atom(_) => Ok(((v != 0) as i64, boolean)),
                    sybil_expr::ExprData::Value(w) => {
                        let w = w as u32;
                        let ty = if tm.is_signed(src) {
                            tm.find_signed(w)
                        } else {
                            tm.find_unsigned(w)
                        };
                        Ok((self.truncate(v, ty), ty))
                    }
                    _ => Err(EvalError::Unsupported),
                }
            }

            _ => Err(EvalError::Unsupported),
        }
    }

    /// Wraps a value into its type's width.
    fn truncate(&self, v: i64, ty: TypeId) -> i64 {
        match self.tm.desc(ty) {
            sybil_type::TypeDesc::UnsignedAlgebraic(w) if w < 64 => {
                v & ((1_i64 << w) - 1)
            }
            sybil_type::TypeDesc::SignedAlgebraic(w) if w < 64 => {
                let m = 1_i64 << (w - 1);
                let masked = v & ((1_i64 << w) - 1);
                (masked ^ m) - m
            }
            _ => v,
        }
    }

    fn walk_leaf(
        &mut self,
        ctx: ExprId,
        expr: ExprId,
        step: Step,
    ) -> Result<(i64, TypeId), EvalError> {
        let pool = self.pool;
        let tm = self.tm;

        if pool.is_true(expr) {
            return Ok((1, tm.find_boolean()));
        }
        if pool.is_false(expr) {
            return Ok((0, tm.find_boolean()));
        }

        let resolver = Resolver::new(pool, tm, self.model);
        match resolver.resolve(ctx, expr).map_err(|_| EvalError::NoValue)? {
            Resolved::Literal(lit) => Ok((lit.value as i64, lit.ty)),

            Resolved::Constant(konst) => Ok((konst.value as i64, konst.ty)),

            Resolved::Variable { fqn, var, .. } => {
                let value = self
                    .witness
                    .value(fqn, step)
                    .ok_or(EvalError::NoValue)?;
                Ok((self.value_of(value)?, var.ty))
            }

            Resolved::Define { ctx: dctx, def } => {
                if !def.formals.is_empty() {
                    return Err(EvalError::Unsupported);
                }
                self.eval(dctx, def.body, step)
            }

            Resolved::Parameter { fqn } => {
                let (rctx, actual) = self
                    .model
                    .rewrite_parameter(fqn)
                    .ok_or(EvalError::NoValue)?;
                self.eval(rctx, actual, step)
            }
        }
    }

    fn walk_subscript(
        &mut self,
        ctx: ExprId,
        expr: ExprId,
        step: Step,
    ) -> Result<(i64, TypeId), EvalError> {
        let pool = self.pool;
        let (index, _) = self.eval(ctx, pool.rhs(expr), step)?;

        // the array side must be a variable whose frame value is a
        // braced element list
        let array = pool.lhs(expr);
        if !pool.is_ident(array) {
            return Err(EvalError::Unsupported);
        }
        let resolver = Resolver::new(pool, self.tm, self.model);
        let Resolved::Variable { fqn, var, .. } =
            resolver.resolve(ctx, array).map_err(|_| EvalError::NoValue)?
        else {
            return Err(EvalError::Unsupported);
        };

        let elem_ty = match self.tm.desc(var.ty) {
            sybil_type::TypeDesc::Array { elem, .. } => elem,
            _ => return Err(EvalError::Unsupported),
        };

        let value = self.witness.value(fqn, step).ok_or(EvalError::NoValue)?;
        if pool.kind(value) != ExprKind::Set {
            return Err(EvalError::NoValue);
        }
        let elems = preprocessor::comma_list(pool, pool.lhs(value));
        let elem = elems
            .get(index as usize)
            .copied()
            .ok_or(EvalError::NoValue)?;
        Ok((self.value_of(elem)?, elem_ty))
    }

    /// Numeric payload of a frame value expression.
    fn value_of(&self, value: ExprId) -> Result<i64, EvalError> {
        let pool = self.pool;
        if pool.is_true(value) {
            return Ok(1);
        }
        if pool.is_false(value) {
            return Ok(0);
        }
        match pool.kind(value) {
            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst => {
                Ok(pool.value(value) as i64)
            }
            ExprKind::Neg => {
                let inner = pool.lhs(value);
                Ok(-(pool.value(inner) as i64))
            }
            ExprKind::Ident => {
                // an enum literal
                self.model
                    .literal(pool.atom(value))
                    .map(|l| l.value as i64)
                    .ok_or(EvalError::NoValue)
            }
            ExprKind::Undef => Err(EvalError::NoValue),
            _ => Err(EvalError::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sybil_model::{Define, Module, Variable};

    fn setup() -> (ExprPool, TypeMgr, Model) {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let mut model = Model::new();
        let main = pool.atoms().intern("main");
        let mut m = Module::new(main);
        let x = pool.make_ident("x");
        m.add_var(Variable::new(main, x, tm.find_unsigned(4))).unwrap();
        let d = pool.make_ident("d");
        m.add_define(Define {
            module: main,
            name: d,
            body: pool.make_add(x, pool.make_iconst(1)),
            formals: vec![],
        })
        .unwrap();
        model.add_module(m).unwrap();
        model.bind_params(&pool, &tm).unwrap();
        (pool, tm, model)
    }

    #[test]
    fn defines_evaluate_against_the_frame() {
        let (pool, tm, model) = setup();
        let x = pool.make_ident("x");
        let fqn = pool.make_dot(pool.empty_expr(), x);

        let mut w = Witness::new("w", "");
        w.new_frame().set(fqn, pool.make_iconst(2));
        w.new_frame().set(fqn, pool.make_iconst(3));

        let mut ev = Evaluator::new(&pool, &tm, &model, &w);
        let d = pool.make_ident("d");
        assert_eq!(ev.process(pool.empty_expr(), d, 0), pool.make_iconst(3));
        assert_eq!(ev.process(pool.empty_expr(), d, 1), pool.make_iconst(4));
    }

    #[test]
    fn next_advances_the_step() {
        let (pool, tm, model) = setup();
        let x = pool.make_ident("x");
        let fqn = pool.make_dot(pool.empty_expr(), x);

        let mut w = Witness::new("w", "");
        w.new_frame().set(fqn, pool.make_iconst(5));
        w.new_frame().set(fqn, pool.make_iconst(6));

        let mut ev = Evaluator::new(&pool, &tm, &model, &w);
        let nx = pool.make_next(x);
        assert_eq!(ev.process(pool.empty_expr(), nx, 0), pool.make_iconst(6));
        // past the last frame there is no value
        assert_eq!(ev.process(pool.empty_expr(), nx, 1), pool.undef_expr());
    }

    #[test]
    fn missing_symbols_yield_undef() {
        let (pool, tm, model) = setup();
        let w = Witness::new("w", "");
        let mut ev = Evaluator::new(&pool, &tm, &model, &w);
        let x = pool.make_ident("x");
        assert_eq!(ev.process(pool.empty_expr(), x, 0), pool.undef_expr());
    }

    #[test]
    fn boolean_connectives_evaluate() {
        let (pool, tm, model) = setup();
        let mut w = Witness::new("w", "");
        w.new_frame();
        let mut ev = Evaluator::new(&pool, &tm, &model, &w);
        let t = pool.true_expr();
        let f = pool.false_expr();
        let e = pool.make_and(t, pool.make_or(f, t));
        assert_eq!(ev.process(pool.empty_expr(), e, 0), pool.true_expr());
    }
}
