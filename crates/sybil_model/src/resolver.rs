//! Hierarchical symbol resolution.
//!
//! Given a context (a qualified instance name) and a plain identifier,
//! the resolver climbs the module hierarchy by consuming dot prefixes
//! from the context until a binding is found. Parameters are not
//! variables: callers are expected to follow up with
//! [`crate::Model::rewrite_parameter`].

use sybil_expr::{ExprId, ExprPool};
use sybil_type::TypeMgr;

use crate::error::ResolutionError;
use crate::model::Model;
use crate::symbol::{Constant, Define, Literal, Variable};

/// A successful resolution.
pub enum Resolved<'m> {
    Variable {
        /// Context the variable was found in (after climbing).
        ctx: ExprId,
        /// Canonical qualified name: `ctx . name`.
        fqn: ExprId,
        var: &'m Variable,
    },
    Constant(Constant),
    Define {
        ctx: ExprId,
        def: &'m Define,
    },
    Parameter {
        /// Qualified formal name, the key for parameter rewriting.
        fqn: ExprId,
    },
    Literal(Literal),
}

pub struct Resolver<'m> {
    pool: &'m ExprPool,
    tm: &'m TypeMgr,
    model: &'m Model,
}

impl<'m> Resolver<'m> {
    pub fn new(pool: &'m ExprPool, tm: &'m TypeMgr, model: &'m Model) -> Self {
        Resolver { pool, tm, model }
    }

    /// Resolves `name` against `ctx`, climbing towards the root.
    pub fn resolve(&self, ctx: ExprId, name: ExprId) -> Result<Resolved<'m>, ResolutionError> {
        let mut cur = ctx;
        loop {
            if let Ok(module) = self.model.module_of_ctx(self.pool, self.tm, cur) {
                if module.param(name).is_some() {
                    return Ok(Resolved::Parameter {
                        fqn: self.pool.make_dot(cur, name),
                    });
                }
                if let Some(var) = module.var(name) {
                    return Ok(Resolved::Variable {
                        ctx: cur,
                        fqn: self.pool.make_dot(cur, name),
                        var,
                    });
                }
                if let Some(konst) = module.constant(name) {
                    return Ok(Resolved::Constant(konst));
                }
                if let Some(def) = module.define(name) {
                    return Ok(Resolved::Define { ctx: cur, def });
                }
            }

            if cur == self.pool.empty_expr() {
                break;
            }
            cur = if self.pool.is_dot(cur) {
                self.pool.lhs(cur)
            } else {
                self.pool.empty_expr()
            };
        }

        // enum literals live outside the module hierarchy
        if self.pool.is_ident(name) {
            if let Some(lit) = self.model.literal(self.pool.atom(name)) {
                return Ok(Resolved::Literal(lit));
            }
        }

        Err(ResolutionError {
            expr: self.pool.make_dot(ctx, name),
        })
    }
}

/// The instance context denoted by a dot-chain prefix: each component
/// must name an instance-typed variable.
pub fn instance_context(
    pool: &ExprPool,
    tm: &TypeMgr,
    model: &Model,
    ctx: ExprId,
    prefix: ExprId,
) -> Result<ExprId, crate::error::ModelError> {
    use crate::error::ModelError;
    use sybil_type::TypeError;

    if pool.is_dot(prefix) {
        let outer = instance_context(pool, tm, model, ctx, pool.lhs(prefix))?;
        let name = pool.rhs(prefix);
        let module = model
            .module_of_ctx(pool, tm, outer)
            .map_err(ModelError::Resolution)?;
        return match module.var(name) {
            Some(var) if tm.is_instance(var.ty) => Ok(pool.make_dot(outer, name)),
            _ => Err(TypeError::BadType {
                expr: name,
                expected: "module instance",
            }
            .into()),
        };
    }
    if pool.is_ident(prefix) {
        let resolver = Resolver::new(pool, tm, model);
        return match resolver.resolve(ctx, prefix)? {
            Resolved::Variable { fqn, var, .. } if tm.is_instance(var.ty) => Ok(fqn),
            _ => Err(TypeError::BadType {
                expr: prefix,
                expected: "module instance",
            }
            .into()),
        };
    }
    Err(TypeError::IdentifierExpected { expr: prefix }.into())
}
