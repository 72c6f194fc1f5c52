//! The model: a set of modules rooted at `main`.

use std::collections::HashMap;

use sybil_base::Atom;
use sybil_expr::{ExprId, ExprPool};
use sybil_type::{TypeDesc, TypeError, TypeMgr};

use crate::error::{ResolutionError, SemanticError};
use crate::module::Module;
use crate::symbol::Literal;

/// A whole model. Owns its modules; keeps the global enum-literal table
/// and, once [`Model::bind_params`] has run, the formal→actual parameter
/// rewriting map and the flattened instance tree.
#[derive(Debug)]
pub struct Model {
    modules: Vec<Module>,
    by_name: HashMap<Atom, usize>,
    literals: HashMap<Atom, Literal>,
    /// formal qualified name → (instantiating context, actual expression)
    params: HashMap<ExprId, (ExprId, ExprId)>,
    /// instance contexts in hierarchy order: `(ctx, module index)`
    instances: Vec<(ExprId, usize)>,
}

impl Model {
    pub fn new() -> Self {
        Model {
            modules: Vec::new(),
            by_name: HashMap::new(),
            literals: HashMap::new(),
            params: HashMap::new(),
            instances: Vec::new(),
        }
    }

    pub fn add_module(&mut self, module: Module) -> Result<(), SemanticError> {
        let name = module.name();
        if self.by_name.contains_key(&name) {
            return Err(SemanticError::DuplicateModule { name });
        }
        self.by_name.insert(name, self.modules.len());
        self.modules.push(module);
        Ok(())
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, name: Atom) -> Option<&Module> {
        self.by_name.get(&name).map(|&i| &self.modules[i])
    }

    pub fn module_mut(&mut self, name: Atom) -> Option<&mut Module> {
        let i = *self.by_name.get(&name)?;
        Some(&mut self.modules[i])
    }

    pub(crate) fn module_at(&self, index: usize) -> &Module {
        &self.modules[index]
    }

    pub(crate) fn module_index(&self, name: Atom) -> Option<usize> {
        self.by_name.get(&name).copied()
    }

    /// Registers the literals of an enum type. `site` is the declaring
    /// node, attached to duplicate-literal errors.
    pub fn register_literals(
        &mut self,
        tm: &TypeMgr,
        ty: sybil_type::TypeId,
        site: ExprId,
    ) -> Result<(), TypeError> {
        if let TypeDesc::Enum(lits) = tm.desc(ty) {
            for (code, &atom) in lits.iter().enumerate() {
                if let Some(existing) = self.literals.get(&atom) {
                    if existing.ty != ty {
                        return Err(TypeError::DuplicateLiteral { expr: site });
                    }
                    continue;
                }
                self.literals.insert(
                    atom,
                    Literal {
                        name: atom,
                        ty,
                        value: code as u64,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn literal(&self, name: Atom) -> Option<Literal> {
        self.literals.get(&name).copied()
    }

    /// The module a context denotes: the empty context is `main`, and
    /// each further dot component must name an instance variable.
    pub fn module_of_ctx<'m>(
        &'m self,
        pool: &ExprPool,
        tm: &TypeMgr,
        ctx: ExprId,
    ) -> Result<&'m Module, ResolutionError> {
        self.module_index_of_ctx(pool, tm, ctx)
            .map(|i| &self.modules[i])
    }

    fn module_index_of_ctx(
        &self,
        pool: &ExprPool,
        tm: &TypeMgr,
        ctx: ExprId,
    ) -> Result<usize, ResolutionError> {
        if ctx == pool.empty_expr() {
            let main = pool.atoms().lookup("main").unwrap_or_default();
            return self.module_index(main).ok_or(ResolutionError { expr: ctx });
        }
        if !pool.is_dot(ctx) {
            return Err(ResolutionError { expr: ctx });
        }
        let prefix = pool.lhs(ctx);
        let name = pool.rhs(ctx);
        let outer = self.module_index_of_ctx(pool, tm, prefix)?;
        let var = self.modules[outer]
            .var(name)
            .ok_or(ResolutionError { expr: ctx })?;
        match tm.desc(var.ty) {
            TypeDesc::Instance(module) => {
                self.module_index(module).ok_or(ResolutionError { expr: ctx })
            }
            _ => Err(ResolutionError { expr: ctx }),
        }
    }

    /// Walks the instance hierarchy from `main`, recording every
    /// instance context and binding formal parameters to their actuals.
    ///
    /// Must run once after model construction; resolution of parameters
    /// and the algorithms' symbol iteration depend on it.
    pub fn bind_params(
        &mut self,
        pool: &ExprPool,
        tm: &TypeMgr,
    ) -> Result<(), SemanticError> {
        self.params.clear();
        self.instances.clear();

        let main = pool
            .atoms()
            .lookup("main")
            .and_then(|a| self.module_index(a))
            .ok_or(SemanticError::UnknownModule {
                expr: pool.empty_expr(),
            })?;

        let mut stack = vec![(pool.empty_expr(), main)];
        while let Some((ctx, index)) = stack.pop() {
            self.instances.push((ctx, index));

            // collect instance work first; inserting bindings needs &mut self
            let mut work: Vec<(ExprId, usize, Vec<(ExprId, (ExprId, ExprId))>)> = Vec::new();
            {
                let module = &self.modules[index];
                for var in module.vars() {
                    let TypeDesc::Instance(inner_name) = tm.desc(var.ty) else {
                        continue;
                    };
                    let inner = self.module_index(inner_name).ok_or(
                        SemanticError::UnknownModule { expr: var.name },
                    )?;
                    let formals = self.modules[inner].params();
                    if formals.len() != var.actuals.len() {
                        return Err(SemanticError::ArityMismatch { expr: var.name });
                    }

                    let inner_ctx = pool.make_dot(ctx, var.name);
                    let bindings: Vec<(ExprId, (ExprId, ExprId))> = formals
                        .iter()
                        .zip(var.actuals.iter())
                        .map(|(formal, &actual)| {
                            (pool.make_dot(inner_ctx, formal.name), (ctx, actual))
                        })
                        .collect();
                    work.push((inner_ctx, inner, bindings));
                }
            }

            for (inner_ctx, inner, bindings) in work {
                for (fqn, binding) in bindings {
                    self.params.insert(fqn, binding);
                }
                stack.push((inner_ctx, inner));
            }
        }
        Ok(())
    }

    /// Parameter rewriting: the qualified formal name resolves to an
    /// actual expression evaluated in the instantiating context.
    pub fn rewrite_parameter(&self, fqn: ExprId) -> Option<(ExprId, ExprId)> {
        self.params.get(&fqn).copied()
    }

    /// Instance contexts recorded by [`Model::bind_params`], root first.
    pub fn instances(&self) -> &[(ExprId, usize)] {
        &self.instances
    }

    /// Iterates `(ctx, variable)` over the whole instance tree, in
    /// declaration order within each instance.
    pub fn each_variable<'m>(
        &'m self,
    ) -> impl Iterator<Item = (ExprId, &'m crate::symbol::Variable)> + 'm {
        self.instances
            .iter()
            .flat_map(move |&(ctx, index)| {
                self.modules[index].vars().iter().map(move |v| (ctx, v))
            })
    }

    /// Iterates `(ctx, define)` over the whole instance tree.
    pub fn each_define<'m>(
        &'m self,
    ) -> impl Iterator<Item = (ExprId, &'m crate::symbol::Define)> + 'm {
        self.instances
            .iter()
            .flat_map(move |&(ctx, index)| {
                self.modules[index].defines().iter().map(move |d| (ctx, d))
            })
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Parameter, Variable};

    fn fixture() -> (ExprPool, TypeMgr, Model) {
        let pool = ExprPool::new();
        let tm = TypeMgr::new();
        let model = Model::new();
        (pool, tm, model)
    }

    #[test]
    fn empty_context_resolves_to_main() {
        let (pool, tm, mut model) = fixture();
        let main = pool.atoms().intern("main");
        model.add_module(Module::new(main)).unwrap();
        let m = model.module_of_ctx(&pool, &tm, pool.empty_expr()).unwrap();
        assert_eq!(m.name(), main);
    }

    #[test]
    fn instance_context_resolves_through_the_variable() {
        let (pool, tm, mut model) = fixture();
        let main = pool.atoms().intern("main");
        let counter = pool.atoms().intern("Counter");

        let mut mm = Module::new(main);
        let m1 = pool.make_ident("m1");
        mm.add_var(Variable::new(main, m1, tm.find_instance(counter)))
            .unwrap();
        model.add_module(mm).unwrap();
        model.add_module(Module::new(counter)).unwrap();

        let ctx = pool.make_dot(pool.empty_expr(), m1);
        let m = model.module_of_ctx(&pool, &tm, ctx).unwrap();
        assert_eq!(m.name(), counter);
    }

    #[test]
    fn bind_params_records_formal_bindings() {
        let (pool, tm, mut model) = fixture();
        let main = pool.atoms().intern("main");
        let modm = pool.atoms().intern("M");

        let x = pool.make_ident("x");
        let m1 = pool.make_ident("m1");
        let p = pool.make_ident("p");

        let mut mm = Module::new(main);
        mm.add_var(Variable::new(main, x, tm.find_unsigned(2))).unwrap();
        mm.add_var(
            Variable::new(main, m1, tm.find_instance(modm)).with_actuals(vec![x]),
        )
        .unwrap();
        model.add_module(mm).unwrap();

        let mut inner = Module::new(modm);
        inner
            .add_parameter(Parameter {
                module: modm,
                name: p,
            })
            .unwrap();
        model.add_module(inner).unwrap();

        model.bind_params(&pool, &tm).unwrap();

        let inner_ctx = pool.make_dot(pool.empty_expr(), m1);
        let fqn = pool.make_dot(inner_ctx, p);
        let (ctx, actual) = model.rewrite_parameter(fqn).unwrap();
        assert_eq!(ctx, pool.empty_expr());
        assert_eq!(actual, x);
    }

    #[test]
    fn arity_mismatch_is_detected() {
        let (pool, tm, mut model) = fixture();
        let main = pool.atoms().intern("main");
        let modm = pool.atoms().intern("M");

        let m1 = pool.make_ident("m1");
        let mut mm = Module::new(main);
        mm.add_var(Variable::new(main, m1, tm.find_instance(modm)))
            .unwrap();
        model.add_module(mm).unwrap();

        let mut inner = Module::new(modm);
        inner
            .add_parameter(Parameter {
                module: modm,
                name: pool.make_ident("p"),
            })
            .unwrap();
        model.add_module(inner).unwrap();

        assert!(matches!(
            model.bind_params(&pool, &tm),
            Err(SemanticError::ArityMismatch { .. })
        ));
    }
}
