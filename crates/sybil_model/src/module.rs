//! Modules: named containers of symbols and FSM sections.

use std::collections::{HashMap, HashSet};

use sybil_base::Atom;
use sybil_expr::ExprId;

use crate::error::SemanticError;
use crate::symbol::{Constant, Define, Parameter, Variable};

/// A module declaration: local variables, formal parameters, defines and
/// the ordered INIT / INVAR / TRANS section bodies.
///
/// Duplicate local names are rejected at insertion time.
#[derive(Debug)]
pub struct Module {
    name: Atom,
    locals: HashSet<ExprId>,

    vars: Vec<Variable>,
    var_index: HashMap<ExprId, usize>,

    params: Vec<Parameter>,

    constants: Vec<Constant>,
    constant_index: HashMap<ExprId, usize>,

    defines: Vec<Define>,
    define_index: HashMap<ExprId, usize>,

    init: Vec<ExprId>,
    invar: Vec<ExprId>,
    trans: Vec<ExprId>,
}

impl Module {
    pub fn new(name: Atom) -> Self {
        Module {
            name,
            locals: HashSet::new(),
            vars: Vec::new(),
            var_index: HashMap::new(),
            params: Vec::new(),
            constants: Vec::new(),
            constant_index: HashMap::new(),
            defines: Vec::new(),
            define_index: HashMap::new(),
            init: Vec::new(),
            invar: Vec::new(),
            trans: Vec::new(),
        }
    }

    pub fn name(&self) -> Atom {
        self.name
    }

    fn check_duplicate(&mut self, name: ExprId) -> Result<(), SemanticError> {
        if !self.locals.insert(name) {
            return Err(SemanticError::DuplicateName { name });
        }
        Ok(())
    }

    pub fn add_var(&mut self, var: Variable) -> Result<(), SemanticError> {
        self.check_duplicate(var.name)?;
        self.var_index.insert(var.name, self.vars.len());
        self.vars.push(var);
        Ok(())
    }

    pub fn add_parameter(&mut self, param: Parameter) -> Result<(), SemanticError> {
        self.check_duplicate(param.name)?;
        self.params.push(param);
        Ok(())
    }

    pub fn add_constant(&mut self, konst: Constant) -> Result<(), SemanticError> {
        self.check_duplicate(konst.name)?;
        self.constant_index.insert(konst.name, self.constants.len());
        self.constants.push(konst);
        Ok(())
    }

    pub fn add_define(&mut self, def: Define) -> Result<(), SemanticError> {
        self.check_duplicate(def.name)?;
        self.define_index.insert(def.name, self.defines.len());
        self.defines.push(def);
        Ok(())
    }

    pub fn add_init(&mut self, expr: ExprId) {
        self.init.push(expr);
    }

    pub fn add_invar(&mut self, expr: ExprId) {
        self.invar.push(expr);
    }

    pub fn add_trans(&mut self, expr: ExprId) {
        self.trans.push(expr);
    }

    /// Declaration-ordered variables.
    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn var(&self, name: ExprId) -> Option<&Variable> {
        self.var_index.get(&name).map(|&i| &self.vars[i])
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, name: ExprId) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn constant(&self, name: ExprId) -> Option<Constant> {
        self.constant_index.get(&name).map(|&i| self.constants[i])
    }

    pub fn defines(&self) -> &[Define] {
        &self.defines
    }

    pub fn define(&self, name: ExprId) -> Option<&Define> {
        self.define_index.get(&name).map(|&i| &self.defines[i])
    }

    pub fn init(&self) -> &[ExprId] {
        &self.init
    }

    pub fn invar(&self) -> &[ExprId] {
        &self.invar
    }

    pub fn trans(&self) -> &[ExprId] {
        &self.trans
    }

    /// Replaces a section body in place; used by the analyzer's
    /// normalisation pass.
    pub fn set_init(&mut self, bodies: Vec<ExprId>) {
        self.init = bodies;
    }

    pub fn set_invar(&mut self, bodies: Vec<ExprId>) {
        self.invar = bodies;
    }

    pub fn set_trans(&mut self, bodies: Vec<ExprId>) {
        self.trans = bodies;
    }

    pub fn set_define_body(&mut self, name: ExprId, body: ExprId) {
        if let Some(&i) = self.define_index.get(&name) {
            self.defines[i].body = body;
        }
    }
}
