//! The type manager: canonical instances and the inference table.

use std::collections::HashMap;
use std::sync::Mutex;

use sybil_base::{Atom, AtomPool};
use sybil_expr::{ExprId, ExprKind};

use crate::error::TypeError;
use crate::types::{TypeDesc, TypeId};

#[derive(Default)]
struct Inner {
    types: Vec<TypeDesc>,
    map: HashMap<TypeDesc, TypeId>,
}

/// Owner of every type in the process.
///
/// Lookups take a structural description and return the cached canonical
/// id; equal descriptions always share identity.
pub struct TypeMgr {
    inner: Mutex<Inner>,
    boolean: TypeId,
    int_const: TypeId,
}

impl TypeMgr {
    pub fn new() -> Self {
        let mgr = TypeMgr {
            inner: Mutex::new(Inner::default()),
            boolean: TypeId(0),
            int_const: TypeId(0),
        };
        let boolean = mgr.find(TypeDesc::Boolean);
        let int_const = mgr.find(TypeDesc::IntConst);
        TypeMgr {
            boolean,
            int_const,
            ..mgr
        }
    }

    /// The canonical id for a description.
    pub fn find(&self, desc: TypeDesc) -> TypeId {
        let mut inner = self.inner.lock().expect("type mgr poisoned");
        if let Some(&id) = inner.map.get(&desc) {
            return id;
        }
        let id = TypeId(inner.types.len() as u32);
        inner.types.push(desc.clone());
        inner.map.insert(desc, id);
        id
    }

    pub fn find_boolean(&self) -> TypeId {
        self.boolean
    }

    pub fn find_int_const(&self) -> TypeId {
        self.int_const
    }

    pub fn find_unsigned(&self, width: u32) -> TypeId {
        self.find(TypeDesc::UnsignedAlgebraic(width))
    }

    pub fn find_signed(&self, width: u32) -> TypeId {
        self.find(TypeDesc::SignedAlgebraic(width))
    }

    /// Interns an enum type. Literals are sorted; their position in the
    /// sorted list is the literal's integer code.
    pub fn find_enum(&self, mut literals: Vec<Atom>) -> TypeId {
        literals.sort();
        literals.dedup();
        self.find(TypeDesc::Enum(literals))
    }

    pub fn find_array(&self, elem: TypeId, nelems: u32) -> TypeId {
        self.find(TypeDesc::Array { elem, nelems })
    }

    pub fn find_instance(&self, module: Atom) -> TypeId {
        self.find(TypeDesc::Instance(module))
    }

    pub fn desc(&self, id: TypeId) -> TypeDesc {
        let inner = self.inner.lock().expect("type mgr poisoned");
        inner.types[id.index()].clone()
    }

    /// Width in bits. Monolithic booleans take one bit, enums
    /// `ceil(log2(|literals|))`, algebraics their declared width, arrays
    /// `nelems * elem_width`.
    pub fn width(&self, id: TypeId) -> u32 {
        match self.desc(id) {
            TypeDesc::Boolean | TypeDesc::IntConst => 1,
            TypeDesc::SignedAlgebraic(w) | TypeDesc::UnsignedAlgebraic(w) => w,
            TypeDesc::Enum(lits) => {
                let mut bits = 0;
                let mut pow: usize = 1;
                while pow < lits.len() {
                    bits += 1;
                    pow *= 2;
                }
                bits.max(1)
            }
            TypeDesc::Array { elem, nelems } => nelems * self.width(elem),
            TypeDesc::Instance(_) => 0,
        }
    }

    pub fn is_boolean(&self, id: TypeId) -> bool {
        id == self.boolean
    }

    pub fn is_int_const(&self, id: TypeId) -> bool {
        id == self.int_const
    }

    pub fn is_algebraic(&self, id: TypeId) -> bool {
        self.desc(id).is_algebraic()
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        self.desc(id).is_signed()
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        self.desc(id).is_enum()
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        self.desc(id).is_array()
    }

    pub fn is_instance(&self, id: TypeId) -> bool {
        self.desc(id).is_instance()
    }

    pub fn is_monolithic(&self, id: TypeId) -> bool {
        self.desc(id).is_monolithic()
    }

    /// Integer code of an enum literal, or `None` if absent.
    pub fn enum_code(&self, id: TypeId, literal: Atom) -> Option<u64> {
        match self.desc(id) {
            TypeDesc::Enum(lits) => lits.iter().position(|&a| a == literal).map(|p| p as u64),
            _ => None,
        }
    }

    /// Renders a type for diagnostics and model dumping.
    pub fn display(&self, id: TypeId, atoms: &AtomPool) -> String {
        match self.desc(id) {
            TypeDesc::Boolean => "boolean".into(),
            TypeDesc::IntConst => "const int".into(),
            TypeDesc::SignedAlgebraic(w) => format!("signed int({})", w),
            TypeDesc::UnsignedAlgebraic(w) => format!("unsigned int({})", w),
            TypeDesc::Enum(lits) => {
                let names: Vec<String> =
                    lits.iter().map(|&a| atoms.resolve(a).to_string()).collect();
                format!("{{ {} }}", names.join(", "))
            }
            TypeDesc::Array { elem, nelems } => {
                format!("{}[{}]", self.display(elem, atoms), nelems)
            }
            TypeDesc::Instance(m) => atoms.resolve(m).to_string(),
        }
    }

    // -- inference table -----------------------------------------------------

    /// Joins two algebraic operand types, promoting bare integer
    /// constants to the other side's width.
    fn algebraic_join(
        &self,
        expr: ExprId,
        lhs: TypeId,
        rhs: TypeId,
    ) -> Result<TypeId, TypeError> {
        if !self.is_algebraic(lhs) || !self.is_algebraic(rhs) {
            return Err(TypeError::BadType {
                expr,
                expected: "algebraic",
            });
        }
        if self.is_int_const(lhs) && self.is_int_const(rhs) {
            return Ok(self.int_const);
        }
        if self.is_int_const(lhs) {
            return Ok(rhs);
        }
        if self.is_int_const(rhs) {
            return Ok(lhs);
        }
        if lhs == rhs {
            return Ok(lhs);
        }
        Err(TypeError::TypeMismatch { expr })
    }

    /// The result type of a binary (or, for ITE, ternary) operator
    /// applied to the given operand types. This is the §4.2 rule table.
    pub fn result_type(
        &self,
        expr: ExprId,
        kind: ExprKind,
        lhs: TypeId,
        rhs: TypeId,
    ) -> Result<TypeId, TypeError> {
        match kind {
            // arithmetic: both algebraic of equal type, const promotes
            ExprKind::Add
            | ExprKind::Sub
            | ExprKind::Mul
            | ExprKind::Div
            | ExprKind::Mod => self.algebraic_join(expr, lhs, rhs),

            // strict bitwise: both algebraic of equal width
            ExprKind::BwAnd | ExprKind::BwOr => self.algebraic_join(expr, lhs, rhs),

            // xor/xnor double as boolean connectives
            ExprKind::BwXor | ExprKind::BwXnor => {
                if self.is_boolean(lhs) && self.is_boolean(rhs) {
                    Ok(self.boolean)
                } else {
                    self.algebraic_join(expr, lhs, rhs)
                }
            }

            // logical: strictly boolean
            ExprKind::And | ExprKind::Or | ExprKind::Implies | ExprKind::Iff => {
                if self.is_boolean(lhs) && self.is_boolean(rhs) {
                    Ok(self.boolean)
                } else {
                    Err(TypeError::BadType {
                        expr,
                        expected: "boolean",
                    })
                }
            }

            // shifts: rhs drives the amount, the result keeps lhs's type
            ExprKind::Lshift | ExprKind::Rshift => {
                let joined = self.algebraic_join(expr, lhs, rhs)?;
                if self.is_int_const(lhs) {
                    Ok(joined)
                } else {
                    Ok(lhs)
                }
            }

            // relational: algebraic operands, boolean result
            ExprKind::Lt | ExprKind::Le | ExprKind::Gt | ExprKind::Ge => {
                self.algebraic_join(expr, lhs, rhs)?;
                Ok(self.boolean)
            }

            // equality additionally covers booleans and enums
            ExprKind::Eq | ExprKind::Ne => {
                if self.is_boolean(lhs) && self.is_boolean(rhs) {
                    return Ok(self.boolean);
                }
                if self.is_enum(lhs) && lhs == rhs {
                    return Ok(self.boolean);
                }
                self.algebraic_join(expr, lhs, rhs)?;
                Ok(self.boolean)
            }

            _ => unreachable!("result_type on non-binary operator"),
        }
    }

    /// ITE branches must agree (with const promotion); the condition is
    /// checked by the caller.
    pub fn ite_type(&self, expr: ExprId, lhs: TypeId, rhs: TypeId) -> Result<TypeId, TypeError> {
        if lhs == rhs {
            return Ok(lhs);
        }
        if self.is_algebraic(lhs) && self.is_algebraic(rhs) {
            return self.algebraic_join(expr, lhs, rhs);
        }
        Err(TypeError::TypeMismatch { expr })
    }
}

impl Default for TypeMgr {
    fn default() -> Self {
        Self::new()
    }
}
