//! The hash-consed expression pool.
//!
//! [`ExprPool`] owns every expression node in the process. Construction
//! goes through `make_*` helpers which intern the node shape: requesting
//! the same `(kind, operands)` twice yields the same [`ExprId`]. Atoms
//! live in a nested [`AtomPool`]; both pools serialize construction with
//! their own mutex, so the pool can be shared freely.

use std::collections::HashMap;
use std::sync::Mutex;

use sybil_base::{Atom, AtomPool};

use crate::kind::ExprKind;

/// Payload of numeric constants.
pub type Value = u64;

/// Handle to a pooled expression node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operand payload of a node. One of: an interned atom (identifiers), a
/// numeric value (constants), one or two children, or nothing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ExprData {
    Atom(Atom),
    Value(Value),
    Unary(ExprId),
    Binary(ExprId, ExprId),
    Nil,
}

/// An immutable expression node: a tag plus its payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub data: ExprData,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<ExprNode>,
    map: HashMap<ExprNode, ExprId>,
}

/// The process-wide expression store.
pub struct ExprPool {
    atoms: AtomPool,
    inner: Mutex<Inner>,

    // well-known nodes, interned eagerly
    true_expr: ExprId,
    false_expr: ExprId,
    empty_expr: ExprId,
    main_expr: ExprId,
    undef_expr: ExprId,
}

impl ExprPool {
    pub fn new() -> Self {
        let atoms = AtomPool::new();
        let inner = Mutex::new(Inner::default());
        let mut pool = ExprPool {
            atoms,
            inner,
            true_expr: ExprId(0),
            false_expr: ExprId(0),
            empty_expr: ExprId(0),
            main_expr: ExprId(0),
            undef_expr: ExprId(0),
        };
        pool.true_expr = pool.make_ident("TRUE");
        pool.false_expr = pool.make_ident("FALSE");
        pool.empty_expr = pool.make_ident("");
        pool.main_expr = pool.make_ident("main");
        pool.undef_expr = pool.make(ExprKind::Undef, ExprData::Nil);
        pool
    }

    pub fn atoms(&self) -> &AtomPool {
        &self.atoms
    }

    /// The canonical node for the given shape.
    pub fn make(&self, kind: ExprKind, data: ExprData) -> ExprId {
        let node = ExprNode { kind, data };
        let mut inner = self.inner.lock().expect("expr pool poisoned");
        if let Some(&id) = inner.map.get(&node) {
            return id;
        }
        let id = ExprId(inner.nodes.len() as u32);
        inner.nodes.push(node);
        inner.map.insert(node, id);
        id
    }

    pub fn node(&self, id: ExprId) -> ExprNode {
        let inner = self.inner.lock().expect("expr pool poisoned");
        inner.nodes[id.index()]
    }

    pub fn kind(&self, id: ExprId) -> ExprKind {
        self.node(id).kind
    }

    /// Left child of a unary or binary node.
    pub fn lhs(&self, id: ExprId) -> ExprId {
        match self.node(id).data {
            ExprData::Unary(l) | ExprData::Binary(l, _) => l,
            _ => panic!("lhs() on a leaf node"),
        }
    }

    /// Right child of a binary node.
    pub fn rhs(&self, id: ExprId) -> ExprId {
        match self.node(id).data {
            ExprData::Binary(_, r) => r,
            _ => panic!("rhs() on a non-binary node"),
        }
    }

    pub fn atom(&self, id: ExprId) -> Atom {
        match self.node(id).data {
            ExprData::Atom(a) => a,
            _ => panic!("atom() on a non-identifier node"),
        }
    }

    pub fn value(&self, id: ExprId) -> Value {
        match self.node(id).data {
            ExprData::Value(v) => v,
            _ => panic!("value() on a non-constant node"),
        }
    }

    // -- identifiers and well-known nodes -----------------------------------

    pub fn make_ident(&self, name: &str) -> ExprId {
        let atom = self.atoms.intern(name);
        self.make(ExprKind::Ident, ExprData::Atom(atom))
    }

    pub fn make_ident_atom(&self, atom: Atom) -> ExprId {
        self.make(ExprKind::Ident, ExprData::Atom(atom))
    }

    pub fn true_expr(&self) -> ExprId {
        self.true_expr
    }

    pub fn false_expr(&self) -> ExprId {
        self.false_expr
    }

    /// The empty context (root of every qualified name).
    pub fn empty_expr(&self) -> ExprId {
        self.empty_expr
    }

    pub fn main_expr(&self) -> ExprId {
        self.main_expr
    }

    pub fn undef_expr(&self) -> ExprId {
        self.undef_expr
    }

    // -- constants ----------------------------------------------------------

    pub fn make_iconst(&self, v: Value) -> ExprId {
        self.make(ExprKind::IConst, ExprData::Value(v))
    }

    pub fn make_hconst(&self, v: Value) -> ExprId {
        self.make(ExprKind::HConst, ExprData::Value(v))
    }

    pub fn make_oconst(&self, v: Value) -> ExprId {
        self.make(ExprKind::OConst, ExprData::Value(v))
    }

    pub fn make_fconst(&self, v: Value) -> ExprId {
        self.make(ExprKind::FConst, ExprData::Value(v))
    }

    pub fn make_one(&self) -> ExprId {
        self.make_iconst(1)
    }

    pub fn make_zero(&self) -> ExprId {
        self.make_iconst(0)
    }

    /// A constant expression for a possibly negative value: negative
    /// numbers become `Neg` over their magnitude.
    pub fn make_signed_const(&self, v: i64) -> ExprId {
        if v < 0 {
            let inner = self.make_iconst(v.unsigned_abs());
            self.make_neg(inner)
        } else {
            self.make_iconst(v as Value)
        }
    }

    // -- operators ----------------------------------------------------------

    fn unary(&self, kind: ExprKind, l: ExprId) -> ExprId {
        self.make(kind, ExprData::Unary(l))
    }

    fn binary(&self, kind: ExprKind, l: ExprId, r: ExprId) -> ExprId {
        self.make(kind, ExprData::Binary(l, r))
    }

    pub fn make_next(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::Next, l)
    }

    pub fn make_neg(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::Neg, l)
    }

    pub fn make_not(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::Not, l)
    }

    pub fn make_bw_not(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::BwNot, l)
    }

    pub fn make_add(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Add, l, r)
    }

    pub fn make_sub(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Sub, l, r)
    }

    pub fn make_mul(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Mul, l, r)
    }

    pub fn make_div(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Div, l, r)
    }

    pub fn make_mod(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Mod, l, r)
    }

    pub fn make_bw_and(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::BwAnd, l, r)
    }

    pub fn make_bw_or(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::BwOr, l, r)
    }

    pub fn make_bw_xor(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::BwXor, l, r)
    }

    pub fn make_bw_xnor(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::BwXnor, l, r)
    }

    pub fn make_and(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::And, l, r)
    }

    pub fn make_or(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Or, l, r)
    }

    pub fn make_implies(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Implies, l, r)
    }

    pub fn make_iff(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Iff, l, r)
    }

    pub fn make_lshift(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Lshift, l, r)
    }

    pub fn make_rshift(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Rshift, l, r)
    }

    pub fn make_eq(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Eq, l, r)
    }

    pub fn make_ne(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Ne, l, r)
    }

    pub fn make_lt(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Lt, l, r)
    }

    pub fn make_le(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Le, l, r)
    }

    pub fn make_gt(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Gt, l, r)
    }

    pub fn make_ge(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Ge, l, r)
    }

    /// `Ite(Cond(c, t), e)`; the compiler relies on this exact shape.
    pub fn make_ite(&self, c: ExprId, t: ExprId, e: ExprId) -> ExprId {
        let cond = self.binary(ExprKind::Cond, c, t);
        self.binary(ExprKind::Ite, cond, e)
    }

    pub fn make_dot(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Dot, l, r)
    }

    pub fn make_params(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Params, l, r)
    }

    pub fn make_subscript(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Subscript, l, r)
    }

    pub fn make_set(&self, inner: ExprId) -> ExprId {
        self.unary(ExprKind::Set, inner)
    }

    pub fn make_comma(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Comma, l, r)
    }

    pub fn make_assign(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Assign, l, r)
    }

    pub fn make_guard(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::Guard, l, r)
    }

    pub fn make_f(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::F, l)
    }

    pub fn make_g(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::G, l)
    }

    pub fn make_x(&self, l: ExprId) -> ExprId {
        self.unary(ExprKind::X, l)
    }

    pub fn make_u(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::U, l, r)
    }

    pub fn make_r(&self, l: ExprId, r: ExprId) -> ExprId {
        self.binary(ExprKind::R, l, r)
    }

    /// Cast target for `bool(e)`.
    pub fn make_boolean_tag(&self) -> ExprId {
        let atom = self.atoms.intern("boolean");
        self.make(ExprKind::TypeTag, ExprData::Atom(atom))
    }

    /// Cast target for `resize(e, w)`.
    pub fn make_width_tag(&self, width: Value) -> ExprId {
        self.make(ExprKind::TypeTag, ExprData::Value(width))
    }

    pub fn make_cast(&self, tag: ExprId, operand: ExprId) -> ExprId {
        self.binary(ExprKind::Cast, tag, operand)
    }

    // -- inspectors ----------------------------------------------------------

    pub fn is_ident(&self, id: ExprId) -> bool {
        self.kind(id) == ExprKind::Ident
    }

    pub fn is_dot(&self, id: ExprId) -> bool {
        self.kind(id) == ExprKind::Dot
    }

    pub fn is_next(&self, id: ExprId) -> bool {
        self.kind(id) == ExprKind::Next
    }

    pub fn is_true(&self, id: ExprId) -> bool {
        id == self.true_expr
    }

    pub fn is_false(&self, id: ExprId) -> bool {
        id == self.false_expr
    }

    pub fn is_bool_const(&self, id: ExprId) -> bool {
        self.is_true(id) || self.is_false(id)
    }

    /// Integer-valued numeric constant (any radix except fixed-point).
    pub fn is_int_numeric(&self, id: ExprId) -> bool {
        matches!(
            self.kind(id),
            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst
        )
    }

    pub fn is_numeric(&self, id: ExprId) -> bool {
        self.kind(id).is_numeric()
    }

    // -- canonicalisation ----------------------------------------------------

    /// Rewrites an arbitrary `Dot` chain into strictly left-associative
    /// form, the canonical shape of qualified names.
    pub fn left_associate_dot(&self, expr: ExprId) -> ExprId {
        // in-order visit collecting non-dot fragments left to right
        let mut fragments = Vec::new();
        let mut stack = vec![expr];
        while let Some(top) = stack.pop() {
            if self.is_dot(top) {
                stack.push(self.rhs(top));
                stack.push(self.lhs(top));
                continue;
            }
            fragments.push(top);
        }

        let mut res: Option<ExprId> = None;
        for frag in fragments {
            res = Some(match res {
                Some(acc) => self.make_dot(acc, frag),
                None => frag,
            });
        }
        res.expect("empty dot chain")
    }
}

impl Default for ExprPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a decimal literal to its fixed-point representation at the
/// given binary precision.
///
/// A binary search over `[0, 2^precision - 1]` brackets the real value,
/// then the closest of the three candidate integers wins.
pub fn decimal_to_fixed(decimal_repr: &str, precision: u32) -> Value {
    let val: f64 = decimal_repr.parse().unwrap_or(0.0);
    let pp = (2.0_f64).powi(precision as i32);

    let mut j: Value = 0;
    let mut k: Value = if precision >= 64 {
        Value::MAX
    } else {
        (1 << precision) - 1
    };
    let mut m: Value = 0;

    while k - j > 1 {
        m = j + (k - j) / 2;
        let fm = m as f64 / pp;
        if fm <= val {
            j = m;
        } else {
            k = m;
        }
    }

    let dj = (val - j as f64 / pp).abs();
    let dm = (val - m as f64 / pp).abs();
    let dk = (val - k as f64 / pp).abs();

    if dj <= dm && dj <= dk {
        j
    } else if dk <= dj && dk <= dm {
        k
    } else {
        m
    }
}
