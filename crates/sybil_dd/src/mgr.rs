//! The ADD manager.

use std::collections::HashMap;
use std::sync::Mutex;

/// Terminal value of the distinguished error diagram.
pub const ERROR_VALUE: i64 = i64::MIN;

/// Handle to a hash-consed diagram node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddId(u32);

impl AddId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Node {
    Leaf(i64),
    /// Internal node: `var ? then : else`, with `then != else`.
    Ite {
        var: u32,
        t: AddId,
        e: AddId,
    },
}

/// Binary leaf-level operations.
///
/// `Or`/`Xor`/`Xnor` are boolean (0/1 results); the `Bw*` family and the
/// shifts operate on the full integer terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Times,
    Divide,
    Modulus,
    Equals,
    Lt,
    Leq,
    Or,
    Xor,
    Xnor,
    BwAnd,
    BwOr,
    BwXor,
    BwXnor,
    LShift,
    RShift,
}

/// Unary leaf-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Boolean complement: 0 becomes 1, anything else 0.
    Cmpl,
    /// Arithmetic negation.
    Negate,
    /// The i-th bit of the terminal, as 0/1.
    Bit(u32),
}

#[derive(Default)]
struct Inner {
    nodes: Vec<Node>,
    unique: HashMap<Node, AddId>,
    bin_cache: HashMap<(BinOp, AddId, AddId), AddId>,
    un_cache: HashMap<(UnOp, AddId), AddId>,
    ite_cache: HashMap<(AddId, AddId, AddId), AddId>,
    nvars: u32,
}

impl Inner {
    fn mk(&mut self, node: Node) -> AddId {
        if let Some(&id) = self.unique.get(&node) {
            return id;
        }
        let id = AddId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.unique.insert(node, id);
        id
    }

    fn leaf(&mut self, v: i64) -> AddId {
        self.mk(Node::Leaf(v))
    }

    fn node(&self, id: AddId) -> Node {
        self.nodes[id.index()]
    }

    /// Reduced internal node; collapses equal branches.
    fn ite_node(&mut self, var: u32, t: AddId, e: AddId) -> AddId {
        if t == e {
            return t;
        }
        self.mk(Node::Ite { var, t, e })
    }

    fn top_var_of(&self, a: AddId) -> u32 {
        match self.node(a) {
            Node::Ite { var, .. } => var,
            Node::Leaf(_) => u32::MAX,
        }
    }

    fn top_var(&self, a: AddId, b: AddId) -> u32 {
        self.top_var_of(a).min(self.top_var_of(b))
    }

    /// Cofactors of `a` against variable `var`.
    fn cofactor(&self, a: AddId, var: u32) -> (AddId, AddId) {
        match self.node(a) {
            Node::Ite { var: v, t, e } if v == var => (t, e),
            _ => (a, a),
        }
    }

    fn apply_bin(&mut self, op: BinOp, a: AddId, b: AddId) -> AddId {
        if let Some(&cached) = self.bin_cache.get(&(op, a, b)) {
            return cached;
        }
        let res = match (self.node(a), self.node(b)) {
            (Node::Leaf(x), Node::Leaf(y)) => {
                let v = eval_bin(op, x, y);
                self.leaf(v)
            }
            _ => {
                let var = self.top_var(a, b);
                let (at, ae) = self.cofactor(a, var);
                let (bt, be) = self.cofactor(b, var);
                let t = self.apply_bin(op, at, bt);
                let e = self.apply_bin(op, ae, be);
                self.ite_node(var, t, e)
            }
        };
        self.bin_cache.insert((op, a, b), res);
        res
    }

    fn apply_un(&mut self, op: UnOp, a: AddId) -> AddId {
        if let Some(&cached) = self.un_cache.get(&(op, a)) {
            return cached;
        }
        let res = match self.node(a) {
            Node::Leaf(x) => {
                let v = eval_un(op, x);
                self.leaf(v)
            }
            Node::Ite { var, t, e } => {
                let nt = self.apply_un(op, t);
                let ne = self.apply_un(op, e);
                self.ite_node(var, nt, ne)
            }
        };
        self.un_cache.insert((op, a), res);
        res
    }

    fn apply_ite(&mut self, f: AddId, g: AddId, h: AddId) -> AddId {
        if let Some(&cached) = self.ite_cache.get(&(f, g, h)) {
            return cached;
        }
        let res = match self.node(f) {
            Node::Leaf(ERROR_VALUE) => self.leaf(ERROR_VALUE),
            Node::Leaf(v) => {
                if v != 0 {
                    g
                } else {
                    h
                }
            }
            _ => {
                let var = self.top_var(f, g).min(self.top_var_of(h));
                let (ft, fe) = self.cofactor(f, var);
                let (gt, ge) = self.cofactor(g, var);
                let (ht, he) = self.cofactor(h, var);
                let t = self.apply_ite(ft, gt, ht);
                let e = self.apply_ite(fe, ge, he);
                self.ite_node(var, t, e)
            }
        };
        self.ite_cache.insert((f, g, h), res);
        res
    }
}

fn bool_of(v: i64) -> bool {
    v != 0
}

fn as_bool_leaf(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

fn eval_bin(op: BinOp, x: i64, y: i64) -> i64 {
    if x == ERROR_VALUE || y == ERROR_VALUE {
        return ERROR_VALUE;
    }
    match op {
        BinOp::Plus => x.wrapping_add(y),
        BinOp::Minus => x.wrapping_sub(y),
        BinOp::Times => x.wrapping_mul(y),
        BinOp::Divide => {
            if y == 0 {
                ERROR_VALUE
            } else {
                x.wrapping_div(y)
            }
        }
        BinOp::Modulus => {
            if y == 0 {
                ERROR_VALUE
            } else {
                x.wrapping_rem(y)
            }
        }
        BinOp::Equals => as_bool_leaf(x == y),
        BinOp::Lt => as_bool_leaf(x < y),
        BinOp::Leq => as_bool_leaf(x <= y),
        BinOp::Or => as_bool_leaf(bool_of(x) || bool_of(y)),
        BinOp::Xor => as_bool_leaf(bool_of(x) ^ bool_of(y)),
        BinOp::Xnor => as_bool_leaf(!(bool_of(x) ^ bool_of(y))),
        BinOp::BwAnd => x & y,
        BinOp::BwOr => x | y,
        BinOp::BwXor => x ^ y,
        BinOp::BwXnor => !(x ^ y),
        BinOp::LShift => {
            if (0..64).contains(&y) {
                x.wrapping_shl(y as u32)
            } else {
                0
            }
        }
        BinOp::RShift => {
            if (0..64).contains(&y) {
                ((x as u64) >> y) as i64
            } else {
                0
            }
        }
    }
}

fn eval_un(op: UnOp, x: i64) -> i64 {
    if x == ERROR_VALUE {
        return ERROR_VALUE;
    }
    match op {
        UnOp::Cmpl => as_bool_leaf(!bool_of(x)),
        UnOp::Negate => x.wrapping_neg(),
        UnOp::Bit(i) => {
            if i < 64 {
                (x >> i) & 1
            } else {
                0
            }
        }
    }
}

/// The diagram store. All operations are memoised; the store only grows.
pub struct AddMgr {
    inner: Mutex<Inner>,
    zero: AddId,
    one: AddId,
    error: AddId,
}

impl AddMgr {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        let zero = inner.leaf(0);
        let one = inner.leaf(1);
        let error = inner.leaf(ERROR_VALUE);
        AddMgr {
            inner: Mutex::new(inner),
            zero,
            one,
            error,
        }
    }

    pub fn zero(&self) -> AddId {
        self.zero
    }

    pub fn one(&self) -> AddId {
        self.one
    }

    /// The absorbing error diagram.
    pub fn error(&self) -> AddId {
        self.error
    }

    pub fn constant(&self, v: i64) -> AddId {
        self.inner.lock().expect("dd mgr poisoned").leaf(v)
    }

    /// Allocates a fresh boolean variable and returns its 0/1 diagram.
    /// The variable index equals the allocation order.
    pub fn new_var(&self) -> (u32, AddId) {
        let mut inner = self.inner.lock().expect("dd mgr poisoned");
        let var = inner.nvars;
        inner.nvars += 1;
        let one = self.one;
        let zero = self.zero;
        let id = inner.ite_node(var, one, zero);
        (var, id)
    }

    /// The 0/1 diagram of an already allocated variable.
    pub fn ith_var(&self, var: u32) -> AddId {
        let mut inner = self.inner.lock().expect("dd mgr poisoned");
        assert!(var < inner.nvars, "variable not allocated");
        let one = self.one;
        let zero = self.zero;
        inner.ite_node(var, one, zero)
    }

    pub fn num_vars(&self) -> u32 {
        self.inner.lock().expect("dd mgr poisoned").nvars
    }

    /// If `f` is exactly a variable diagram, its index.
    pub fn as_var(&self, f: AddId) -> Option<u32> {
        let inner = self.inner.lock().expect("dd mgr poisoned");
        match inner.node(f) {
            Node::Ite { var, t, e } if t == self.one && e == self.zero => Some(var),
            _ => None,
        }
    }

    pub fn is_constant(&self, f: AddId) -> bool {
        let inner = self.inner.lock().expect("dd mgr poisoned");
        matches!(inner.node(f), Node::Leaf(_))
    }

    pub fn constant_value(&self, f: AddId) -> Option<i64> {
        let inner = self.inner.lock().expect("dd mgr poisoned");
        match inner.node(f) {
            Node::Leaf(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_zero(&self, f: AddId) -> bool {
        f == self.zero
    }

    pub fn is_one(&self, f: AddId) -> bool {
        f == self.one
    }

    pub fn apply(&self, op: BinOp, a: AddId, b: AddId) -> AddId {
        self.inner
            .lock()
            .expect("dd mgr poisoned")
            .apply_bin(op, a, b)
    }

    pub fn apply_un(&self, op: UnOp, a: AddId) -> AddId {
        self.inner.lock().expect("dd mgr poisoned").apply_un(op, a)
    }

    /// `f ? g : h` with a 0/1 valued `f`.
    pub fn ite(&self, f: AddId, g: AddId, h: AddId) -> AddId {
        self.inner
            .lock()
            .expect("dd mgr poisoned")
            .apply_ite(f, g, h)
    }

    // convenience wrappers, named after the classic ADD interface

    pub fn plus(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Plus, a, b)
    }

    pub fn minus(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Minus, a, b)
    }

    pub fn times(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Times, a, b)
    }

    pub fn divide(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Divide, a, b)
    }

    pub fn modulus(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Modulus, a, b)
    }

    pub fn equals(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Equals, a, b)
    }

    pub fn lt(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Lt, a, b)
    }

    pub fn leq(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Leq, a, b)
    }

    pub fn or(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Or, a, b)
    }

    pub fn xor(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Xor, a, b)
    }

    pub fn xnor(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::Xnor, a, b)
    }

    pub fn bw_and(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::BwAnd, a, b)
    }

    pub fn bw_or(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::BwOr, a, b)
    }

    pub fn bw_xor(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::BwXor, a, b)
    }

    pub fn bw_xnor(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::BwXnor, a, b)
    }

    pub fn lshift(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::LShift, a, b)
    }

    pub fn rshift(&self, a: AddId, b: AddId) -> AddId {
        self.apply(BinOp::RShift, a, b)
    }

    /// The i-th bit of an integer-valued diagram, as a 0/1 diagram.
    pub fn bit(&self, a: AddId, i: u32) -> AddId {
        self.apply_un(UnOp::Bit(i), a)
    }

    pub fn cmpl(&self, a: AddId) -> AddId {
        self.apply_un(UnOp::Cmpl, a)
    }

    /// Bitwise complement of a 0/1 diagram; identical to [`Self::cmpl`].
    pub fn bw_cmpl(&self, a: AddId) -> AddId {
        self.cmpl(a)
    }

    pub fn negate(&self, a: AddId) -> AddId {
        self.apply_un(UnOp::Negate, a)
    }

    /// Evaluates `f` under a total variable assignment.
    pub fn eval(&self, f: AddId, assignment: &dyn Fn(u32) -> bool) -> i64 {
        let inner = self.inner.lock().expect("dd mgr poisoned");
        let mut cur = f;
        loop {
            match inner.node(cur) {
                Node::Leaf(v) => return v,
                Node::Ite { var, t, e } => {
                    cur = if assignment(var) { t } else { e };
                }
            }
        }
    }

    pub(crate) fn node_of(&self, f: AddId) -> Node {
        self.inner.lock().expect("dd mgr poisoned").node(f)
    }
}

impl Default for AddMgr {
    fn default() -> Self {
        Self::new()
    }
}
