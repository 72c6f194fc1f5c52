//! Bit-level encodings.
//!
//! Every typed symbol is backed by fresh decision-diagram variables: one
//! for a boolean, `w` for a `w`-bit integer, `ceil(log2(n))` for an enum
//! of `n` literals (carried as a single integer-coded diagram), and the
//! element encodings concatenated for arrays.
//!
//! Encodings are registered per [`TimedExpr`] and reused for the model's
//! lifetime; frozen variables are keyed at step ∞. For every diagram
//! variable created the manager records the inverse bit → [`Ucbi`] map
//! that time mapping relies on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sybil_base::Atom;
use sybil_dd::{AddId, AddMgr};
use sybil_expr::{ExprId, Step, TimedExpr, Ucbi};
use sybil_type::{TypeDesc, TypeId, TypeMgr};

/// Shape of an encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingKind {
    Boolean,
    Int { width: u32, signed: bool },
    Enum { literals: Vec<Atom> },
    Array { elem: Box<EncodingKind>, nelems: u32 },
}

/// A value read back out of an encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Bool(bool),
    Int(i64),
    /// Enum literal, by atom.
    Literal(Atom),
    Array(Vec<DecodedValue>),
}

/// The bit-variables backing one typed symbol.
///
/// `bits` are diagram variable indices, least significant first. `dds`
/// is what the compiler pushes for a leaf: the single integer-coded
/// diagram for monolithic types, the per-bit variable diagrams for
/// algebraics and arrays.
#[derive(Debug, Clone)]
pub struct Encoding {
    pub kind: EncodingKind,
    pub bits: Vec<u32>,
    pub dds: Vec<AddId>,
}

impl Encoding {
    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Reverses the encoding: reconstructs the value from bit values
    /// (don't-care bits must already be defaulted by the caller).
    pub fn decode(&self, values: &[bool]) -> DecodedValue {
        decode_kind(&self.kind, values)
    }
}

fn decode_kind(kind: &EncodingKind, values: &[bool]) -> DecodedValue {
    match kind {
        EncodingKind::Boolean => DecodedValue::Bool(values[0]),
        EncodingKind::Int { width, signed } => {
            let mut v: i64 = 0;
            for i in 0..*width {
                if values[i as usize] {
                    if *signed && i == *width - 1 {
                        v -= 1_i64 << i;
                    } else {
                        v += 1_i64 << i;
                    }
                }
            }
            DecodedValue::Int(v)
        }
        EncodingKind::Enum { literals } => {
            let mut code: usize = 0;
            for (i, &b) in values.iter().enumerate() {
                if b {
                    code += 1 << i;
                }
            }
            let index = code.min(literals.len() - 1);
            DecodedValue::Literal(literals[index])
        }
        EncodingKind::Array { elem, nelems } => {
            let ew = kind_width(elem) as usize;
            let mut out = Vec::with_capacity(*nelems as usize);
            for j in 0..*nelems as usize {
                out.push(decode_kind(elem, &values[j * ew..(j + 1) * ew]));
            }
            DecodedValue::Array(out)
        }
    }
}

/// The encoding shape of an array element; enum elements keep their
/// literal identity so decoding yields literals, not raw codes.
fn element_kind(tm: &TypeMgr, ty: TypeId) -> EncodingKind {
    match tm.desc(ty) {
        TypeDesc::Boolean => EncodingKind::Boolean,
        TypeDesc::Enum(literals) => EncodingKind::Enum { literals },
        TypeDesc::UnsignedAlgebraic(w) => EncodingKind::Int {
            width: w,
            signed: false,
        },
        TypeDesc::SignedAlgebraic(w) => EncodingKind::Int {
            width: w,
            signed: true,
        },
        TypeDesc::Array { elem, nelems } => EncodingKind::Array {
            elem: Box::new(element_kind(tm, elem)),
            nelems,
        },
        TypeDesc::IntConst | TypeDesc::Instance(_) => {
            unreachable!("constants and instances are never array elements")
        }
    }
}

fn kind_width(kind: &EncodingKind) -> u32 {
    match kind {
        EncodingKind::Boolean => 1,
        EncodingKind::Int { width, .. } => *width,
        EncodingKind::Enum { literals } => {
            let mut bits = 0;
            let mut pow: usize = 1;
            while pow < literals.len() {
                bits += 1;
                pow *= 2;
            }
            bits.max(1)
        }
        EncodingKind::Array { elem, nelems } => nelems * kind_width(elem),
    }
}

#[derive(Default)]
struct Inner {
    registry: HashMap<TimedExpr, Arc<Encoding>>,
    ucbis: Vec<Ucbi>,
}

/// Owner of all encodings and of the bit → UCBI inverse map.
///
/// Encoding allocation is atomic per [`TimedExpr`]: concurrent lookups
/// for the same key observe the same encoding.
pub struct EncodingMgr {
    inner: Mutex<Inner>,
}

impl EncodingMgr {
    pub fn new() -> Self {
        EncodingMgr {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of bits allocated so far.
    pub fn nbits(&self) -> usize {
        self.inner.lock().expect("encoding mgr poisoned").ucbis.len()
    }

    /// The UCBI a diagram variable stands for.
    ///
    /// # Panics
    ///
    /// Panics if the variable was not allocated through this manager.
    pub fn find_ucbi(&self, var: u32) -> Ucbi {
        let inner = self.inner.lock().expect("encoding mgr poisoned");
        inner.ucbis[var as usize]
    }

    pub fn find_encoding(&self, key: TimedExpr) -> Option<Arc<Encoding>> {
        let inner = self.inner.lock().expect("encoding mgr poisoned");
        inner.registry.get(&key).cloned()
    }

    /// Returns the encoding registered for `key`, building and
    /// registering it first if none exists.
    pub fn find_or_make(
        &self,
        dd: &AddMgr,
        tm: &TypeMgr,
        key: TimedExpr,
        ty: TypeId,
    ) -> Arc<Encoding> {
        let mut inner = self.inner.lock().expect("encoding mgr poisoned");
        if let Some(enc) = inner.registry.get(&key) {
            return enc.clone();
        }
        let enc = Arc::new(build_encoding(&mut inner, dd, tm, key.expr, key.time, ty));
        inner.registry.insert(key, enc.clone());
        enc
    }

    /// Allocates a vector of anonymous bits (operator results,
    /// determinization variables). The bits get UCBIs over `name` at the
    /// given time offset so they can be time-stamped like any other.
    pub fn make_anonymous(
        &self,
        dd: &AddMgr,
        name: ExprId,
        time: Step,
        width: u32,
    ) -> (Vec<u32>, Vec<AddId>) {
        let mut inner = self.inner.lock().expect("encoding mgr poisoned");
        let mut vars = Vec::with_capacity(width as usize);
        let mut dds = Vec::with_capacity(width as usize);
        for bit in 0..width {
            let (var, add) = fresh_bit(&mut inner, dd, name, time, bit);
            vars.push(var);
            dds.push(add);
        }
        (vars, dds)
    }
}

impl Default for EncodingMgr {
    fn default() -> Self {
        Self::new()
    }
}

fn fresh_bit(
    inner: &mut Inner,
    dd: &AddMgr,
    name: ExprId,
    time: Step,
    bit: u32,
) -> (u32, AddId) {
    let (var, add) = dd.new_var();
    debug_assert_eq!(var as usize, inner.ucbis.len(), "bit index drift");
    inner.ucbis.push(Ucbi::new(name, time, bit));
    (var, add)
}

fn build_encoding(
    inner: &mut Inner,
    dd: &AddMgr,
    tm: &TypeMgr,
    name: ExprId,
    time: Step,
    ty: TypeId,
) -> Encoding {
    match tm.desc(ty) {
        TypeDesc::Boolean => {
            let (var, add) = fresh_bit(inner, dd, name, time, 0);
            Encoding {
                kind: EncodingKind::Boolean,
                bits: vec![var],
                dds: vec![add],
            }
        }
        TypeDesc::UnsignedAlgebraic(w) | TypeDesc::SignedAlgebraic(w) => {
            let signed = tm.is_signed(ty);
            let mut bits = Vec::with_capacity(w as usize);
            let mut dds = Vec::with_capacity(w as usize);
            for bit in 0..w {
                let (var, add) = fresh_bit(inner, dd, name, time, bit);
                bits.push(var);
                dds.push(add);
            }
            Encoding {
                kind: EncodingKind::Int { width: w, signed },
                bits,
                dds,
            }
        }
        TypeDesc::Enum(literals) => {
            let w = tm.width(ty);
            let mut bits = Vec::with_capacity(w as usize);
            // the single monolithic diagram: sum of weighted bits
            let mut coded = dd.constant(0);
            for bit in 0..w {
                let (var, add) = fresh_bit(inner, dd, name, time, bit);
                bits.push(var);
                let weight = dd.constant(1_i64 << bit);
                coded = dd.plus(coded, dd.times(add, weight));
            }
            Encoding {
                kind: EncodingKind::Enum { literals },
                bits,
                dds: vec![coded],
            }
        }
        TypeDesc::Array { elem, nelems } => {
            let ew = tm.width(elem);
            let elem_kind = element_kind(tm, elem);
            let total = nelems * ew;
            let mut bits = Vec::with_capacity(total as usize);
            let mut dds = Vec::with_capacity(total as usize);
            for bit in 0..total {
                let (var, add) = fresh_bit(inner, dd, name, time, bit);
                bits.push(var);
                dds.push(add);
            }
            // width sanity: nelems * elem width must cover the bit span
            debug_assert_eq!(bits.len() as u32, nelems * ew);
            Encoding {
                kind: EncodingKind::Array {
                    elem: Box::new(elem_kind),
                    nelems,
                },
                bits,
                dds,
            }
        }
        TypeDesc::IntConst | TypeDesc::Instance(_) => {
            unreachable!("constants and instances are never encoded")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sybil_expr::{ExprPool, FROZEN};

    fn managers() -> (ExprPool, TypeMgr, AddMgr, EncodingMgr) {
        (
            ExprPool::new(),
            TypeMgr::new(),
            AddMgr::new(),
            EncodingMgr::new(),
        )
    }

    #[test]
    fn encodings_are_reused_per_timed_expr() {
        let (pool, tm, dd, enc) = managers();
        let x = pool.make_ident("x");
        let key = TimedExpr::new(x, 0);
        let a = enc.find_or_make(&dd, &tm, key, tm.find_unsigned(4));
        let b = enc.find_or_make(&dd, &tm, key, tm.find_unsigned(4));
        assert_eq!(a.bits, b.bits);

        // a different step gets fresh bits
        let c = enc.find_or_make(&dd, &tm, TimedExpr::new(x, 1), tm.find_unsigned(4));
        assert_ne!(a.bits, c.bits);
    }

    #[test]
    fn widths_match_the_type() {
        let (pool, tm, dd, enc) = managers();
        let x = pool.make_ident("x");
        let b = enc.find_or_make(&dd, &tm, TimedExpr::new(x, 0), tm.find_boolean());
        assert_eq!(b.width(), 1);

        let y = pool.make_ident("y");
        let i = enc.find_or_make(&dd, &tm, TimedExpr::new(y, 0), tm.find_signed(8));
        assert_eq!(i.width(), 8);
        assert_eq!(i.dds.len(), 8);

        let a = pool.make_ident("a");
        let arr = enc.find_or_make(
            &dd,
            &tm,
            TimedExpr::new(a, 0),
            tm.find_array(tm.find_unsigned(4), 3),
        );
        assert_eq!(arr.width(), 12);
    }

    #[test]
    fn enum_encoding_is_one_coded_diagram() {
        let (pool, tm, dd, enc) = managers();
        let atoms = pool.atoms();
        let ty = tm.find_enum(vec![atoms.intern("A"), atoms.intern("B"), atoms.intern("C")]);
        let e = pool.make_ident("e");
        let encoding = enc.find_or_make(&dd, &tm, TimedExpr::new(e, 0), ty);
        assert_eq!(encoding.bits.len(), 2);
        assert_eq!(encoding.dds.len(), 1);

        // coded diagram evaluates to the bit-weighted code
        let bits = encoding.bits.clone();
        let code = dd.eval(encoding.dds[0], &|v| v == bits[1]);
        assert_eq!(code, 2);
    }

    #[test]
    fn ucbis_track_every_bit() {
        let (pool, tm, dd, enc) = managers();
        let x = pool.make_ident("x");
        let e = enc.find_or_make(&dd, &tm, TimedExpr::new(x, FROZEN), tm.find_unsigned(2));
        for (i, &var) in e.bits.iter().enumerate() {
            let ucbi = enc.find_ucbi(var);
            assert_eq!(ucbi.expr, x);
            assert_eq!(ucbi.time, FROZEN);
            assert_eq!(ucbi.bit, i as u32);
        }
    }

    #[test]
    fn array_of_enums_keeps_literal_identity() {
        let (pool, tm, dd, enc) = managers();
        let atoms = pool.atoms();
        let red = atoms.intern("RED");
        let green = atoms.intern("GREEN");
        let blue = atoms.intern("BLUE");
        let ty = tm.find_array(tm.find_enum(vec![red, green, blue]), 2);

        let a = pool.make_ident("a");
        let encoding = enc.find_or_make(&dd, &tm, TimedExpr::new(a, 0), ty);
        assert_eq!(encoding.width(), 4);
        match &encoding.kind {
            EncodingKind::Array { elem, nelems } => {
                assert_eq!(*nelems, 2);
                assert_eq!(
                    **elem,
                    EncodingKind::Enum {
                        literals: vec![red, green, blue]
                    }
                );
            }
            other => panic!("expected an array encoding, got {:?}", other),
        }

        // element 0 reads code 1, element 1 reads code 2: literals come
        // back by name, not as raw integers
        let decoded = encoding.decode(&[true, false, false, true]);
        assert_eq!(
            decoded,
            DecodedValue::Array(vec![
                DecodedValue::Literal(green),
                DecodedValue::Literal(blue),
            ])
        );
    }

    #[test]
    fn int_decode_round_trips() {
        let kind = EncodingKind::Int {
            width: 4,
            signed: true,
        };
        let enc = Encoding {
            kind,
            bits: vec![0, 1, 2, 3],
            dds: vec![],
        };
        // -8 is 1000 in two's complement
        assert_eq!(
            enc.decode(&[false, false, false, true]),
            DecodedValue::Int(-8)
        );
        assert_eq!(
            enc.decode(&[true, true, true, true]),
            DecodedValue::Int(-1)
        );
        assert_eq!(
            enc.decode(&[true, false, true, false]),
            DecodedValue::Int(5)
        );
    }
}
