//! Compiler behaviour against a small hand-built model.

use sybil_compile::{Compiler, EncodingMgr};
use sybil_dd::AddMgr;
use sybil_expr::{ExprId, ExprPool, TimedExpr};
use sybil_model::{Analyzer, Define, Model, Module, Variable};
use sybil_type::TypeMgr;

struct Fixture {
    pool: ExprPool,
    tm: TypeMgr,
    dd: AddMgr,
    enc: EncodingMgr,
    model: Model,
}

impl Fixture {
    fn compile(&mut self, body: ExprId) -> sybil_compile::CompilationUnit {
        let mut compiler =
            Compiler::new(&self.pool, &self.tm, &self.model, &self.dd, &self.enc);
        compiler
            .process(self.pool.empty_expr(), body)
            .expect("compilation failed")
    }
}

/// main with x, y : unsigned int(2); b, c : boolean; s : signed int(4);
/// e : { A, B, C }; a : unsigned int(4)[3]
fn fixture() -> Fixture {
    let pool = ExprPool::new();
    let tm = TypeMgr::new();
    let dd = AddMgr::new();
    let enc = EncodingMgr::new();
    let mut model = Model::new();

    let main = pool.atoms().intern("main");
    let mut m = Module::new(main);
    let u2 = tm.find_unsigned(2);
    for name in ["x", "y"] {
        m.add_var(Variable::new(main, pool.make_ident(name), u2))
            .unwrap();
    }
    for name in ["b", "c"] {
        m.add_var(Variable::new(main, pool.make_ident(name), tm.find_boolean()))
            .unwrap();
    }
    m.add_var(Variable::new(main, pool.make_ident("s"), tm.find_signed(4)))
        .unwrap();

    let lits = vec![
        pool.atoms().intern("A"),
        pool.atoms().intern("B"),
        pool.atoms().intern("C"),
    ];
    let enum_ty = tm.find_enum(lits);
    let e = pool.make_ident("e");
    m.add_var(Variable::new(main, e, enum_ty)).unwrap();

    let arr_ty = tm.find_array(tm.find_unsigned(4), 3);
    m.add_var(Variable::new(main, pool.make_ident("a"), arr_ty))
        .unwrap();

    let pal_lits = vec![
        pool.atoms().intern("P"),
        pool.atoms().intern("Q"),
        pool.atoms().intern("S"),
    ];
    let pal_ty = tm.find_array(tm.find_enum(pal_lits), 2);
    let pal = pool.make_ident("pal");
    m.add_var(Variable::new(main, pal, pal_ty)).unwrap();

    model.add_module(m).unwrap();
    model.register_literals(&tm, enum_ty, e).unwrap();
    let pal_elem = match tm.desc(pal_ty) {
        sybil_type::TypeDesc::Array { elem, .. } => elem,
        _ => unreachable!(),
    };
    model.register_literals(&tm, pal_elem, pal).unwrap();
    Analyzer::process(&pool, &tm, &mut model).unwrap();

    Fixture {
        pool,
        tm,
        dd,
        enc,
        model,
    }
}

#[test]
fn compiling_twice_reuses_the_same_diagrams() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let one = f.pool.make_iconst(1);
    let body = f.pool.make_eq(x, one);
    let u1 = f.compile(body);
    let u2 = f.compile(body);
    assert_eq!(u1.dds, u2.dds);
}

#[test]
fn width_invariant_holds() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let b = f.pool.make_ident("b");
    let e = f.pool.make_ident("e");
    let one = f.pool.make_iconst(1);

    // algebraic: w diagrams
    let sum = f.pool.make_add(x, one);
    assert_eq!(f.compile(sum).dds.len(), 2);

    // boolean and enum: a single diagram
    assert_eq!(f.compile(b).dds.len(), 1);
    assert_eq!(f.compile(e).dds.len(), 1);

    // array: nelems * elem width
    let a = f.pool.make_ident("a");
    assert_eq!(f.compile(a).dds.len(), 12);
}

#[test]
fn boolean_equivalence_compiles_to_constant_one() {
    // !(b && c) == (!b || !c)
    let mut f = fixture();
    let b = f.pool.make_ident("b");
    let c = f.pool.make_ident("c");
    let lhs = f.pool.make_not(f.pool.make_and(b, c));
    let rhs = f.pool.make_or(f.pool.make_not(b), f.pool.make_not(c));
    let unit = f.compile(f.pool.make_iff(lhs, rhs));
    assert_eq!(unit.dds, vec![f.dd.one()]);
}

#[test]
fn signed_comparison_weights_the_sign_bit() {
    // for signed 4-bit operands: -1 < 0 holds, 0 < -1 does not
    let mut f = fixture();
    let s = f.pool.make_ident("s");
    let minus_one = f.pool.make_neg(f.pool.make_iconst(1));
    let zero = f.pool.make_iconst(0);

    // (s = -1) -> (s < 0): a tautology
    let hyp = f.pool.make_eq(s, minus_one);
    let neg_lt_zero = f.pool.make_lt(s, zero);
    let unit = f.compile(f.pool.make_implies(hyp, neg_lt_zero));
    assert_eq!(unit.dds, vec![f.dd.one()]);

    // (s = 0) -> (s < -1): unsatisfiable implication body
    let hyp0 = f.pool.make_eq(s, zero);
    let zero_lt_neg = f.pool.make_lt(s, minus_one);
    let unit = f.compile(f.pool.make_and(hyp0, zero_lt_neg));
    assert_eq!(unit.dds, vec![f.dd.zero()]);
}

#[test]
fn enum_literals_compile_to_distinct_codes() {
    let mut f = fixture();
    let e = f.pool.make_ident("e");
    let a = f.pool.make_ident("A");
    let b = f.pool.make_ident("B");

    // A = A is the constant-1 diagram, A = B the constant-0 diagram
    let unit = f.compile(f.pool.make_eq(a, a));
    assert_eq!(unit.dds, vec![f.dd.one()]);
    let unit = f.compile(f.pool.make_eq(a, b));
    assert_eq!(unit.dds, vec![f.dd.zero()]);

    // e = A depends on e's bits, it is not constant
    let unit = f.compile(f.pool.make_eq(e, a));
    assert!(!f.dd.is_constant(unit.dds[0]));
}

#[test]
fn constant_subscript_selects_the_slice() {
    let mut f = fixture();
    let a = f.pool.make_ident("a");
    let idx = f.pool.make_iconst(2);
    let unit = f.compile(f.pool.make_subscript(a, idx));
    assert_eq!(unit.dds.len(), 4);

    // the slice is exactly the element-2 bits of the array encoding
    let fqn = f.pool.make_dot(f.pool.empty_expr(), a);
    let encoding = f
        .enc
        .find_encoding(TimedExpr::new(fqn, 0))
        .expect("array encoded");
    // unit.dds holds MSB first; encoding is little endian
    let expected: Vec<_> = encoding.dds[8..12].iter().rev().copied().collect();
    assert_eq!(unit.dds, expected);
}

#[test]
fn out_of_bounds_subscript_yields_the_error_constant() {
    let mut f = fixture();
    let a = f.pool.make_ident("a");
    let idx = f.pool.make_iconst(9);
    let unit = f.compile(f.pool.make_subscript(a, idx));
    assert_eq!(unit.dds.len(), 4);
    assert!(unit.dds.iter().all(|&d| d == f.dd.error()));
}

#[test]
fn non_constant_subscript_records_a_multiway_selection() {
    let mut f = fixture();
    let a = f.pool.make_ident("a");
    let x = f.pool.make_ident("x");
    let unit = f.compile(f.pool.make_subscript(a, x));
    assert_eq!(unit.multiway.len(), 1);
    let md = &unit.multiway[0];
    assert_eq!(md.elem_width, 4);
    assert_eq!(md.nelems, 3);
    assert_eq!(md.index_bits.len(), 2);
    assert_eq!(md.array_bits.len(), 12);
    assert_eq!(md.res.len(), 4);
}

#[test]
fn enum_array_subscript_yields_the_coded_element() {
    let mut f = fixture();
    let pal = f.pool.make_ident("pal");
    let p = f.pool.make_ident("P");

    // constant index: a single coded diagram, comparable to a literal
    let sub = f.pool.make_subscript(pal, f.pool.make_iconst(0));
    let unit = f.compile(f.pool.make_eq(sub, p));
    assert_eq!(unit.dds.len(), 1);
    assert!(!f.dd.is_constant(unit.dds[0]));
    assert!(unit.multiway.is_empty());
}

#[test]
fn enum_array_symbolic_subscript_stays_monolithic() {
    let mut f = fixture();
    let pal = f.pool.make_ident("pal");
    let x = f.pool.make_ident("x");
    let unit = f.compile(f.pool.make_subscript(pal, x));
    // one coded diagram on the stack, one mux over the element bits
    assert_eq!(unit.dds.len(), 1);
    assert_eq!(unit.multiway.len(), 1);
    assert_eq!(unit.multiway[0].elem_width, 2);
    assert_eq!(unit.multiway[0].nelems, 2);
}

#[test]
fn multiplication_goes_through_microcode() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let y = f.pool.make_ident("y");
    let unit = f.compile(f.pool.make_mul(x, y));
    assert_eq!(unit.inlined.len(), 1);
    let md = &unit.inlined[0];
    assert_eq!(md.sig.width, 2);
    assert!(!md.sig.signed);
    assert_eq!(md.lhs.len(), 2);
    assert_eq!(md.res.len(), 2);
}

#[test]
fn algebraic_ite_records_a_binary_selection() {
    let mut f = fixture();
    let b = f.pool.make_ident("b");
    let x = f.pool.make_ident("x");
    let y = f.pool.make_ident("y");
    let ite = f.pool.make_ite(b, x, y);
    let unit = f.compile(ite);
    assert_eq!(unit.selections.len(), 1);
    let desc = &unit.selections[0];
    assert_eq!(desc.branches.len(), 1);
    assert_eq!(desc.branches[0].then_bits.len(), 2);
    assert_eq!(desc.else_bits.len(), 2);
    assert_eq!(desc.res.len(), 2);
}

#[test]
fn nested_ite_chains_fuse_into_one_descriptor() {
    let mut f = fixture();
    let b = f.pool.make_ident("b");
    let c = f.pool.make_ident("c");
    let x = f.pool.make_ident("x");
    let y = f.pool.make_ident("y");
    let one = f.pool.make_iconst(1);

    // b ? x : (c ? y : x + 1)
    let inner = f.pool.make_ite(c, y, f.pool.make_add(x, one));
    let outer = f.pool.make_ite(b, x, inner);
    let unit = f.compile(outer);

    // the whole right spine collapses into a single fused multiplexer
    // with one shared result vector
    assert_eq!(unit.selections.len(), 1);
    let desc = &unit.selections[0];
    assert_eq!(desc.branches.len(), 2);
    assert_eq!(desc.branches[0].then_bits.len(), 2);
    assert_eq!(desc.branches[1].then_bits.len(), 2);
    assert_eq!(desc.else_bits.len(), 2);
    assert_eq!(desc.res.len(), 2);
}

#[test]
fn then_branch_selections_stay_separate_chains() {
    let mut f = fixture();
    let b = f.pool.make_ident("b");
    let c = f.pool.make_ident("c");
    let x = f.pool.make_ident("x");
    let y = f.pool.make_ident("y");

    // (b ? (c ? x : y) : y): the nested ITE sits in the then branch,
    // not on the right spine, so it is its own chain
    let inner = f.pool.make_ite(c, x, y);
    let outer = f.pool.make_ite(b, inner, y);
    let unit = f.compile(outer);
    assert_eq!(unit.selections.len(), 2);
    assert!(unit.selections.iter().all(|d| d.branches.len() == 1));
}

#[test]
fn set_literal_allocates_a_determinization_bit() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let zero = f.pool.make_iconst(0);
    let two = f.pool.make_iconst(2);
    // x = {0, 2}
    let set = f.pool.make_set(f.pool.make_comma(zero, two));
    let bits_before = f.enc.nbits();
    let unit = f.compile(f.pool.make_eq(x, set));
    assert_eq!(unit.dds.len(), 1);
    // one determinization bit plus the selection result bits
    assert!(f.enc.nbits() > bits_before);
}

#[test]
fn boolean_ite_needs_no_descriptor() {
    let mut f = fixture();
    let b = f.pool.make_ident("b");
    let c = f.pool.make_ident("c");
    let t = f.pool.true_expr();
    let unit = f.compile(f.pool.make_ite(b, c, t));
    assert!(unit.is_pure());
}

#[test]
fn define_bodies_compile_transparently() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let d = f.pool.make_ident("d");
    let one = f.pool.make_iconst(1);
    let main = f.pool.atoms().lookup("main").unwrap();
    f.model
        .module_mut(main)
        .unwrap()
        .add_define(Define {
            module: main,
            name: d,
            body: f.pool.make_add(x, one),
            formals: vec![],
        })
        .unwrap();

    let direct = f.compile(f.pool.make_add(x, one));
    let through_define = f.compile(d);
    assert_eq!(direct.dds, through_define.dds);
}

#[test]
fn next_shifts_the_encoding_time() {
    let mut f = fixture();
    let x = f.pool.make_ident("x");
    let now = f.compile(x);
    let then = f.compile(f.pool.make_next(x));
    assert_ne!(now.dds, then.dds);

    let fqn = f.pool.make_dot(f.pool.empty_expr(), x);
    assert!(f.enc.find_encoding(TimedExpr::new(fqn, 0)).is_some());
    assert!(f.enc.find_encoding(TimedExpr::new(fqn, 1)).is_some());
}
