//! Clause-template synthesis.
//!
//! Templates are CNF renderings of combinational circuits over abstract
//! bit positions: `1..=w` result bits, `w+1..=2w` lhs, `2w+1..=3w` rhs,
//! everything above `3w` auxiliary. Negative indices denote negation,
//! so net complementation is free.
//!
//! Conventions: multiplication keeps the low `w` bits; shifts are
//! logical with amounts at or above the width yielding zero; division
//! is truncated (quotient rounds toward zero, the remainder takes the
//! dividend's sign); division by zero leaves an all-ones quotient and
//! the dividend as remainder, the restoring-divider fixpoint.

use sybil_compile::{InlinedOp, OpSignature};

type Net = i32;

struct Circuit {
    width: u32,
    next_aux: i32,
    clauses: Vec<Vec<i32>>,
    true_net: Option<Net>,
}

impl Circuit {
    fn new(width: u32) -> Self {
        Circuit {
            width,
            next_aux: 3 * width as i32 + 1,
            clauses: Vec::new(),
            true_net: None,
        }
    }

    fn res(&self, i: u32) -> Net {
        1 + i as i32
    }

    fn lhs(&self, i: u32) -> Net {
        1 + (self.width + i) as i32
    }

    fn rhs(&self, i: u32) -> Net {
        1 + (2 * self.width + i) as i32
    }

    fn fresh(&mut self) -> Net {
        let n = self.next_aux;
        self.next_aux += 1;
        n
    }

    /// The constant-true net (a pinned auxiliary).
    fn tru(&mut self) -> Net {
        if let Some(t) = self.true_net {
            return t;
        }
        let t = self.fresh();
        self.clauses.push(vec![t]);
        self.true_net = Some(t);
        t
    }

    fn fls(&mut self) -> Net {
        -self.tru()
    }

    fn and2(&mut self, a: Net, b: Net) -> Net {
        let o = self.fresh();
        self.clauses.push(vec![-a, -b, o]);
        self.clauses.push(vec![a, -o]);
        self.clauses.push(vec![b, -o]);
        o
    }

    fn or2(&mut self, a: Net, b: Net) -> Net {
        -self.and2(-a, -b)
    }

    fn xor2(&mut self, a: Net, b: Net) -> Net {
        let o = self.fresh();
        self.clauses.push(vec![-a, -b, -o]);
        self.clauses.push(vec![a, b, -o]);
        self.clauses.push(vec![a, -b, o]);
        self.clauses.push(vec![-a, b, o]);
        o
    }

    /// `s ? a : b`.
    fn mux(&mut self, s: Net, a: Net, b: Net) -> Net {
        let o = self.fresh();
        self.clauses.push(vec![-s, -a, o]);
        self.clauses.push(vec![-s, a, -o]);
        self.clauses.push(vec![s, -b, o]);
        self.clauses.push(vec![s, b, -o]);
        o
    }

    fn full_add(&mut self, a: Net, b: Net, c: Net) -> (Net, Net) {
        let ab = self.xor2(a, b);
        let sum = self.xor2(ab, c);
        let carry_ab = self.and2(a, b);
        let carry_c = self.and2(ab, c);
        let carry = self.or2(carry_ab, carry_c);
        (sum, carry)
    }

    /// Ties a computed net to an output position.
    fn bind(&mut self, net: Net, out: Net) {
        self.clauses.push(vec![-net, out]);
        self.clauses.push(vec![net, -out]);
    }

    /// Two's complement negation of a bit vector.
    fn negate(&mut self, xs: &[Net]) -> Vec<Net> {
        // ~x + 1 with a half-adder carry chain
        let mut carry = self.tru();
        let mut out = Vec::with_capacity(xs.len());
        for &x in xs {
            out.push(self.xor2(-x, carry));
            carry = self.and2(-x, carry);
        }
        out
    }

    fn cond_negate(&mut self, s: Net, xs: &[Net]) -> Vec<Net> {
        let negated = self.negate(xs);
        xs.iter()
            .zip(&negated)
            .map(|(&x, &n)| self.mux(s, n, x))
            .collect()
    }

    /// `a - b` over equal-width vectors; also returns the borrow-out
    /// (set when `a < b` unsigned).
    fn subtract(&mut self, a: &[Net], b: &[Net]) -> (Vec<Net>, Net) {
        let mut borrow = self.fls();
        let mut diff = Vec::with_capacity(a.len());
        for (&x, &y) in a.iter().zip(b) {
            let xy = self.xor2(x, y);
            diff.push(self.xor2(xy, borrow));
            let lend = self.and2(-x, y);
            let keep = self.and2(-xy, borrow);
            borrow = self.or2(lend, keep);
        }
        (diff, borrow)
    }
}

/// Synthesises the clause template for a signature.
pub(crate) fn synthesize(sig: OpSignature) -> Vec<Vec<i32>> {
    let w = sig.width;
    let mut c = Circuit::new(w);
    let lhs: Vec<Net> = (0..w).map(|i| c.lhs(i)).collect();
    let rhs: Vec<Net> = (0..w).map(|i| c.rhs(i)).collect();

    let result = match sig.op {
        InlinedOp::BwAnd => lhs
            .iter()
            .zip(&rhs)
            .map(|(&a, &b)| c.and2(a, b))
            .collect(),
        InlinedOp::BwOr => lhs.iter().zip(&rhs).map(|(&a, &b)| c.or2(a, b)).collect(),
        InlinedOp::BwXor => lhs
            .iter()
            .zip(&rhs)
            .map(|(&a, &b)| c.xor2(a, b))
            .collect(),
        InlinedOp::BwXnor => lhs
            .iter()
            .zip(&rhs)
            .map(|(&a, &b)| -c.xor2(a, b))
            .collect(),
        InlinedOp::Mul => multiplier(&mut c, &lhs, &rhs),
        InlinedOp::Shl => shifter(&mut c, &lhs, &rhs, true),
        InlinedOp::Shr => shifter(&mut c, &lhs, &rhs, false),
        InlinedOp::Div => divider(&mut c, &lhs, &rhs, sig.signed).0,
        InlinedOp::Mod => divider(&mut c, &lhs, &rhs, sig.signed).1,
    };

    for (i, net) in result.into_iter().enumerate() {
        let out = c.res(i as u32);
        c.bind(net, out);
    }
    c.clauses
}

/// Shift-and-add array multiplier, low `w` bits kept.
fn multiplier(c: &mut Circuit, lhs: &[Net], rhs: &[Net]) -> Vec<Net> {
    let w = lhs.len();
    let mut acc: Vec<Net> = (0..w).map(|i| c.and2(lhs[i], rhs[0])).collect();
    for j in 1..w {
        // add the j-th partial product into acc[j..]
        let mut carry = c.fls();
        for i in j..w {
            let pp = c.and2(lhs[i - j], rhs[j]);
            let (sum, co) = c.full_add(acc[i], pp, carry);
            acc[i] = sum;
            carry = co;
        }
    }
    acc
}

/// Logarithmic barrel shifter; `left` picks the direction. Amounts at
/// or above the width produce zero.
fn shifter(c: &mut Circuit, lhs: &[Net], rhs: &[Net], left: bool) -> Vec<Net> {
    let w = lhs.len();
    let stages = usize::BITS - (w - 1).leading_zeros();
    let stages = if w == 1 { 0 } else { stages as usize };

    let mut cur: Vec<Net> = lhs.to_vec();
    let zero = c.fls();
    for k in 0..stages.min(w) {
        let amount = 1usize << k;
        let select = rhs[k];
        cur = (0..w)
            .map(|i| {
                let from = if left {
                    i.checked_sub(amount).map(|j| cur[j])
                } else {
                    cur.get(i + amount).copied()
                };
                let shifted = from.unwrap_or(zero);
                c.mux(select, shifted, cur[i])
            })
            .collect();
    }

    // any set amount bit beyond the stage range shifts everything out
    let mut overshoot = zero;
    for &bit in rhs.iter().skip(stages.min(w)) {
        overshoot = c.or2(overshoot, bit);
    }
    cur.into_iter()
        .map(|net| c.mux(overshoot, zero, net))
        .collect()
}

/// Restoring divider: returns `(quotient, remainder)`. Signed operands
/// divide by magnitude with the signs fixed up afterwards (truncated
/// division).
fn divider(
    c: &mut Circuit,
    lhs: &[Net],
    rhs: &[Net],
    signed: bool,
) -> (Vec<Net>, Vec<Net>) {
    let w = lhs.len();

    let (dividend, divisor, sign_a, sign_b) = if signed {
        let sa = lhs[w - 1];
        let sb = rhs[w - 1];
        (
            c.cond_negate(sa, lhs),
            c.cond_negate(sb, rhs),
            Some(sa),
            Some(sb),
        )
    } else {
        (lhs.to_vec(), rhs.to_vec(), None, None)
    };

    let zero = c.fls();
    // divisor zero-extended to w + 1 bits for the trial subtraction
    let mut divisor_ext = divisor.clone();
    divisor_ext.push(zero);

    let mut rem: Vec<Net> = vec![zero; w];
    let mut quot: Vec<Net> = vec![zero; w];

    for i in (0..w).rev() {
        // shift the next dividend bit into the remainder
        let mut trial = Vec::with_capacity(w + 1);
        trial.push(dividend[i]);
        trial.extend(rem.iter().take(w));
        debug_assert_eq!(trial.len(), w + 1);

        let (diff, borrow) = c.subtract(&trial, &divisor_ext);
        let geq = -borrow;
        quot[i] = geq;
        rem = (0..w).map(|k| c.mux(geq, diff[k], trial[k])).collect();
    }

    match (sign_a, sign_b) {
        (Some(sa), Some(sb)) => {
            // a zero divisor keeps the all-ones magnitude quotient: the
            // sign fixup only fires when there is something to divide by
            let mut nonzero = zero;
            for &bit in &divisor {
                nonzero = c.or2(nonzero, bit);
            }
            let signs_differ = c.xor2(sa, sb);
            let sq = c.and2(signs_differ, nonzero);
            (c.cond_negate(sq, &quot), c.cond_negate(sa, &rem))
        }
        _ => (quot, rem),
    }
}
