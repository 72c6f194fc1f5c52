//! Witness data and SAT-model reconstruction.

use std::collections::HashMap;

use sybil_compile::{DecodedValue, EncodingMgr};
use sybil_expr::{ExprId, ExprPool, Step, Tcbi, TimedExpr, FROZEN};
use sybil_model::Model;
use sybil_sat::Engine;
use sybil_type::TypeMgr;
use tracing::trace;

/// One step of a witness: qualified name → value expression.
#[derive(Debug, Clone, Default)]
pub struct TimeFrame {
    values: HashMap<ExprId, ExprId>,
    order: Vec<ExprId>,
}

impl TimeFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, symbol: ExprId, value: ExprId) {
        if self.values.insert(symbol, value).is_none() {
            self.order.push(symbol);
        }
    }

    pub fn value(&self, symbol: ExprId) -> Option<ExprId> {
        self.values.get(&symbol).copied()
    }

    /// Symbols in insertion (declaration) order.
    pub fn symbols(&self) -> &[ExprId] {
        &self.order
    }
}

/// A named trace over `[first_time, last_time]`.
#[derive(Debug, Clone)]
pub struct Witness {
    id: String,
    desc: String,
    first_time: Step,
    frames: Vec<TimeFrame>,
}

impl Witness {
    pub fn new(id: impl Into<String>, desc: impl Into<String>) -> Self {
        Witness {
            id: id.into(),
            desc: desc.into(),
            first_time: 0,
            frames: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn first_time(&self) -> Step {
        self.first_time
    }

    pub fn last_time(&self) -> Step {
        self.first_time + self.frames.len().saturating_sub(1) as Step
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn new_frame(&mut self) -> &mut TimeFrame {
        self.frames.push(TimeFrame::new());
        self.frames.last_mut().expect("just pushed")
    }

    pub fn frame(&self, step: Step) -> Option<&TimeFrame> {
        let index = step.checked_sub(self.first_time)? as usize;
        self.frames.get(index)
    }

    pub fn has_value(&self, symbol: ExprId, step: Step) -> bool {
        self.value(symbol, step).is_some()
    }

    pub fn value(&self, symbol: ExprId, step: Step) -> Option<ExprId> {
        self.frame(step)?.value(symbol)
    }
}

fn value_expr(pool: &ExprPool, value: &DecodedValue) -> ExprId {
    match value {
        DecodedValue::Bool(true) => pool.true_expr(),
        DecodedValue::Bool(false) => pool.false_expr(),
        DecodedValue::Int(v) => pool.make_signed_const(*v),
        DecodedValue::Literal(atom) => pool.make_ident_atom(*atom),
        DecodedValue::Array(elems) => {
            // render as a braced list: { v0, v1, ... }
            let mut chain: Option<ExprId> = None;
            for elem in elems.iter().rev() {
                let e = value_expr(pool, elem);
                chain = Some(match chain {
                    None => e,
                    Some(rest) => pool.make_comma(e, rest),
                });
            }
            pool.make_set(chain.unwrap_or_else(|| pool.undef_expr()))
        }
    }
}

/// Rebuilds a trace from the engine's model after a satisfiable solve.
///
/// For each step and each visible variable, every bit of the encoding
/// is timed (frozen bits pin to step 0), read from the model with
/// don't-cares defaulting to 0, and decoded. Symbols without an
/// encoding are outside the cone of influence and silently omitted.
pub fn reconstruct(
    pool: &ExprPool,
    tm: &TypeMgr,
    model: &Model,
    enc: &EncodingMgr,
    engine: &Engine,
    k: Step,
    id: impl Into<String>,
    desc: impl Into<String>,
) -> Witness {
    let mut witness = Witness::new(id, desc);

    for step in 0..=k {
        let frame = witness.new_frame();

        for (ctx, var) in model.each_variable() {
            if var.hidden || tm.is_instance(var.ty) {
                continue;
            }
            let fqn = pool.make_dot(ctx, var.name);
            let key_time = if var.frozen { FROZEN } else { 0 };
            let Some(encoding) = enc.find_encoding(TimedExpr::new(fqn, key_time)) else {
                trace!(symbol = %pool.display(fqn), "not in the cone of influence");
                continue;
            };

            let mut bits = Vec::with_capacity(encoding.bits.len());
            for &dd_var in &encoding.bits {
                let ucbi = enc.find_ucbi(dd_var);
                let tcbi = Tcbi::new(ucbi, step);
                let value = engine
                    .tcbi_lookup(tcbi)
                    .and_then(|v| engine.value(v))
                    .unwrap_or(false);
                bits.push(value);
            }

            let decoded = encoding.decode(&bits);
            frame.set(fqn, value_expr(pool, &decoded));
        }
    }

    witness
}

#[cfg(test)]
mod tests {
    use super::*;
    use sybil_expr::ExprKind;

    #[test]
    fn frames_index_from_first_time() {
        let mut w = Witness::new("w1", "test");
        w.new_frame();
        w.new_frame();
        assert_eq!(w.first_time(), 0);
        assert_eq!(w.last_time(), 1);
        assert!(w.frame(0).is_some());
        assert!(w.frame(2).is_none());
    }

    #[test]
    fn frame_values_round_trip() {
        let pool = ExprPool::new();
        let x = pool.make_ident("x");
        let mut w = Witness::new("w1", "test");
        let v = pool.make_iconst(3);
        w.new_frame().set(x, v);
        assert_eq!(w.value(x, 0), Some(v));
        assert!(!w.has_value(x, 1));
    }

    #[test]
    fn decoded_values_render_as_expressions() {
        let pool = ExprPool::new();
        assert_eq!(
            value_expr(&pool, &DecodedValue::Bool(true)),
            pool.true_expr()
        );
        assert_eq!(
            value_expr(&pool, &DecodedValue::Int(-2)),
            pool.make_signed_const(-2)
        );

        let atoms = pool.atoms();
        let a = atoms.intern("A");
        assert_eq!(
            value_expr(&pool, &DecodedValue::Literal(a)),
            pool.make_ident("A")
        );

        let arr = DecodedValue::Array(vec![DecodedValue::Int(1), DecodedValue::Int(2)]);
        let rendered = value_expr(&pool, &arr);
        assert_eq!(pool.kind(rendered), ExprKind::Set);
    }
}
