//! Timed expressions and canonical bit identifiers.
//!
//! The encoder keys encodings by [`TimedExpr`]; each bit of an encoding
//! gets a stable [`Ucbi`] address. At CNF-injection time a `Ucbi` is
//! stamped with a base step into a [`Tcbi`], which maps one-to-one onto a
//! solver variable.

use crate::pool::ExprId;
use std::fmt;

/// Time steps. Relative offsets and absolute steps share this type.
pub type Step = u64;

/// Sentinel step for frozen variables: their value is chosen once at step
/// 0 and never re-encoded.
pub const FROZEN: Step = Step::MAX;

/// An expression paired with a (relative) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimedExpr {
    pub expr: ExprId,
    pub time: Step,
}

impl TimedExpr {
    pub fn new(expr: ExprId, time: Step) -> Self {
        Self { expr, time }
    }
}

/// Untimed canonical bit identifier: a single bit of the encoding of a
/// qualified name, at a relative time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ucbi {
    /// The qualified name this bit belongs to.
    pub expr: ExprId,
    /// Relative time offset (0 unless under `next`), or [`FROZEN`].
    pub time: Step,
    /// Bit position within the encoding, 0 = least significant.
    pub bit: u32,
}

impl Ucbi {
    pub fn new(expr: ExprId, time: Step, bit: u32) -> Self {
        Self { expr, time, bit }
    }
}

/// Timed canonical bit identifier: a [`Ucbi`] grounded at a base step.
///
/// Frozen bits collapse onto step 0 regardless of the base, so every
/// unrolling shares the single choice made at the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tcbi {
    pub expr: ExprId,
    /// Absolute time step.
    pub time: Step,
    pub bit: u32,
}

impl Tcbi {
    pub fn new(ucbi: Ucbi, base: Step) -> Self {
        let time = if ucbi.time == FROZEN {
            0
        } else {
            ucbi.time + base
        };
        Tcbi {
            expr: ucbi.expr,
            time,
            bit: ucbi.bit,
        }
    }
}

impl fmt::Display for Tcbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{}#{}", self.time, self.expr.index(), self.bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ExprPool;

    #[test]
    fn tcbi_offsets_by_base() {
        let pool = ExprPool::new();
        let x = pool.make_ident("x");
        let ucbi = Ucbi::new(x, 1, 2);
        let tcbi = Tcbi::new(ucbi, 3);
        assert_eq!(tcbi.time, 4);
        assert_eq!(tcbi.bit, 2);
    }

    #[test]
    fn frozen_bits_pin_to_step_zero() {
        let pool = ExprPool::new();
        let x = pool.make_ident("f");
        let ucbi = Ucbi::new(x, FROZEN, 0);
        assert_eq!(Tcbi::new(ucbi, 7).time, 0);
        assert_eq!(Tcbi::new(ucbi, 0), Tcbi::new(ucbi, 9));
    }
}
