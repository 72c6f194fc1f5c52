//! Infix printer for pooled expressions.
//!
//! Parenthesisation is precedence-driven, so printing a parsed expression
//! and re-parsing it round-trips.

use std::fmt;

use crate::kind::ExprKind;
use crate::pool::{ExprData, ExprId, ExprPool};

/// Display adapter returned by [`ExprPool::display`].
pub struct ExprDisplay<'a> {
    pool: &'a ExprPool,
    id: ExprId,
}

impl ExprPool {
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { pool: self, id }
    }

    /// Convenience: the printed form as an owned string.
    pub fn to_text(&self, id: ExprId) -> String {
        self.display(id).to_string()
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(self.pool, f, self.id, 0)
    }
}

/// Binding power of an operator; higher binds tighter.
fn prec(kind: ExprKind) -> u8 {
    match kind {
        ExprKind::Assign | ExprKind::Guard | ExprKind::Comma => 1,
        ExprKind::Ite | ExprKind::Cond => 2,
        ExprKind::Iff => 3,
        ExprKind::Implies => 4,
        ExprKind::U | ExprKind::R => 5,
        ExprKind::Or | ExprKind::BwOr => 6,
        ExprKind::BwXor | ExprKind::BwXnor => 7,
        ExprKind::And | ExprKind::BwAnd => 8,
        ExprKind::Eq
        | ExprKind::Ne
        | ExprKind::Lt
        | ExprKind::Le
        | ExprKind::Gt
        | ExprKind::Ge => 9,
        ExprKind::Lshift | ExprKind::Rshift => 10,
        ExprKind::Add | ExprKind::Sub => 11,
        ExprKind::Mul | ExprKind::Div | ExprKind::Mod => 12,
        ExprKind::Neg | ExprKind::Not | ExprKind::BwNot => 13,
        ExprKind::Dot | ExprKind::Subscript | ExprKind::Params => 14,
        _ => 15,
    }
}

fn binary_symbol(kind: ExprKind) -> &'static str {
    match kind {
        ExprKind::Add => "+",
        ExprKind::Sub => "-",
        ExprKind::Mul => "*",
        ExprKind::Div => "/",
        ExprKind::Mod => "mod",
        ExprKind::BwAnd => "&",
        ExprKind::BwOr => "|",
        ExprKind::BwXor => "xor",
        ExprKind::BwXnor => "xnor",
        ExprKind::And => "&",
        ExprKind::Or => "|",
        ExprKind::Implies => "->",
        ExprKind::Iff => "<->",
        ExprKind::Lshift => "<<",
        ExprKind::Rshift => ">>",
        ExprKind::Eq => "=",
        ExprKind::Ne => "!=",
        ExprKind::Lt => "<",
        ExprKind::Le => "<=",
        ExprKind::Gt => ">",
        ExprKind::Ge => ">=",
        ExprKind::U => "U",
        ExprKind::R => "R",
        ExprKind::Assign => ":=",
        ExprKind::Guard => "?->",
        ExprKind::Comma => ",",
        _ => unreachable!("not a binary operator"),
    }
}

fn write_expr(
    pool: &ExprPool,
    f: &mut fmt::Formatter<'_>,
    id: ExprId,
    parent: u8,
) -> fmt::Result {
    let node = pool.node(id);
    let my = prec(node.kind);
    let parens = my < parent;
    if parens {
        f.write_str("(")?;
    }
    match (node.kind, node.data) {
        (ExprKind::Ident, ExprData::Atom(a)) => {
            f.write_str(&pool.atoms().resolve(a))?;
        }
        (ExprKind::IConst, ExprData::Value(v)) => write!(f, "{}", v)?,
        (ExprKind::HConst, ExprData::Value(v)) => write!(f, "0x{:x}", v)?,
        (ExprKind::OConst, ExprData::Value(v)) => write!(f, "0o{:o}", v)?,
        (ExprKind::FConst, ExprData::Value(v)) => write!(f, "{}", v)?,
        (ExprKind::Undef, _) => f.write_str("UNDEF")?,
        (ExprKind::TypeTag, ExprData::Atom(a)) => {
            f.write_str(&pool.atoms().resolve(a))?;
        }
        (ExprKind::TypeTag, ExprData::Value(v)) => write!(f, "{}", v)?,

        (ExprKind::Next, ExprData::Unary(l)) => {
            f.write_str("next(")?;
            write_expr(pool, f, l, 0)?;
            f.write_str(")")?;
        }
        (ExprKind::Set, ExprData::Unary(l)) => {
            f.write_str("{")?;
            write_expr(pool, f, l, 0)?;
            f.write_str("}")?;
        }
        (ExprKind::Not, ExprData::Unary(l)) => {
            f.write_str("!")?;
            write_expr(pool, f, l, my)?;
        }
        (ExprKind::Neg, ExprData::Unary(l)) => {
            f.write_str("-")?;
            write_expr(pool, f, l, my)?;
        }
        (ExprKind::BwNot, ExprData::Unary(l)) => {
            f.write_str("~")?;
            write_expr(pool, f, l, my)?;
        }
        (ExprKind::F | ExprKind::G | ExprKind::X, ExprData::Unary(l)) => {
            let sym = match node.kind {
                ExprKind::F => "F ",
                ExprKind::G => "G ",
                _ => "X ",
            };
            f.write_str(sym)?;
            write_expr(pool, f, l, my)?;
        }

        (ExprKind::Dot, ExprData::Binary(l, r)) => {
            // empty context prefixes print as the bare name
            if l != pool.empty_expr() {
                write_expr(pool, f, l, my)?;
                f.write_str(".")?;
            }
            write_expr(pool, f, r, my)?;
        }
        (ExprKind::Subscript, ExprData::Binary(l, r)) => {
            write_expr(pool, f, l, my)?;
            f.write_str("[")?;
            write_expr(pool, f, r, 0)?;
            f.write_str("]")?;
        }
        (ExprKind::Params, ExprData::Binary(l, r)) => {
            write_expr(pool, f, l, my)?;
            f.write_str("(")?;
            write_expr(pool, f, r, 0)?;
            f.write_str(")")?;
        }
        (ExprKind::Cast, ExprData::Binary(tag, operand)) => {
            match pool.node(tag).data {
                ExprData::Atom(_) => {
                    f.write_str("bool(")?;
                    write_expr(pool, f, operand, 0)?;
                    f.write_str(")")?;
                }
                ExprData::Value(w) => {
                    f.write_str("resize(")?;
                    write_expr(pool, f, operand, 0)?;
                    write!(f, ", {})", w)?;
                }
                _ => unreachable!("malformed cast tag"),
            }
        }
        (ExprKind::Ite, ExprData::Binary(cond, else_)) => {
            // Ite(Cond(c, t), e)
            let c = pool.lhs(cond);
            let t = pool.rhs(cond);
            write_expr(pool, f, c, my + 1)?;
            f.write_str(" ? ")?;
            write_expr(pool, f, t, my + 1)?;
            f.write_str(" : ")?;
            write_expr(pool, f, else_, my)?;
        }
        (ExprKind::Cond, ExprData::Binary(l, r)) => {
            write_expr(pool, f, l, my + 1)?;
            f.write_str(" ? ")?;
            write_expr(pool, f, r, my + 1)?;
        }

        (kind, ExprData::Binary(l, r)) => {
            write_expr(pool, f, l, my)?;
            write!(f, " {} ", binary_symbol(kind))?;
            write_expr(pool, f, r, my + 1)?;
        }
        (kind, data) => unreachable!("malformed node {:?} {:?}", kind, data),
    }
    if parens {
        f.write_str(")")?;
    }
    Ok(())
}
