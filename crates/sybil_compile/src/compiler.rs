//! The expression compiler.
//!
//! A structural walk over the DAG carrying four stacks: result diagrams,
//! inferred types, the current resolution context and the current time
//! frame. Postorder emits results; `next` pushes time; `Dot` pushes
//! context. Deterministic subresults are memoised per
//! `(context, expression, time)` together with any descriptors their
//! subtree produced; set literals allocate a fresh determinization bit
//! per occurrence and are never cached.
//!
//! Algebraic ITE chains nested along the right spine are consumed at
//! their toplevel and collapsed into one fused selection descriptor:
//! the whole multi-way choice shares a single result vector instead of
//! cascading one per nesting level.
//!
//! Operand vectors live on the stack most significant bit first, so a
//! `pop_dv` yields a little-endian `Vec`; results are pushed back in
//! reverse. Widths are preserved throughout: a compiled algebraic
//! expression of width `w` contributes exactly `w` diagrams, booleans
//! and enums exactly one.

use std::collections::HashMap;

use sybil_dd::{AddId, AddMgr};
use sybil_expr::{ExprId, ExprKind, ExprPool, Step, TimedExpr, FROZEN};
use sybil_model::{preprocessor, resolver, Model, Resolved, Resolver};
use sybil_type::{TypeError, TypeId, TypeMgr};
use tracing::{debug, trace};

use crate::enc::EncodingMgr;
use crate::error::CompileError;
use crate::unit::{
    BinarySelectionDescriptor, CompilationUnit, InlinedOp, InlinedOperatorDescriptor,
    MultiwaySelectionDescriptor, OpSignature, SelectionBranch,
};

#[derive(Clone)]
struct CachedResult {
    dds: Vec<AddId>,
    ty: TypeId,
    inlined: Vec<InlinedOperatorDescriptor>,
    selections: Vec<BinarySelectionDescriptor>,
    multiway: Vec<MultiwaySelectionDescriptor>,
}

pub struct Compiler<'c> {
    pool: &'c ExprPool,
    tm: &'c TypeMgr,
    model: &'c Model,
    dd: &'c AddMgr,
    enc: &'c EncodingMgr,

    type_stack: Vec<TypeId>,
    add_stack: Vec<AddId>,
    ctx_stack: Vec<ExprId>,
    time_stack: Vec<Step>,

    cache: HashMap<(ExprId, ExprId, Step), CachedResult>,

    // descriptors collected during the current process() call
    inlined: Vec<InlinedOperatorDescriptor>,
    selections: Vec<BinarySelectionDescriptor>,
    multiway: Vec<MultiwaySelectionDescriptor>,

    nondet_events: u64,
    depth: u32,
    auto_index: u32,
}

impl<'c> Compiler<'c> {
    pub fn new(
        pool: &'c ExprPool,
        tm: &'c TypeMgr,
        model: &'c Model,
        dd: &'c AddMgr,
        enc: &'c EncodingMgr,
    ) -> Self {
        Compiler {
            pool,
            tm,
            model,
            dd,
            enc,
            type_stack: Vec::new(),
            add_stack: Vec::new(),
            ctx_stack: Vec::new(),
            time_stack: Vec::new(),
            cache: HashMap::new(),
            inlined: Vec::new(),
            selections: Vec::new(),
            multiway: Vec::new(),
            nondet_events: 0,
            depth: 0,
            auto_index: 0,
        }
    }

    /// Compiles `body` in `ctx` at time 0.
    pub fn process(&mut self, ctx: ExprId, body: ExprId) -> Result<CompilationUnit, CompileError> {
        self.type_stack.clear();
        self.add_stack.clear();
        self.ctx_stack.clear();
        self.time_stack.clear();
        self.inlined.clear();
        self.selections.clear();
        self.multiway.clear();

        self.ctx_stack.push(ctx);
        self.time_stack.push(0);

        debug!(body = %self.pool.display(body), "compiling");
        let started = std::time::Instant::now();

        self.walk(body)?;

        // contracts at the end of a successful compile
        assert_eq!(self.ctx_stack.len(), 1);
        assert_eq!(self.time_stack.len(), 1);
        assert_eq!(self.type_stack.len(), 1);
        let ty = self.type_stack[0];
        assert_eq!(
            self.add_stack.len(),
            self.contribution(ty),
            "result width does not match the inferred type"
        );

        let unit = CompilationUnit {
            dds: self.add_stack.clone(),
            inlined: std::mem::take(&mut self.inlined),
            selections: std::mem::take(&mut self.selections),
            multiway: std::mem::take(&mut self.multiway),
        };

        debug!(elapsed = ?started.elapsed(), "compilation done");
        Ok(unit)
    }

    /// The type inferred for the last processed body.
    pub fn result_type(&self) -> Option<TypeId> {
        self.type_stack.last().copied()
    }

    // -- stack plumbing ------------------------------------------------------

    fn cur_ctx(&self) -> ExprId {
        *self.ctx_stack.last().expect("empty ctx stack")
    }

    fn cur_time(&self) -> Step {
        *self.time_stack.last().expect("empty time stack")
    }

    /// Pops a little-endian operand vector (stack holds MSB first).
    fn pop_dv(&mut self, width: u32) -> Vec<AddId> {
        let mut out = Vec::with_capacity(width as usize);
        for _ in 0..width {
            out.push(self.add_stack.pop().expect("dd stack underflow"));
        }
        out
    }

    /// Pushes a little-endian vector (MSB ends up deepest).
    fn push_dv(&mut self, dds: &[AddId]) {
        for &d in dds.iter().rev() {
            self.add_stack.push(d);
        }
    }

    fn pop_type(&mut self) -> TypeId {
        self.type_stack.pop().expect("type stack underflow")
    }

    /// Stack entries a finished node of this type occupies.
    fn contribution(&self, ty: TypeId) -> usize {
        if self.tm.is_monolithic(ty) || self.tm.is_int_const(ty) {
            1
        } else {
            self.tm.width(ty) as usize
        }
    }

    fn make_auto_vec(&mut self, width: u32) -> (Vec<u32>, Vec<AddId>) {
        let name = self
            .pool
            .make_ident(&format!("__tmp{}", self.auto_index));
        self.auto_index += 1;
        let fqn = self.pool.make_dot(self.pool.empty_expr(), name);
        self.enc
            .make_anonymous(self.dd, fqn, self.cur_time(), width)
    }

    // -- the walk ------------------------------------------------------------

    fn walk(&mut self, expr: ExprId) -> Result<(), CompileError> {
        let kind = self.pool.kind(expr);
        let key = (self.cur_ctx(), expr, self.cur_time());

        // set literals are never cache-eligible
        let cache_kind = !matches!(kind, ExprKind::Set | ExprKind::Comma);
        if cache_kind {
            if let Some(hit) = self.cache.get(&key).cloned() {
                trace!(expr = %self.pool.display(expr), "cache hit");
                self.push_dv(&hit.dds);
                self.type_stack.push(hit.ty);
                self.inlined.extend(hit.inlined);
                self.selections.extend(hit.selections);
                self.multiway.extend(hit.multiway);
                return Ok(());
            }
        }

        let stack_mark = self.add_stack.len();
        let inl_mark = self.inlined.len();
        let sel_mark = self.selections.len();
        let msd_mark = self.multiway.len();
        let nondet_mark = self.nondet_events;

        self.depth += 1;
        let result = self.dispatch(expr, kind);
        self.depth -= 1;
        let cacheable = result?;

        let deterministic = self.nondet_events == nondet_mark;
        if cache_kind && cacheable && deterministic && self.depth > 0 {
            let ty = *self.type_stack.last().expect("type stack underflow");
            let contribution = self.contribution(ty);
            let dds: Vec<AddId> = {
                let slice = &self.add_stack[stack_mark..];
                debug_assert_eq!(slice.len(), contribution);
                // stack slice is MSB first; store little endian
                slice.iter().rev().copied().collect()
            };
            self.cache.insert(
                key,
                CachedResult {
                    dds,
                    ty,
                    inlined: self.inlined[inl_mark..].to_vec(),
                    selections: self.selections[sel_mark..].to_vec(),
                    multiway: self.multiway[msd_mark..].to_vec(),
                },
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, expr: ExprId, kind: ExprKind) -> Result<bool, CompileError> {
        match kind {
            ExprKind::Ident => self.walk_leaf(expr),

            ExprKind::IConst | ExprKind::HConst | ExprKind::OConst | ExprKind::FConst => {
                let v = self.pool.value(expr);
                self.add_stack.push(self.dd.constant(v as i64));
                self.type_stack.push(self.tm.find_int_const());
                Ok(true)
            }

            ExprKind::Next => {
                let t = self.cur_time();
                self.time_stack.push(t + 1);
                self.walk(self.pool.lhs(expr))?;
                self.time_stack.pop();
                Ok(true)
            }

            ExprKind::Not => {
                self.walk(self.pool.lhs(expr))?;
                let ty = *self.type_stack.last().unwrap();
                if !self.tm.is_boolean(ty) {
                    return Err(TypeError::BadType {
                        expr,
                        expected: "boolean",
                    }
                    .into());
                }
                let top = self.add_stack.pop().unwrap();
                self.add_stack.push(self.dd.cmpl(top));
                Ok(true)
            }

            ExprKind::Neg => self.walk_neg(expr),
            ExprKind::BwNot => self.walk_bw_not(expr),

            ExprKind::And | ExprKind::Or | ExprKind::Implies | ExprKind::Iff => {
                self.walk_boolean_binary(expr, kind)
            }

            ExprKind::Add | ExprKind::Sub => self.walk_additive(expr, kind),

            ExprKind::Mul => self.walk_inlined(expr, InlinedOp::Mul),
            ExprKind::Div => self.walk_inlined(expr, InlinedOp::Div),
            ExprKind::Mod => self.walk_inlined(expr, InlinedOp::Mod),
            ExprKind::Lshift => self.walk_inlined(expr, InlinedOp::Shl),
            ExprKind::Rshift => self.walk_inlined(expr, InlinedOp::Shr),

            ExprKind::BwAnd => self.walk_bitwise(expr, InlinedOp::BwAnd),
            ExprKind::BwOr => self.walk_bitwise(expr, InlinedOp::BwOr),
            ExprKind::BwXor => self.walk_bitwise(expr, InlinedOp::BwXor),
            ExprKind::BwXnor => self.walk_bitwise(expr, InlinedOp::BwXnor),

            ExprKind::Eq | ExprKind::Ne => self.walk_equality(expr, kind),
            ExprKind::Lt | ExprKind::Le | ExprKind::Gt | ExprKind::Ge => {
                self.walk_relational(expr, kind)
            }

            ExprKind::Ite => self.walk_ite(expr),

            ExprKind::Dot => {
                let nested = resolver::instance_context(
                    self.pool,
                    self.tm,
                    self.model,
                    self.cur_ctx(),
                    self.pool.lhs(expr),
                )?;
                self.ctx_stack.push(nested);
                self.walk(self.pool.rhs(expr))?;
                self.ctx_stack.pop();
                Ok(true)
            }

            ExprKind::Subscript => self.walk_subscript(expr),
            ExprKind::Cast => self.walk_cast(expr),

            ExprKind::Set => {
                self.walk(self.pool.lhs(expr))?;
                Ok(false)
            }

            ExprKind::Comma => self.walk_comma(expr),

            ExprKind::Params => {
                let body = preprocessor::expand_call(
                    self.pool,
                    self.tm,
                    self.model,
                    self.cur_ctx(),
                    expr,
                )?;
                self.walk(body)?;
                Ok(false)
            }

            // LTL operators must be rewritten by the checking algorithm
            // before the formula reaches the compiler
            ExprKind::F
            | ExprKind::G
            | ExprKind::X
            | ExprKind::U
            | ExprKind::R
            | ExprKind::Assign
            | ExprKind::Guard
            | ExprKind::Cond
            | ExprKind::TypeTag
            | ExprKind::Undef => Err(CompileError::UnsupportedOperator { expr }),
        }
    }

    // -- leaves --------------------------------------------------------------

    fn walk_leaf(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        if self.pool.is_true(expr) {
            self.add_stack.push(self.dd.one());
            self.type_stack.push(self.tm.find_boolean());
            return Ok(true);
        }
        if self.pool.is_false(expr) {
            self.add_stack.push(self.dd.zero());
            self.type_stack.push(self.tm.find_boolean());
            return Ok(true);
        }

        let ctx = self.cur_ctx();
        let time = self.cur_time();
        let resolver = Resolver::new(self.pool, self.tm, self.model);
        match resolver.resolve(ctx, expr)? {
            Resolved::Literal(lit) => {
                self.add_stack.push(self.dd.constant(lit.value as i64));
                self.type_stack.push(lit.ty);
                Ok(true)
            }

            // named constants carry their declared type: algebraic ones
            // expand to width bits, monolithic ones stay a single
            // value diagram
            Resolved::Constant(konst) => {
                let c = self.dd.constant(konst.value as i64);
                if self.tm.is_monolithic(konst.ty) || self.tm.is_int_const(konst.ty) {
                    self.add_stack.push(c);
                } else {
                    let bits = self.const_to_bits(
                        c,
                        self.tm.width(konst.ty),
                        self.tm.is_signed(konst.ty),
                        expr,
                    )?;
                    self.push_dv(&bits);
                }
                self.type_stack.push(konst.ty);
                Ok(true)
            }

            Resolved::Variable { fqn, var, .. } => {
                if self.tm.is_instance(var.ty) {
                    return Err(CompileError::UnexpectedInstance { expr });
                }
                let key_time = if var.frozen { FROZEN } else { time };
                let ty = var.ty;
                let input = var.input;
                let encoding =
                    self.enc
                        .find_or_make(self.dd, self.tm, TimedExpr::new(fqn, key_time), ty);
                if self.tm.is_monolithic(ty) {
                    self.add_stack.push(encoding.dds[0]);
                } else {
                    self.push_dv(&encoding.dds);
                }
                self.type_stack.push(ty);
                Ok(!input)
            }

            Resolved::Define { ctx: dctx, def } => {
                if !def.formals.is_empty() {
                    return Err(sybil_model::ModelError::Semantic(
                        sybil_model::SemanticError::DefineArity { expr },
                    )
                    .into());
                }
                let body = def.body;
                self.ctx_stack.push(dctx);
                self.walk(body)?;
                self.ctx_stack.pop();
                Ok(false)
            }

            Resolved::Parameter { fqn } => {
                let (rctx, actual) = self.model.rewrite_parameter(fqn).ok_or(
                    sybil_model::ModelError::Resolution(sybil_model::ResolutionError {
                        expr: fqn,
                    }),
                )?;
                self.ctx_stack.push(rctx);
                self.walk(actual)?;
                self.ctx_stack.pop();
                Ok(false)
            }
        }
    }

    // -- algebraic plumbing --------------------------------------------------

    /// Expands a constant diagram into `width` bit-constant diagrams,
    /// checking the value fits.
    fn const_to_bits(
        &self,
        konst: AddId,
        width: u32,
        signed: bool,
        site: ExprId,
    ) -> Result<Vec<AddId>, CompileError> {
        let v = self
            .dd
            .constant_value(konst)
            .expect("constant operand expected");
        let fits = if signed {
            let lo = -(1_i128 << (width - 1));
            let hi = 1_i128 << (width - 1);
            (v as i128) >= lo && (v as i128) < hi
        } else {
            (v as i128) >= -(1_i128 << (width.saturating_sub(1)))
                && (v as i128) < (1_i128 << width)
        };
        if !fits {
            return Err(CompileError::ConstantTooLarge { expr: site, width });
        }
        let uv = (v as i128) & ((1_i128 << width) - 1);
        Ok((0..width)
            .map(|i| {
                if (uv >> i) & 1 == 1 {
                    self.dd.one()
                } else {
                    self.dd.zero()
                }
            })
            .collect())
    }

    /// Pops an operand vector, expanding an integer-constant operand to
    /// `width` bits. Symbolic constants (determinized choices between
    /// constants) decompose bit by bit.
    fn pop_operand(
        &mut self,
        ty: TypeId,
        width: u32,
        signed: bool,
        site: ExprId,
    ) -> Result<Vec<AddId>, CompileError> {
        if self.tm.is_int_const(ty) {
            let c = self.add_stack.pop().expect("dd stack underflow");
            if self.dd.is_constant(c) {
                self.const_to_bits(c, width, signed, site)
            } else {
                Ok((0..width).map(|i| self.dd.bit(c, i)).collect())
            }
        } else {
            Ok(self.pop_dv(width))
        }
    }

    /// Joined width/signedness of a binary algebraic node, or `None`
    /// when both operands are bare constants.
    fn join_operands(
        &mut self,
        expr: ExprId,
        lt: TypeId,
        rt: TypeId,
    ) -> Result<Option<(u32, bool, TypeId)>, CompileError> {
        let lc = self.tm.is_int_const(lt);
        let rc = self.tm.is_int_const(rt);
        if lc && rc {
            return Ok(None);
        }
        if !self.tm.is_algebraic(lt) || !self.tm.is_algebraic(rt) {
            return Err(TypeError::BadType {
                expr,
                expected: "algebraic",
            }
            .into());
        }
        let ty = if lc { rt } else { lt };
        if !lc && !rc && lt != rt {
            return Err(TypeError::TypeMismatch { expr }.into());
        }
        Ok(Some((self.tm.width(ty), self.tm.is_signed(ty), ty)))
    }

    /// Ripple-carry addition with an initial carry: digit-wise in base
    /// 2, `res[i] = (x + y + c) mod 2`, `c' = 2 <= (x + y + c)`.
    fn ripple_add(&self, xs: &[AddId], ys: &[AddId], carry_in: AddId) -> Vec<AddId> {
        let base = self.dd.constant(2);
        let mut carry = carry_in;
        let mut out = Vec::with_capacity(xs.len());
        for (x, y) in xs.iter().zip(ys) {
            let tmp = self.dd.plus(self.dd.plus(*x, *y), carry);
            out.push(self.dd.modulus(tmp, base));
            carry = self.dd.leq(base, tmp);
        }
        out
    }

    fn twos_complement(&self, xs: &[AddId]) -> Vec<AddId> {
        let inverted: Vec<AddId> = xs.iter().map(|&x| self.dd.bw_cmpl(x)).collect();
        let zeros = vec![self.dd.zero(); xs.len()];
        self.ripple_add(&inverted, &zeros, self.dd.one())
    }

    fn walk_neg(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        let ty = *self.type_stack.last().unwrap();
        if self.tm.is_int_const(ty) {
            let c = self.add_stack.pop().unwrap();
            self.add_stack.push(self.dd.negate(c));
            return Ok(true);
        }
        if !self.tm.is_algebraic(ty) {
            return Err(TypeError::BadType {
                expr,
                expected: "algebraic",
            }
            .into());
        }
        let w = self.tm.width(ty);
        let xs = self.pop_dv(w);
        let res = self.twos_complement(&xs);
        self.push_dv(&res);
        Ok(true)
    }

    fn walk_bw_not(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        let ty = *self.type_stack.last().unwrap();
        if !self.tm.is_algebraic(ty) || self.tm.is_int_const(ty) {
            return Err(TypeError::BadType {
                expr,
                expected: "sized algebraic",
            }
            .into());
        }
        let w = self.tm.width(ty);
        let xs = self.pop_dv(w);
        let res: Vec<AddId> = xs.iter().map(|&x| self.dd.bw_cmpl(x)).collect();
        self.push_dv(&res);
        Ok(true)
    }

    fn walk_boolean_binary(
        &mut self,
        expr: ExprId,
        kind: ExprKind,
    ) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = self.pop_type();
        let lt = self.pop_type();
        if !self.tm.is_boolean(lt) || !self.tm.is_boolean(rt) {
            return Err(TypeError::BadType {
                expr,
                expected: "boolean",
            }
            .into());
        }
        let r = self.add_stack.pop().unwrap();
        let l = self.add_stack.pop().unwrap();
        let res = match kind {
            ExprKind::And => self.dd.times(l, r),
            ExprKind::Or => self.dd.or(l, r),
            ExprKind::Implies => self.dd.or(self.dd.cmpl(l), r),
            ExprKind::Iff => self.dd.xnor(l, r),
            _ => unreachable!(),
        };
        self.add_stack.push(res);
        self.type_stack.push(self.tm.find_boolean());
        Ok(true)
    }

    fn walk_additive(&mut self, expr: ExprId, kind: ExprKind) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = self.pop_type();
        let lt = self.pop_type();

        match self.join_operands(expr, lt, rt)? {
            None => {
                let y = self.add_stack.pop().unwrap();
                let x = self.add_stack.pop().unwrap();
                let res = match kind {
                    ExprKind::Add => self.dd.plus(x, y),
                    ExprKind::Sub => self.dd.minus(x, y),
                    _ => unreachable!(),
                };
                self.add_stack.push(res);
                self.type_stack.push(self.tm.find_int_const());
            }
            Some((w, signed, ty)) => {
                let ys = self.pop_operand(rt, w, signed, expr)?;
                let xs = self.pop_operand(lt, w, signed, expr)?;
                let res = match kind {
                    ExprKind::Add => self.ripple_add(&xs, &ys, self.dd.zero()),
                    // x - y as x + ~y + 1
                    ExprKind::Sub => {
                        let inv: Vec<AddId> =
                            ys.iter().map(|&y| self.dd.bw_cmpl(y)).collect();
                        self.ripple_add(&xs, &inv, self.dd.one())
                    }
                    _ => unreachable!(),
                };
                self.push_dv(&res);
                self.type_stack.push(ty);
            }
        }
        Ok(true)
    }

    /// Wide operators: fresh result bits plus a microcode descriptor.
    fn walk_inlined(&mut self, expr: ExprId, op: InlinedOp) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = self.pop_type();
        let lt = self.pop_type();

        match self.join_operands(expr, lt, rt)? {
            None => {
                let y = self.add_stack.pop().unwrap();
                let x = self.add_stack.pop().unwrap();
                let res = match op {
                    InlinedOp::Mul => self.dd.times(x, y),
                    InlinedOp::Div => self.dd.divide(x, y),
                    InlinedOp::Mod => self.dd.modulus(x, y),
                    InlinedOp::Shl => self.dd.lshift(x, y),
                    InlinedOp::Shr => self.dd.rshift(x, y),
                    _ => unreachable!("bitwise handled elsewhere"),
                };
                self.add_stack.push(res);
                self.type_stack.push(self.tm.find_int_const());
            }
            Some((w, signed, ty)) => {
                let ys = self.pop_operand(rt, w, signed, expr)?;
                let xs = self.pop_operand(lt, w, signed, expr)?;
                let (vars, res_dds) = self.make_auto_vec(w);
                self.inlined.push(InlinedOperatorDescriptor {
                    sig: OpSignature {
                        op,
                        width: w,
                        signed,
                    },
                    lhs: xs,
                    rhs: ys,
                    res: vars,
                });
                self.push_dv(&res_dds);
                self.type_stack.push(ty);
            }
        }
        Ok(true)
    }

    /// xor/xnor double as boolean connectives; the sized versions go
    /// through microcode like the rest of the bitwise family.
    fn walk_bitwise(&mut self, expr: ExprId, op: InlinedOp) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = *self.type_stack.last().unwrap();
        let lt = self.type_stack[self.type_stack.len() - 2];

        if self.tm.is_boolean(lt) && self.tm.is_boolean(rt) {
            self.pop_type();
            self.pop_type();
            let r = self.add_stack.pop().unwrap();
            let l = self.add_stack.pop().unwrap();
            let res = match op {
                InlinedOp::BwXor => self.dd.xor(l, r),
                InlinedOp::BwXnor => self.dd.xnor(l, r),
                _ => {
                    return Err(TypeError::BadType {
                        expr,
                        expected: "algebraic",
                    }
                    .into())
                }
            };
            self.add_stack.push(res);
            self.type_stack.push(self.tm.find_boolean());
            return Ok(true);
        }

        let rt = self.pop_type();
        let lt = self.pop_type();
        match self.join_operands(expr, lt, rt)? {
            None => {
                let y = self.add_stack.pop().unwrap();
                let x = self.add_stack.pop().unwrap();
                let res = match op {
                    InlinedOp::BwAnd => self.dd.bw_and(x, y),
                    InlinedOp::BwOr => self.dd.bw_or(x, y),
                    InlinedOp::BwXor => self.dd.bw_xor(x, y),
                    InlinedOp::BwXnor => self.dd.bw_xnor(x, y),
                    _ => unreachable!(),
                };
                self.add_stack.push(res);
                self.type_stack.push(self.tm.find_int_const());
            }
            Some((w, signed, ty)) => {
                let ys = self.pop_operand(rt, w, signed, expr)?;
                let xs = self.pop_operand(lt, w, signed, expr)?;
                let (vars, res_dds) = self.make_auto_vec(w);
                self.inlined.push(InlinedOperatorDescriptor {
                    sig: OpSignature {
                        op,
                        width: w,
                        signed,
                    },
                    lhs: xs,
                    rhs: ys,
                    res: vars,
                });
                self.push_dv(&res_dds);
                self.type_stack.push(ty);
            }
        }
        Ok(true)
    }

    /// Bitwise equality chain: conjunction of per-bit agreements.
    fn bits_equal(&self, xs: &[AddId], ys: &[AddId]) -> AddId {
        let mut res = self.dd.one();
        for (x, y) in xs.iter().zip(ys) {
            res = self.dd.times(res, self.dd.equals(*x, *y));
        }
        res
    }

    /// MSB-first comparison chain. The sign digit carries the weight
    /// `-2^(w-1)`: a set sign bit compares below a clear one.
    fn bits_lt(&self, xs: &[AddId], ys: &[AddId], signed: bool) -> AddId {
        let w = xs.len();
        let mut res = self.dd.zero();
        let mut prefix = self.dd.one();
        for i in (0..w).rev() {
            let digit_lt = if signed && i == w - 1 {
                // negative < non-negative
                self.dd.times(xs[i], self.dd.cmpl(ys[i]))
            } else {
                self.dd.times(self.dd.cmpl(xs[i]), ys[i])
            };
            res = self.dd.or(res, self.dd.times(prefix, digit_lt));
            prefix = self.dd.times(prefix, self.dd.equals(xs[i], ys[i]));
        }
        res
    }

    fn walk_equality(&mut self, expr: ExprId, kind: ExprKind) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = self.pop_type();
        let lt = self.pop_type();

        let eq = if self.tm.is_boolean(lt) && self.tm.is_boolean(rt) {
            let r = self.add_stack.pop().unwrap();
            let l = self.add_stack.pop().unwrap();
            self.dd.xnor(l, r)
        } else if self.tm.is_enum(lt) && lt == rt {
            let r = self.add_stack.pop().unwrap();
            let l = self.add_stack.pop().unwrap();
            self.dd.equals(l, r)
        } else {
            match self.join_operands(expr, lt, rt)? {
                None => {
                    let y = self.add_stack.pop().unwrap();
                    let x = self.add_stack.pop().unwrap();
                    self.dd.equals(x, y)
                }
                Some((w, signed, _)) => {
                    let ys = self.pop_operand(rt, w, signed, expr)?;
                    let xs = self.pop_operand(lt, w, signed, expr)?;
                    self.bits_equal(&xs, &ys)
                }
            }
        };

        let res = if kind == ExprKind::Eq {
            eq
        } else {
            self.dd.cmpl(eq)
        };
        self.add_stack.push(res);
        self.type_stack.push(self.tm.find_boolean());
        Ok(true)
    }

    fn walk_relational(&mut self, expr: ExprId, kind: ExprKind) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let rt = self.pop_type();
        let lt = self.pop_type();

        let res = match self.join_operands(expr, lt, rt)? {
            None => {
                let y = self.add_stack.pop().unwrap();
                let x = self.add_stack.pop().unwrap();
                match kind {
                    ExprKind::Lt => self.dd.lt(x, y),
                    ExprKind::Le => self.dd.leq(x, y),
                    ExprKind::Gt => self.dd.lt(y, x),
                    ExprKind::Ge => self.dd.leq(y, x),
                    _ => unreachable!(),
                }
            }
            Some((w, signed, _)) => {
                let ys = self.pop_operand(rt, w, signed, expr)?;
                let xs = self.pop_operand(lt, w, signed, expr)?;
                match kind {
                    ExprKind::Lt => self.bits_lt(&xs, &ys, signed),
                    ExprKind::Le => self.dd.cmpl(self.bits_lt(&ys, &xs, signed)),
                    ExprKind::Gt => self.bits_lt(&ys, &xs, signed),
                    ExprKind::Ge => self.dd.cmpl(self.bits_lt(&xs, &ys, signed)),
                    _ => unreachable!(),
                }
            }
        };
        self.add_stack.push(res);
        self.type_stack.push(self.tm.find_boolean());
        Ok(true)
    }

    /// A selection toplevel consumes its whole right spine: the nested
    /// else-branch cascade `c1 ? v1 : (c2 ? v2 : ... : E)` compiles as
    /// one multi-way choice. Monolithic chains fold into nested diagram
    /// selections; algebraic chains emit a single fused descriptor with
    /// one shared result vector.
    fn walk_ite(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        // collect the chain, outermost condition first
        let mut levels = Vec::new();
        let mut cur = expr;
        while self.pool.kind(cur) == ExprKind::Ite {
            let cond_node = self.pool.lhs(cur);
            debug_assert_eq!(self.pool.kind(cond_node), ExprKind::Cond);
            levels.push((self.pool.lhs(cond_node), self.pool.rhs(cond_node)));
            cur = self.pool.rhs(cur);
        }
        let else_expr = cur;

        for &(c, t) in &levels {
            self.walk(c)?;
            self.walk(t)?;
        }
        self.walk(else_expr)?;

        // the type stacks are independent, so settle the result type
        // before touching the diagram stack
        let else_ty = self.pop_type();
        let mut res_ty = else_ty;
        let mut branch_types = Vec::with_capacity(levels.len());
        for _ in 0..levels.len() {
            let tt = self.pop_type();
            let ct = self.pop_type();
            if !self.tm.is_boolean(ct) {
                return Err(TypeError::BadType {
                    expr,
                    expected: "boolean condition",
                }
                .into());
            }
            branch_types.push(tt);
            res_ty = self.tm.ite_type(expr, tt, res_ty)?;
        }

        if self.tm.is_monolithic(res_ty) || self.tm.is_int_const(res_ty) {
            let mut value = self.add_stack.pop().unwrap();
            for _ in 0..levels.len() {
                let t_dd = self.add_stack.pop().unwrap();
                let c_dd = self.add_stack.pop().unwrap();
                value = self.dd.ite(c_dd, t_dd, value);
            }
            self.add_stack.push(value);
            self.type_stack.push(res_ty);
            return Ok(true);
        }

        let w = self.tm.width(res_ty);
        let signed = self.tm.is_signed(res_ty);

        let else_bits = self.pop_operand(else_ty, w, signed, expr)?;
        // branch types were collected in pop order, innermost first
        let mut branches = Vec::with_capacity(levels.len());
        for &tt in &branch_types {
            let then_bits = self.pop_operand(tt, w, signed, expr)?;
            let cond = self.add_stack.pop().unwrap();
            let (cond_vars, _) = self.make_auto_vec(1);
            branches.push(SelectionBranch {
                cond,
                cond_bit: cond_vars[0],
                then_bits,
            });
        }
        branches.reverse(); // descriptor arms go outermost first

        let (vars, res_dds) = self.make_auto_vec(w);
        self.selections.push(BinarySelectionDescriptor {
            branches,
            else_bits,
            res: vars,
        });
        self.push_dv(&res_dds);
        self.type_stack.push(res_ty);
        Ok(true)
    }

    fn walk_subscript(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        let it = self.pop_type();
        let at = self.pop_type();

        let (elem_ty, nelems) = match self.tm.desc(at) {
            sybil_type::TypeDesc::Array { elem, nelems } => (elem, nelems),
            _ => {
                return Err(TypeError::BadType {
                    expr,
                    expected: "array",
                }
                .into())
            }
        };
        let ew = self.tm.width(elem_ty);
        let enum_elem = self.tm.is_enum(elem_ty);
        let boolean_elem = self.tm.is_boolean(elem_ty);

        if self.tm.is_int_const(it) {
            let v = self
                .dd
                .constant_value(self.add_stack.pop().unwrap())
                .expect("constant index");
            let array = self.pop_dv(nelems * ew);
            if v >= 0 && (v as u32) < nelems {
                let base = v as usize * ew as usize;
                let slice = array[base..base + ew as usize].to_vec();
                // enum elements surface as their single coded diagram
                if enum_elem {
                    let coded = self.coded_value(&slice);
                    self.add_stack.push(coded);
                } else if boolean_elem {
                    self.add_stack.push(slice[0]);
                } else {
                    self.push_dv(&slice);
                }
            } else {
                // out of bounds: the distinguished error constant
                if enum_elem || boolean_elem {
                    self.add_stack.push(self.dd.error());
                } else {
                    let errs = vec![self.dd.error(); ew as usize];
                    self.push_dv(&errs);
                }
            }
            self.type_stack.push(elem_ty);
            return Ok(true);
        }

        if !self.tm.is_algebraic(it) {
            return Err(TypeError::BadType {
                expr,
                expected: "algebraic index",
            }
            .into());
        }
        let iw = self.tm.width(it);
        let index_bits = self.pop_dv(iw);
        let array_bits = self.pop_dv(nelems * ew);
        let (vars, res_dds) = self.make_auto_vec(ew);
        self.multiway.push(MultiwaySelectionDescriptor {
            elem_width: ew,
            nelems,
            index_bits,
            array_bits,
            res: vars,
        });
        if enum_elem {
            let coded = self.coded_value(&res_dds);
            self.add_stack.push(coded);
        } else if boolean_elem {
            self.add_stack.push(res_dds[0]);
        } else {
            self.push_dv(&res_dds);
        }
        self.type_stack.push(elem_ty);
        Ok(true)
    }

    /// The bit-weighted integer diagram of a little-endian bit vector.
    fn coded_value(&self, bits: &[AddId]) -> AddId {
        let mut coded = self.dd.constant(0);
        for (i, &b) in bits.iter().enumerate() {
            let weight = self.dd.constant(1_i64 << i);
            coded = self.dd.plus(coded, self.dd.times(b, weight));
        }
        coded
    }

    fn walk_cast(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        self.walk(self.pool.rhs(expr))?;
        let src = self.pop_type();
        let tag = self.pool.lhs(expr);

        match self.pool.node(tag).data {
            sybil_expr::ExprData::Atom(_) => {
                // bool(e)
                if self.tm.is_boolean(src) {
                    self.type_stack.push(src);
                    return Ok(true);
                }
                if self.tm.is_int_const(src) {
                    let c = self.add_stack.pop().unwrap();
                    let res = self.dd.cmpl(self.dd.equals(c, self.dd.zero()));
                    self.add_stack.push(res);
                    self.type_stack.push(self.tm.find_boolean());
                    return Ok(true);
                }
                if self.tm.is_algebraic(src) {
                    let w = self.tm.width(src);
                    let xs = self.pop_dv(w);
                    let mut any = self.dd.zero();
                    for x in xs {
                        any = self.dd.or(any, x);
                    }
                    self.add_stack.push(any);
                    self.type_stack.push(self.tm.find_boolean());
                    return Ok(true);
                }
                Err(TypeError::BadType {
                    expr,
                    expected: "boolean or algebraic",
                }
                .into())
            }
            sybil_expr::ExprData::Value(w) => {
                let w = w as u32;
                if self.tm.is_boolean(src) {
                    let b = self.add_stack.pop().unwrap();
                    let mut bits = vec![self.dd.zero(); w as usize];
                    bits[0] = b;
                    self.push_dv(&bits);
                    self.type_stack.push(self.tm.find_unsigned(w));
                    return Ok(true);
                }
                if self.tm.is_int_const(src) {
                    let c = self.add_stack.pop().unwrap();
                    let bits = self.const_to_bits(c, w, false, expr)?;
                    self.push_dv(&bits);
                    self.type_stack.push(self.tm.find_unsigned(w));
                    return Ok(true);
                }
                if self.tm.is_algebraic(src) {
                    let w0 = self.tm.width(src);
                    let signed = self.tm.is_signed(src);
                    let xs = self.pop_dv(w0);
                    let mut bits = Vec::with_capacity(w as usize);
                    for i in 0..w as usize {
                        if i < w0 as usize {
                            bits.push(xs[i]);
                        } else if signed {
                            bits.push(xs[w0 as usize - 1]);
                        } else {
                            bits.push(self.dd.zero());
                        }
                    }
                    self.push_dv(&bits);
                    let res_ty = if signed {
                        self.tm.find_signed(w)
                    } else {
                        self.tm.find_unsigned(w)
                    };
                    self.type_stack.push(res_ty);
                    return Ok(true);
                }
                Err(TypeError::BadType {
                    expr,
                    expected: "boolean or algebraic",
                }
                .into())
            }
            _ => Err(TypeError::BadType {
                expr,
                expected: "a cast target",
            }
            .into()),
        }
    }

    /// Non-deterministic choice: a fresh determinization bit selects
    /// between the alternatives, as if the user had written
    /// `det ? lhs : rhs`.
    fn walk_comma(&mut self, expr: ExprId) -> Result<bool, CompileError> {
        self.walk(self.pool.lhs(expr))?;
        self.walk(self.pool.rhs(expr))?;
        self.nondet_events += 1;

        let rt = self.pop_type();
        let lt = self.pop_type();
        let res_ty = self.tm.ite_type(expr, lt, rt)?;

        let (det_vars, det_dds) = self.make_auto_vec(1);
        let det = det_dds[0];

        if self.tm.is_monolithic(res_ty) || self.tm.is_int_const(res_ty) {
            let r = self.add_stack.pop().unwrap();
            let l = self.add_stack.pop().unwrap();
            self.add_stack.push(self.dd.ite(det, l, r));
            self.type_stack.push(res_ty);
            return Ok(false);
        }

        let w = self.tm.width(res_ty);
        let signed = self.tm.is_signed(res_ty);
        let else_bits = self.pop_operand(rt, w, signed, expr)?;
        let then_bits = self.pop_operand(lt, w, signed, expr)?;
        let (vars, res_dds) = self.make_auto_vec(w);
        self.selections.push(BinarySelectionDescriptor {
            branches: vec![SelectionBranch {
                cond: det,
                cond_bit: det_vars[0],
                then_bits,
            }],
            else_bits,
            res: vars,
        });
        self.push_dv(&res_dds);
        self.type_stack.push(res_ty);
        Ok(false)
    }
}
