//! Recursive-descent parser for the sybil modelling language.
//!
//! The parser consumes the token stream and builds the model directly:
//! modules, typed variable declarations, defines and the three FSM
//! sections. Expressions come out as pooled DAG nodes with `Dot` chains
//! already left-associated.
//!
//! ```text
//! MODULE main
//! VAR x : unsigned int(2);
//! INIT x = 0;
//! TRANS next(x) = x + 1;
//! ```

use sybil_base::{Span, SpannedError};
use sybil_expr::{decimal_to_fixed, ExprId, ExprPool};
use sybil_model::{Constant, Define, Model, Module, Parameter, Variable};
use sybil_type::TypeId;

use crate::context::Context;
use crate::lexer::{Lexer, Token, TokenKind};

/// Binary digits kept for fixed-point decimal constants.
const FIXED_PRECISION: u32 = 16;

/// Parses a complete model source.
pub fn parse_model(ctx: &Context, src: &str) -> Result<Model, SpannedError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(ctx, tokens);
    parser.model()
}

/// Parses a standalone expression (properties, halt conditions).
pub fn parse_expression(ctx: &Context, src: &str) -> Result<ExprId, SpannedError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(ctx, tokens);
    let expr = parser.expression()?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser<'a> {
    ctx: &'a Context,
    tokens: Vec<Token>,
    pos: usize,
}

enum Section {
    Var,
    IVar,
    FrozenVar,
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a Context, tokens: Vec<Token>) -> Self {
        Parser {
            ctx,
            tokens,
            pos: 0,
        }
    }

    fn pool(&self) -> &ExprPool {
        &self.ctx.pool
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if *self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SpannedError> {
        if *self.peek() == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("{:?}", kind)))
        }
    }

    fn unexpected(&self, expected: &str) -> SpannedError {
        SpannedError::new(
            format!("expected {}, found {:?}", expected, self.peek()),
            self.span(),
        )
    }

    fn ident(&mut self) -> Result<(ExprId, Span), SpannedError> {
        let span = self.span();
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok((self.pool().make_ident(&name), span))
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    // -- model structure -----------------------------------------------------

    fn model(&mut self) -> Result<Model, SpannedError> {
        let mut model = Model::new();
        while *self.peek() != TokenKind::Eof {
            self.module(&mut model)?;
        }
        if model.modules().is_empty() {
            return Err(SpannedError::new("empty model", self.span()));
        }
        Ok(model)
    }

    fn module(&mut self, model: &mut Model) -> Result<(), SpannedError> {
        self.expect(TokenKind::Module)?;
        let span = self.span();
        let (name_expr, _) = self.ident()?;
        let name = self.pool().atom(name_expr);
        let mut module = Module::new(name);

        if self.eat(TokenKind::LParen) {
            if *self.peek() != TokenKind::RParen {
                loop {
                    let (param, pspan) = self.ident()?;
                    module
                        .add_parameter(Parameter {
                            module: name,
                            name: param,
                        })
                        .map_err(|e| SpannedError::new(e.to_string(), pspan))?;
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        loop {
            match self.peek() {
                TokenKind::Var => {
                    self.bump();
                    self.var_decls(model, &mut module, Section::Var)?;
                }
                TokenKind::IVar => {
                    self.bump();
                    self.var_decls(model, &mut module, Section::IVar)?;
                }
                TokenKind::FrozenVar => {
                    self.bump();
                    self.var_decls(model, &mut module, Section::FrozenVar)?;
                }
                TokenKind::Constant => {
                    self.bump();
                    self.constant_decls(model, &mut module)?;
                }
                TokenKind::Define => {
                    self.bump();
                    self.define_decls(&mut module)?;
                }
                TokenKind::Init => {
                    self.bump();
                    let body = self.expression()?;
                    self.expect(TokenKind::Semicolon)?;
                    module.add_init(body);
                }
                TokenKind::Invar => {
                    self.bump();
                    let body = self.expression()?;
                    self.expect(TokenKind::Semicolon)?;
                    module.add_invar(body);
                }
                TokenKind::Trans => {
                    self.bump();
                    let body = self.trans_statement()?;
                    self.expect(TokenKind::Semicolon)?;
                    module.add_trans(body);
                }
                _ => break,
            }
        }

        model
            .add_module(module)
            .map_err(|e| SpannedError::new(e.to_string(), span))?;
        Ok(())
    }

    fn at_declaration_start(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(_) | TokenKind::Inertial)
    }

    fn var_decls(
        &mut self,
        model: &mut Model,
        module: &mut Module,
        section: Section,
    ) -> Result<(), SpannedError> {
        while self.at_declaration_start() {
            let inertial = self.eat(TokenKind::Inertial);
            let (name, span) = self.ident()?;
            self.expect(TokenKind::Colon)?;
            let (ty, actuals) = self.type_decl(model, name)?;
            self.expect(TokenKind::Semicolon)?;

            let mut var = Variable::new(module.name(), name, ty);
            var.inertial = inertial;
            match section {
                Section::Var => {}
                Section::IVar => var.input = true,
                Section::FrozenVar => var.frozen = true,
            }
            var.actuals = actuals;
            module
                .add_var(var)
                .map_err(|e| SpannedError::new(e.to_string(), span))?;
        }
        Ok(())
    }

    /// A type position: scalar types, enum literal sets, arrays and
    /// module instances. Returns instance actuals alongside.
    fn type_decl(
        &mut self,
        model: &mut Model,
        declared: ExprId,
    ) -> Result<(TypeId, Vec<ExprId>), SpannedError> {
        let tm = &self.ctx.tm;
        let span = self.span();

        let base: TypeId = match self.peek().clone() {
            TokenKind::Boolean => {
                self.bump();
                tm.find_boolean()
            }
            TokenKind::Unsigned | TokenKind::Signed => {
                let signed = *self.peek() == TokenKind::Signed;
                self.bump();
                self.expect(TokenKind::Int)?;
                self.expect(TokenKind::LParen)?;
                let width = self.number()?;
                self.expect(TokenKind::RParen)?;
                if width == 0 || width > 63 {
                    return Err(SpannedError::new(
                        format!("unsupported width {}", width),
                        span,
                    ));
                }
                if signed {
                    tm.find_signed(width as u32)
                } else {
                    tm.find_unsigned(width as u32)
                }
            }
            TokenKind::LBrace => {
                self.bump();
                let mut literals = Vec::new();
                loop {
                    let lspan = self.span();
                    let (lit, _) = self.ident()?;
                    let atom = self.pool().atom(lit);
                    if literals.contains(&atom) {
                        return Err(SpannedError::new("duplicate literal", lspan));
                    }
                    literals.push(atom);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                let ty = tm.find_enum(literals);
                model
                    .register_literals(tm, ty, declared)
                    .map_err(|e| SpannedError::new(e.to_string(), span))?;
                ty
            }
            TokenKind::Ident(module_name) => {
                self.bump();
                let atom = self.pool().atoms().intern(&module_name);
                let mut actuals = Vec::new();
                if self.eat(TokenKind::LParen) {
                    if *self.peek() != TokenKind::RParen {
                        loop {
                            actuals.push(self.expression()?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                }
                return Ok((tm.find_instance(atom), actuals));
            }
            _ => return Err(self.unexpected("a type")),
        };

        // optional array suffix on scalar types
        if self.eat(TokenKind::LBracket) {
            let nelems = self.number()?;
            self.expect(TokenKind::RBracket)?;
            if nelems == 0 {
                return Err(SpannedError::new("empty array type", span));
            }
            return Ok((tm.find_array(base, nelems as u32), Vec::new()));
        }
        Ok((base, Vec::new()))
    }

    /// `CONSTANT` declarations: `name : type := value;` with a scalar
    /// type and a (possibly negated) numeric value.
    fn constant_decls(
        &mut self,
        model: &mut Model,
        module: &mut Module,
    ) -> Result<(), SpannedError> {
        let tm = &self.ctx.tm;
        while matches!(self.peek(), TokenKind::Ident(_)) {
            let (name, span) = self.ident()?;
            self.expect(TokenKind::Colon)?;
            let (ty, actuals) = self.type_decl(model, name)?;
            if !actuals.is_empty() || tm.is_instance(ty) || tm.is_array(ty) {
                return Err(SpannedError::new("constants must be scalar", span));
            }
            self.expect(TokenKind::Assign)?;
            let negated = self.eat(TokenKind::Minus);
            let magnitude = self.number()?;
            self.expect(TokenKind::Semicolon)?;

            if negated && !tm.is_signed(ty) {
                return Err(SpannedError::new(
                    "negative value for an unsigned constant",
                    span,
                ));
            }
            let value = if negated {
                (magnitude as i64).wrapping_neg() as u64
            } else {
                magnitude
            };
            module
                .add_constant(Constant {
                    module: module.name(),
                    name,
                    ty,
                    value,
                })
                .map_err(|e| SpannedError::new(e.to_string(), span))?;
        }
        Ok(())
    }

    fn define_decls(&mut self, module: &mut Module) -> Result<(), SpannedError> {
        while matches!(self.peek(), TokenKind::Ident(_)) {
            let (name, span) = self.ident()?;
            let mut formals = Vec::new();
            if self.eat(TokenKind::LParen) {
                if *self.peek() != TokenKind::RParen {
                    loop {
                        formals.push(self.ident()?.0);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            self.expect(TokenKind::Assign)?;
            let body = self.expression()?;
            self.expect(TokenKind::Semicolon)?;
            module
                .add_define(Define {
                    module: module.name(),
                    name,
                    body,
                    formals,
                })
                .map_err(|e| SpannedError::new(e.to_string(), span))?;
        }
        Ok(())
    }

    fn number(&mut self) -> Result<u64, SpannedError> {
        match self.peek().clone() {
            TokenKind::Number(v, _) => {
                self.bump();
                Ok(v)
            }
            _ => Err(self.unexpected("a number")),
        }
    }

    /// TRANS bodies: plain expressions, assignments and guarded
    /// assignments.
    fn trans_statement(&mut self) -> Result<ExprId, SpannedError> {
        let first = self.expression()?;
        if self.eat(TokenKind::GuardsTo) {
            let target = self.expression()?;
            self.expect(TokenKind::Assign)?;
            let value = self.expression()?;
            let action = self.pool().make_assign(target, value);
            return Ok(self.pool().make_guard(first, action));
        }
        if self.eat(TokenKind::Assign) {
            let value = self.expression()?;
            return Ok(self.pool().make_assign(first, value));
        }
        Ok(first)
    }

    // -- expressions, loosest binding first ----------------------------------

    pub(crate) fn expression(&mut self) -> Result<ExprId, SpannedError> {
        self.ite()
    }

    fn ite(&mut self) -> Result<ExprId, SpannedError> {
        let cond = self.iff()?;
        if self.eat(TokenKind::Question) {
            let then = self.ite()?;
            self.expect(TokenKind::Colon)?;
            let else_ = self.ite()?;
            return Ok(self.pool().make_ite(cond, then, else_));
        }
        Ok(cond)
    }

    fn iff(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.implies()?;
        while self.eat(TokenKind::DArrow) {
            let rhs = self.implies()?;
            lhs = self.pool().make_iff(lhs, rhs);
        }
        Ok(lhs)
    }

    fn implies(&mut self) -> Result<ExprId, SpannedError> {
        let lhs = self.until()?;
        if self.eat(TokenKind::Arrow) {
            let rhs = self.implies()?; // right associative
            return Ok(self.pool().make_implies(lhs, rhs));
        }
        Ok(lhs)
    }

    fn until(&mut self) -> Result<ExprId, SpannedError> {
        let lhs = self.logical_or()?;
        match self.peek() {
            TokenKind::TemporalU => {
                self.bump();
                let rhs = self.until()?;
                Ok(self.pool().make_u(lhs, rhs))
            }
            TokenKind::TemporalR => {
                self.bump();
                let rhs = self.until()?;
                Ok(self.pool().make_r(lhs, rhs))
            }
            _ => Ok(lhs),
        }
    }

    fn logical_or(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.logical_and()?;
        while self.eat(TokenKind::PipePipe) {
            let rhs = self.logical_and()?;
            lhs = self.pool().make_or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.bitwise_or()?;
        while self.eat(TokenKind::AmpAmp) {
            let rhs = self.bitwise_or()?;
            lhs = self.pool().make_and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn bitwise_or(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.bitwise_xor()?;
        while self.eat(TokenKind::Pipe) {
            let rhs = self.bitwise_xor()?;
            lhs = self.pool().make_bw_or(lhs, rhs);
        }
        Ok(lhs)
    }

    fn bitwise_xor(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.bitwise_and()?;
        loop {
            if self.eat(TokenKind::Caret) || self.eat(TokenKind::Xor) {
                let rhs = self.bitwise_and()?;
                lhs = self.pool().make_bw_xor(lhs, rhs);
            } else if self.eat(TokenKind::Xnor) {
                let rhs = self.bitwise_and()?;
                lhs = self.pool().make_bw_xnor(lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn bitwise_and(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.equality()?;
        while self.eat(TokenKind::Amp) {
            let rhs = self.equality()?;
            lhs = self.pool().make_bw_and(lhs, rhs);
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.relational()?;
        loop {
            if self.eat(TokenKind::Equal) {
                let rhs = self.relational()?;
                lhs = self.pool().make_eq(lhs, rhs);
            } else if self.eat(TokenKind::NotEqual) {
                let rhs = self.relational()?;
                lhs = self.pool().make_ne(lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn relational(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.shift()?;
        loop {
            let make = match self.peek() {
                TokenKind::Less => ExprPool::make_lt,
                TokenKind::LessEqual => ExprPool::make_le,
                TokenKind::Greater => ExprPool::make_gt,
                TokenKind::GreaterEqual => ExprPool::make_ge,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.shift()?;
            lhs = make(self.pool(), lhs, rhs);
        }
    }

    fn shift(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.additive()?;
        loop {
            if self.eat(TokenKind::LShift) {
                let rhs = self.additive()?;
                lhs = self.pool().make_lshift(lhs, rhs);
            } else if self.eat(TokenKind::RShift) {
                let rhs = self.additive()?;
                lhs = self.pool().make_rshift(lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn additive(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.multiplicative()?;
        loop {
            if self.eat(TokenKind::Plus) {
                let rhs = self.multiplicative()?;
                lhs = self.pool().make_add(lhs, rhs);
            } else if self.eat(TokenKind::Minus) {
                let rhs = self.multiplicative()?;
                lhs = self.pool().make_sub(lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<ExprId, SpannedError> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(TokenKind::Star) {
                let rhs = self.unary()?;
                lhs = self.pool().make_mul(lhs, rhs);
            } else if self.eat(TokenKind::Slash) {
                let rhs = self.unary()?;
                lhs = self.pool().make_div(lhs, rhs);
            } else if self.eat(TokenKind::Mod) {
                let rhs = self.unary()?;
                lhs = self.pool().make_mod(lhs, rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn unary(&mut self) -> Result<ExprId, SpannedError> {
        match self.peek() {
            TokenKind::Bang => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_not(operand))
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_neg(operand))
            }
            TokenKind::Tilde => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_bw_not(operand))
            }
            TokenKind::TemporalF => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_f(operand))
            }
            TokenKind::TemporalG => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_g(operand))
            }
            TokenKind::TemporalX => {
                self.bump();
                let operand = self.unary()?;
                Ok(self.pool().make_x(operand))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<ExprId, SpannedError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                expr = self.pool().make_subscript(expr, index);
            } else if self.eat(TokenKind::Dot) {
                let (field, _) = self.ident()?;
                expr = self.pool().make_dot(expr, field);
            } else if self.eat(TokenKind::LParen) {
                let args = self.comma_chain(TokenKind::RParen)?;
                self.expect(TokenKind::RParen)?;
                expr = self.pool().make_params(expr, args);
            } else {
                // canonical qualified-name shape
                return Ok(self.pool().left_associate_dot(expr));
            }
        }
    }

    /// A right-nested comma chain, e.g. define call arguments and set
    /// literal elements.
    fn comma_chain(&mut self, terminator: TokenKind) -> Result<ExprId, SpannedError> {
        if *self.peek() == terminator {
            return Err(self.unexpected("an expression"));
        }
        let mut items = vec![self.expression()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.expression()?);
        }
        let mut chain = items.pop().expect("nonempty");
        while let Some(item) = items.pop() {
            chain = self.pool().make_comma(item, chain);
        }
        Ok(chain)
    }

    fn primary(&mut self) -> Result<ExprId, SpannedError> {
        match self.peek().clone() {
            TokenKind::Number(v, radix) => {
                self.bump();
                Ok(match radix {
                    16 => self.pool().make_hconst(v),
                    8 => self.pool().make_oconst(v),
                    _ => self.pool().make_iconst(v),
                })
            }
            TokenKind::Fixed(text) => {
                self.bump();
                let value = decimal_to_fixed(&text, FIXED_PRECISION);
                Ok(self.pool().make_fconst(value))
            }
            TokenKind::Ident(_) => Ok(self.ident()?.0),
            TokenKind::Next => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let operand = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.pool().make_next(operand))
            }
            TokenKind::Bool => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let operand = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let tag = self.pool().make_boolean_tag();
                Ok(self.pool().make_cast(tag, operand))
            }
            TokenKind::Resize => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let operand = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let width = self.number()?;
                self.expect(TokenKind::RParen)?;
                let tag = self.pool().make_width_tag(width);
                Ok(self.pool().make_cast(tag, operand))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBrace => {
                self.bump();
                let chain = self.comma_chain(TokenKind::RBrace)?;
                self.expect(TokenKind::RBrace)?;
                Ok(self.pool().make_set(chain))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sybil_expr::ExprKind;

    fn ctx() -> Context {
        Context::new()
    }

    #[test]
    fn parses_the_counter_model() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR x : unsigned int(2);
            INIT x = 0;
            TRANS next(x) = x + 1;
        ";
        let model = parse_model(&ctx, src).unwrap();
        let main = ctx.pool.atoms().lookup("main").unwrap();
        let module = model.module(main).unwrap();
        assert_eq!(module.vars().len(), 1);
        assert_eq!(module.init().len(), 1);
        assert_eq!(module.trans().len(), 1);

        let x = ctx.pool.make_ident("x");
        let expected = ctx.pool.make_eq(
            ctx.pool.make_next(x),
            ctx.pool.make_add(x, ctx.pool.make_iconst(1)),
        );
        assert_eq!(module.trans()[0], expected);
    }

    #[test]
    fn parses_sections_and_flags() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR inertial c : unsigned int(4);
            IVAR i : boolean;
            FROZENVAR f : signed int(4);
        ";
        let model = parse_model(&ctx, src).unwrap();
        let main = ctx.pool.atoms().lookup("main").unwrap();
        let module = model.module(main).unwrap();
        let vars = module.vars();
        assert!(vars[0].inertial && !vars[0].input);
        assert!(vars[1].input);
        assert!(vars[2].frozen);
    }

    #[test]
    fn parses_enums_and_registers_literals() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR e : { A, B, C };
        ";
        let model = parse_model(&ctx, src).unwrap();
        let a = ctx.pool.atoms().lookup("A").unwrap();
        assert!(model.literal(a).is_some());
    }

    #[test]
    fn parses_arrays_and_instances() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR a : unsigned int(4)[3];
                m1 : M(x);
                x : unsigned int(2);
            MODULE M(p)
            DEFINE out := p + 1;
        ";
        let model = parse_model(&ctx, src).unwrap();
        let main = ctx.pool.atoms().lookup("main").unwrap();
        let module = model.module(main).unwrap();
        assert!(ctx.tm.is_array(module.vars()[0].ty));
        assert!(ctx.tm.is_instance(module.vars()[1].ty));
        assert_eq!(module.vars()[1].actuals.len(), 1);
    }

    #[test]
    fn parses_constant_declarations() {
        let ctx = ctx();
        let src = "
            MODULE main
            CONSTANT
                limit : unsigned int(2) := 3;
                floor : signed int(4) := -8;
            VAR x : unsigned int(2);
            INVAR x <= limit;
        ";
        let model = parse_model(&ctx, src).unwrap();
        let main = ctx.pool.atoms().lookup("main").unwrap();
        let module = model.module(main).unwrap();
        assert_eq!(module.constants().len(), 2);

        let limit = module.constant(ctx.pool.make_ident("limit")).unwrap();
        assert_eq!(limit.value, 3);
        assert_eq!(limit.ty, ctx.tm.find_unsigned(2));

        let floor = module.constant(ctx.pool.make_ident("floor")).unwrap();
        assert_eq!(floor.value as i64, -8);
        assert_eq!(floor.ty, ctx.tm.find_signed(4));
    }

    #[test]
    fn constants_must_be_scalar_and_in_range() {
        let ctx = ctx();
        assert!(parse_model(
            &ctx,
            "MODULE main CONSTANT a : unsigned int(2)[3] := 1;"
        )
        .is_err());
        assert!(parse_model(
            &ctx,
            "MODULE main CONSTANT u : unsigned int(2) := -1;"
        )
        .is_err());
    }

    #[test]
    fn parses_guarded_assignments() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR b : boolean;
                inertial c : unsigned int(4);
            TRANS b ?-> c := c + 1;
        ";
        let model = parse_model(&ctx, src).unwrap();
        let main = ctx.pool.atoms().lookup("main").unwrap();
        let module = model.module(main).unwrap();
        assert_eq!(ctx.pool.kind(module.trans()[0]), ExprKind::Guard);
    }

    #[test]
    fn operator_precedence_is_c_like() {
        let ctx = ctx();
        // bitwise binds tighter than logical
        let e = parse_expression(&ctx, "a && b | c").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::And);
        assert_eq!(ctx.pool.kind(ctx.pool.rhs(e)), ExprKind::BwOr);

        let e = parse_expression(&ctx, "x + 1 < y * 2").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::Lt);

        // implication is right associative
        let e = parse_expression(&ctx, "a -> b -> c").unwrap();
        assert_eq!(ctx.pool.kind(ctx.pool.rhs(e)), ExprKind::Implies);
    }

    #[test]
    fn dot_chains_come_out_left_associated() {
        let ctx = ctx();
        let e = parse_expression(&ctx, "m1.m2.x").unwrap();
        let m1 = ctx.pool.make_ident("m1");
        let m2 = ctx.pool.make_ident("m2");
        let x = ctx.pool.make_ident("x");
        assert_eq!(
            e,
            ctx.pool.make_dot(ctx.pool.make_dot(m1, m2), x)
        );
    }

    #[test]
    fn set_literals_nest_right() {
        let ctx = ctx();
        let e = parse_expression(&ctx, "{1, 2, 3}").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::Set);
        let chain = ctx.pool.lhs(e);
        assert_eq!(ctx.pool.kind(chain), ExprKind::Comma);
        assert_eq!(ctx.pool.kind(ctx.pool.rhs(chain)), ExprKind::Comma);
    }

    #[test]
    fn temporal_properties_parse() {
        let ctx = ctx();
        let e = parse_expression(&ctx, "G (x < 3)").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::G);
        let e = parse_expression(&ctx, "a U b").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::U);
    }

    #[test]
    fn casts_parse_to_tagged_nodes() {
        let ctx = ctx();
        let e = parse_expression(&ctx, "bool(x)").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::Cast);
        let e = parse_expression(&ctx, "resize(x, 8)").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::Cast);
        assert_eq!(ctx.pool.value(ctx.pool.lhs(e)), 8);
    }

    #[test]
    fn fixed_literals_are_rounded() {
        let ctx = ctx();
        let e = parse_expression(&ctx, "0.5").unwrap();
        assert_eq!(ctx.pool.kind(e), ExprKind::FConst);
        assert_eq!(ctx.pool.value(e), 1 << (FIXED_PRECISION - 1));
    }

    #[test]
    fn parse_errors_carry_locations() {
        let ctx = ctx();
        let err = parse_model(&ctx, "MODULE main VAR x : ;").unwrap_err();
        assert!(err.to_string().contains("expected a type"));
    }

    #[test]
    fn duplicate_variables_are_rejected_at_parse_time() {
        let ctx = ctx();
        let src = "
            MODULE main
            VAR x : boolean;
                x : boolean;
        ";
        assert!(parse_model(&ctx, src).is_err());
    }
}
