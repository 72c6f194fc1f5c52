//! Lexer for the sybil modelling language.
//!
//! A single-pass tokenizer over the source bytes. Identifiers are kept
//! as string slices (interning happens in the parser, which owns the
//! pool); numbers carry their radix so constants keep their printed
//! form. Comments run from `--` to the end of the line.

use sybil_base::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Integer constant with its radix (10, 16 or 8).
    Number(u64, u32),
    /// Fixed-point decimal literal, kept textual until rounding.
    Fixed(String),

    // keywords
    Module,
    Var,
    IVar,
    FrozenVar,
    Constant,
    Define,
    Init,
    Invar,
    Trans,
    Inertial,
    Boolean,
    Unsigned,
    Signed,
    Int,
    Mod,
    Xor,
    Xnor,
    Next,
    Bool,
    Resize,
    TemporalF,
    TemporalG,
    TemporalX,
    TemporalU,
    TemporalR,

    // punctuation and operators
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Question,
    Assign,    // :=
    GuardsTo,  // ?->
    Bang,
    Tilde,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Arrow,     // ->
    DArrow,    // <->
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LShift,
    RShift,
    Plus,
    Minus,
    Star,
    Slash,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "MODULE" => TokenKind::Module,
        "VAR" => TokenKind::Var,
        "IVAR" => TokenKind::IVar,
        "FROZENVAR" => TokenKind::FrozenVar,
        "CONSTANT" => TokenKind::Constant,
        "DEFINE" => TokenKind::Define,
        "INIT" => TokenKind::Init,
        "INVAR" => TokenKind::Invar,
        "TRANS" => TokenKind::Trans,
        "inertial" => TokenKind::Inertial,
        "boolean" => TokenKind::Boolean,
        "unsigned" => TokenKind::Unsigned,
        "signed" => TokenKind::Signed,
        "int" => TokenKind::Int,
        "mod" => TokenKind::Mod,
        "xor" => TokenKind::Xor,
        "xnor" => TokenKind::Xnor,
        "next" => TokenKind::Next,
        "bool" => TokenKind::Bool,
        "resize" => TokenKind::Resize,
        "F" => TokenKind::TemporalF,
        "G" => TokenKind::TemporalG,
        "X" => TokenKind::TemporalX,
        "U" => TokenKind::TemporalU,
        "R" => TokenKind::TemporalR,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenizes the whole input; the final token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, sybil_base::SpannedError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            out.push(token);
            if done {
                return Ok(out);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => self.pos += 1,
                Some(b'-') if self.peek2() == Some(b'-') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, sybil_base::SpannedError> {
        self.skip_trivia();
        let start = self.pos;

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let kind = match c {
            b'(' => self.punct(TokenKind::LParen),
            b')' => self.punct(TokenKind::RParen),
            b'[' => self.punct(TokenKind::LBracket),
            b']' => self.punct(TokenKind::RBracket),
            b'{' => self.punct(TokenKind::LBrace),
            b'}' => self.punct(TokenKind::RBrace),
            b';' => self.punct(TokenKind::Semicolon),
            b',' => self.punct(TokenKind::Comma),
            b'.' => self.punct(TokenKind::Dot),
            b'+' => self.punct(TokenKind::Plus),
            b'*' => self.punct(TokenKind::Star),
            b'/' => self.punct(TokenKind::Slash),
            b'~' => self.punct(TokenKind::Tilde),
            b'^' => self.punct(TokenKind::Caret),

            b':' => {
                if self.peek2() == Some(b'=') {
                    self.pos += 2;
                    TokenKind::Assign
                } else {
                    self.punct(TokenKind::Colon)
                }
            }
            b'?' => {
                if self.peek2() == Some(b'-') && self.bytes.get(self.pos + 2) == Some(&b'>') {
                    self.pos += 3;
                    TokenKind::GuardsTo
                } else {
                    self.punct(TokenKind::Question)
                }
            }
            b'!' => {
                if self.peek2() == Some(b'=') {
                    self.pos += 2;
                    TokenKind::NotEqual
                } else {
                    self.punct(TokenKind::Bang)
                }
            }
            b'&' => {
                if self.peek2() == Some(b'&') {
                    self.pos += 2;
                    TokenKind::AmpAmp
                } else {
                    self.punct(TokenKind::Amp)
                }
            }
            b'|' => {
                if self.peek2() == Some(b'|') {
                    self.pos += 2;
                    TokenKind::PipePipe
                } else {
                    self.punct(TokenKind::Pipe)
                }
            }
            b'-' => {
                if self.peek2() == Some(b'>') {
                    self.pos += 2;
                    TokenKind::Arrow
                } else {
                    self.punct(TokenKind::Minus)
                }
            }
            b'=' => self.punct(TokenKind::Equal),
            b'<' => match self.peek2() {
                Some(b'-') if self.bytes.get(self.pos + 2) == Some(&b'>') => {
                    self.pos += 3;
                    TokenKind::DArrow
                }
                Some(b'=') => {
                    self.pos += 2;
                    TokenKind::LessEqual
                }
                Some(b'<') => {
                    self.pos += 2;
                    TokenKind::LShift
                }
                _ => self.punct(TokenKind::Less),
            },
            b'>' => match self.peek2() {
                Some(b'=') => {
                    self.pos += 2;
                    TokenKind::GreaterEqual
                }
                Some(b'>') => {
                    self.pos += 2;
                    TokenKind::RShift
                }
                _ => self.punct(TokenKind::Greater),
            },

            b'0'..=b'9' => self.number(start)?,
            c if c.is_ascii_alphabetic() || c == b'_' => self.word(start),

            _ => {
                return Err(sybil_base::SpannedError::new(
                    format!("unexpected character `{}`", c as char),
                    Span::new(start, start + 1),
                ))
            }
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn word(&mut self, start: usize) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, sybil_base::SpannedError> {
        // radix prefixes
        if self.peek() == Some(b'0') {
            match self.peek2() {
                Some(b'x') | Some(b'X') => return self.radix_number(start, 16),
                Some(b'o') | Some(b'O') => return self.radix_number(start, 8),
                _ => {}
            }
        }

        let mut is_fixed = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !is_fixed && self.peek2().is_some_and(|d| d.is_ascii_digit())
            {
                is_fixed = true;
                self.pos += 1;
            } else {
                break;
            }
        }

        let text = &self.src[start..self.pos];
        if is_fixed {
            return Ok(TokenKind::Fixed(text.to_string()));
        }
        text.parse::<u64>()
            .map(|v| TokenKind::Number(v, 10))
            .map_err(|_| {
                sybil_base::SpannedError::new(
                    format!("invalid number `{}`", text),
                    Span::new(start, self.pos),
                )
            })
    }

    fn radix_number(
        &mut self,
        start: usize,
        radix: u32,
    ) -> Result<TokenKind, sybil_base::SpannedError> {
        self.pos += 2; // prefix
        let digits_start = self.pos;
        while let Some(c) = self.peek() {
            if (c as char).is_digit(radix) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let digits = &self.src[digits_start..self.pos];
        u64::from_str_radix(digits, radix)
            .map(|v| TokenKind::Number(v, radix))
            .map_err(|_| {
                sybil_base::SpannedError::new(
                    format!("invalid base-{} number", radix),
                    Span::new(start, self.pos),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("MODULE main"),
            vec![
                TokenKind::Module,
                TokenKind::Ident("main".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn numbers_carry_their_radix() {
        assert_eq!(
            kinds("42 0x2a 0o52"),
            vec![
                TokenKind::Number(42, 10),
                TokenKind::Number(42, 16),
                TokenKind::Number(42, 8),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn fixed_point_literals_stay_textual() {
        assert_eq!(
            kinds("3.14"),
            vec![TokenKind::Fixed("3.14".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds(":= ?-> <-> -> <= << !="),
            vec![
                TokenKind::Assign,
                TokenKind::GuardsTo,
                TokenKind::DArrow,
                TokenKind::Arrow,
                TokenKind::LessEqual,
                TokenKind::LShift,
                TokenKind::NotEqual,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn logical_vs_bitwise_tokens() {
        assert_eq!(
            kinds("&& & || |"),
            vec![
                TokenKind::AmpAmp,
                TokenKind::Amp,
                TokenKind::PipePipe,
                TokenKind::Pipe,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("x -- the rest is noise\ny"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Ident("y".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn dot_is_not_swallowed_by_integers() {
        // `m1.x` must not lex `1.x` as a fixed-point number
        assert_eq!(
            kinds("m1.x"),
            vec![
                TokenKind::Ident("m1".into()),
                TokenKind::Dot,
                TokenKind::Ident("x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn temporal_letters_are_reserved() {
        assert_eq!(
            kinds("G x"),
            vec![
                TokenKind::TemporalG,
                TokenKind::Ident("x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unexpected_characters_are_reported() {
        assert!(Lexer::new("@").tokenize().is_err());
    }
}
