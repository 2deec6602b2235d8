//! Recursive-descent parser for the binding expression sub-language.
//!
//! Grammar (loosest binding first):
//!
//! ```text
//! or       := and ( "||" and )*
//! and      := equality ( "&&" equality )*
//! equality := compare ( ("==" | "!=") compare )*
//! compare  := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive := term ( ("+" | "-") term )*
//! term     := unary ( ("*" | "/" | "%") unary )*
//! unary    := ("!" | "-") unary | postfix
//! postfix  := primary ( "." ident )*
//! primary  := number | string | "true" | "false" | ident | ident "(" args ")" | "(" or ")"
//! ```

use super::token::{tokenize, Span, SyntaxError, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// A node in the expression tree, tagged with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Member(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// A parsed expression paired with its source text.
///
/// Presets hold these pre-parsed so dispatch-time evaluation never has to
/// re-lex, and so error messages can quote the original text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    pub source: String,
    pub root: Expr,
}

/// Parse an expression string into a [`CompiledExpr`].
pub fn parse(source: &str) -> Result<CompiledExpr, SyntaxError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("empty expression", Span::new(0, 0)));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let root = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(SyntaxError::new(
            format!("unexpected trailing token {:?}", tok.kind),
            tok.span,
        ));
    }
    Ok(CompiledExpr {
        source: source.to_string(),
        root,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().map(|t| &t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SyntaxError> {
        match self.bump() {
            Some(tok) if &tok.kind == kind => Ok(tok),
            Some(tok) => Err(SyntaxError::new(
                format!("expected {}, found {:?}", what, tok.kind),
                tok.span,
            )),
            None => Err(SyntaxError::new(
                format!("expected {}, found end of expression", what),
                self.end_span(),
            )),
        }
    }

    fn end_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| Span::new(t.span.end, t.span.end))
            .unwrap_or(Span::new(0, 0))
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_compare()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::EqEq) => BinaryOp::Eq,
                Some(TokenKind::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_compare()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Bang) => Some((UnaryOp::Not, self.peek().unwrap().span)),
            Some(TokenKind::Minus) => Some((UnaryOp::Neg, self.peek().unwrap().span)),
            _ => None,
        };
        if let Some((op, op_span)) = op {
            self.pos += 1;
            let operand = self.parse_unary()?;
            let span = op_span.to(operand.span);
            return Ok(Expr {
                kind: ExprKind::Unary(op, Box::new(operand)),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::Dot) {
            let tok = self.bump().ok_or_else(|| {
                SyntaxError::new("expected member name after '.'", self.end_span())
            })?;
            match tok.kind {
                TokenKind::Ident(name) => {
                    let span = expr.span.to(tok.span);
                    expr = Expr {
                        kind: ExprKind::Member(Box::new(expr), name),
                        span,
                    };
                }
                other => {
                    return Err(SyntaxError::new(
                        format!("expected member name after '.', found {:?}", other),
                        tok.span,
                    ));
                }
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let tok = self
            .bump()
            .ok_or_else(|| SyntaxError::new("expected expression", self.end_span()))?;

        match tok.kind {
            TokenKind::Number(n) => Ok(Expr {
                kind: ExprKind::Number(n),
                span: tok.span,
            }),
            TokenKind::Str(s) => Ok(Expr {
                kind: ExprKind::Str(s),
                span: tok.span,
            }),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr {
                    kind: ExprKind::Bool(true),
                    span: tok.span,
                }),
                "false" => Ok(Expr {
                    kind: ExprKind::Bool(false),
                    span: tok.span,
                }),
                _ => {
                    if self.peek().map(|t| &t.kind) == Some(&TokenKind::LParen) {
                        self.pos += 1;
                        let (args, close) = self.parse_args()?;
                        Ok(Expr {
                            kind: ExprKind::Call(name, args),
                            span: tok.span.to(close),
                        })
                    } else {
                        Ok(Expr {
                            kind: ExprKind::Var(name),
                            span: tok.span,
                        })
                    }
                }
            },
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                let close = self.expect(&TokenKind::RParen, "closing ')'")?;
                Ok(Expr {
                    kind: inner.kind,
                    span: tok.span.to(close.span),
                })
            }
            other => Err(SyntaxError::new(
                format!("expected expression, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn parse_args(&mut self) -> Result<(Vec<Expr>, Span), SyntaxError> {
        let mut args = Vec::new();
        if let Some(tok) = self.peek() {
            if tok.kind == TokenKind::RParen {
                let span = tok.span;
                self.pos += 1;
                return Ok((args, span));
            }
        }
        loop {
            args.push(self.parse_or()?);
            match self.bump() {
                Some(tok) if tok.kind == TokenKind::Comma => continue,
                Some(tok) if tok.kind == TokenKind::RParen => return Ok((args, tok.span)),
                Some(tok) => {
                    return Err(SyntaxError::new(
                        format!("expected ',' or ')' in argument list, found {:?}", tok.kind),
                        tok.span,
                    ));
                }
                None => {
                    return Err(SyntaxError::new(
                        "unterminated argument list",
                        self.end_span(),
                    ));
                }
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.to(rhs.span);
    Expr {
        kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
        span,
    }
}
