//! Lexer for the binding expression sub-language.
//!
//! Produces spanned tokens so syntax and evaluation errors can point at the
//! offending slice of the original expression string.

use std::fmt;

/// A byte range in the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    /// Slice the source text covered by this span.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or(source)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    AndAnd,
    OrOr,
    Bang,

    Dot,
    Comma,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// A syntax error in an expression string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syntax error at {}..{}: {}",
            self.span.start, self.span.end, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Tokenize an expression string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let c = bytes[pos] as char;

        match c {
            ' ' | '\t' | '\n' | '\r' => {
                pos += 1;
            }
            '(' => {
                tokens.push(single(TokenKind::LParen, start));
                pos += 1;
            }
            ')' => {
                tokens.push(single(TokenKind::RParen, start));
                pos += 1;
            }
            ',' => {
                tokens.push(single(TokenKind::Comma, start));
                pos += 1;
            }
            '.' => {
                tokens.push(single(TokenKind::Dot, start));
                pos += 1;
            }
            '+' => {
                tokens.push(single(TokenKind::Plus, start));
                pos += 1;
            }
            '-' => {
                tokens.push(single(TokenKind::Minus, start));
                pos += 1;
            }
            '*' => {
                tokens.push(single(TokenKind::Star, start));
                pos += 1;
            }
            '/' => {
                tokens.push(single(TokenKind::Slash, start));
                pos += 1;
            }
            '%' => {
                tokens.push(single(TokenKind::Percent, start));
                pos += 1;
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::NotEq,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    tokens.push(single(TokenKind::Bang, start));
                    pos += 1;
                }
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Le,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    tokens.push(single(TokenKind::Lt, start));
                    pos += 1;
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::Ge,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    tokens.push(single(TokenKind::Gt, start));
                    pos += 1;
                }
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token {
                        kind: TokenKind::EqEq,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    // Assignment is outside the sub-language; expressions never mutate context.
                    return Err(SyntaxError::new(
                        "assignment is not allowed in binding expressions (use ==)",
                        Span::new(start, start + 1),
                    ));
                }
            }
            '&' => {
                if bytes.get(pos + 1) == Some(&b'&') {
                    tokens.push(Token {
                        kind: TokenKind::AndAnd,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    return Err(SyntaxError::new(
                        "expected && for boolean and",
                        Span::new(start, start + 1),
                    ));
                }
            }
            '|' => {
                if bytes.get(pos + 1) == Some(&b'|') {
                    tokens.push(Token {
                        kind: TokenKind::OrOr,
                        span: Span::new(start, start + 2),
                    });
                    pos += 2;
                } else {
                    return Err(SyntaxError::new(
                        "expected || for boolean or",
                        Span::new(start, start + 1),
                    ));
                }
            }
            '"' | '\'' => {
                let (s, end) = lex_string(source, pos, c)?;
                tokens.push(Token {
                    kind: TokenKind::Str(s),
                    span: Span::new(start, end),
                });
                pos = end;
            }
            _ if c.is_ascii_digit() => {
                let (n, end) = lex_number(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Number(n),
                    span: Span::new(start, end),
                });
                pos = end;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = pos + 1;
                while end < bytes.len()
                    && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let ident = source[pos..end].to_string();
                tokens.push(Token {
                    kind: TokenKind::Ident(ident),
                    span: Span::new(start, end),
                });
                pos = end;
            }
            _ => {
                return Err(SyntaxError::new(
                    format!("unexpected character {:?}", c),
                    Span::new(start, start + c.len_utf8()),
                ));
            }
        }
    }

    Ok(tokens)
}

fn single(kind: TokenKind, start: usize) -> Token {
    Token {
        kind,
        span: Span::new(start, start + 1),
    }
}

fn lex_string(source: &str, start: usize, quote: char) -> Result<(String, usize), SyntaxError> {
    let bytes = source.as_bytes();
    let mut out = String::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c == quote {
            return Ok((out, pos + 1));
        }
        if c == '\\' {
            match bytes.get(pos + 1).map(|b| *b as char) {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(q) if q == quote => out.push(q),
                Some(other) => {
                    return Err(SyntaxError::new(
                        format!("unknown escape \\{}", other),
                        Span::new(pos, pos + 2),
                    ));
                }
                None => break,
            }
            pos += 2;
        } else {
            // Multi-byte chars: copy the whole scalar
            let ch = source[pos..].chars().next().unwrap_or('\u{fffd}');
            out.push(ch);
            pos += ch.len_utf8();
        }
    }

    Err(SyntaxError::new(
        "unterminated string literal",
        Span::new(start, source.len()),
    ))
}

fn lex_number(source: &str, start: usize) -> Result<(f64, usize), SyntaxError> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut seen_dot = false;

    while end < bytes.len() {
        let c = bytes[end] as char;
        if c.is_ascii_digit() {
            end += 1;
        } else if c == '.' && !seen_dot && bytes.get(end + 1).is_some_and(|b| b.is_ascii_digit()) {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }

    source[start..end]
        .parse::<f64>()
        .map(|n| (n, end))
        .map_err(|_| SyntaxError::new("invalid number literal", Span::new(start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            kinds("count * 2"),
            vec![
                TokenKind::Ident("count".into()),
                TokenKind::Star,
                TokenKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_comparison_and_bool_ops() {
        assert_eq!(
            kinds("a >= 1 && !b || c != 'x'"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Number(1.0),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Ident("b".into()),
                TokenKind::OrOr,
                TokenKind::Ident("c".into()),
                TokenKind::NotEq,
                TokenKind::Str("x".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_member_access() {
        assert_eq!(
            kinds("editor.focused"),
            vec![
                TokenKind::Ident("editor".into()),
                TokenKind::Dot,
                TokenKind::Ident("focused".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_string_escapes() {
        assert_eq!(kinds(r#""a\nb""#), vec![TokenKind::Str("a\nb".into())]);
        assert_eq!(kinds(r#"'it\'s'"#), vec![TokenKind::Str("it's".into())]);
    }

    #[test]
    fn test_tokenize_float() {
        assert_eq!(kinds("1.5"), vec![TokenKind::Number(1.5)]);
    }

    #[test]
    fn test_rejects_assignment() {
        let e = tokenize("count = 2").unwrap_err();
        assert!(e.message.contains("assignment"));
    }

    #[test]
    fn test_rejects_single_ampersand() {
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("a | b").is_err());
    }

    #[test]
    fn test_rejects_unterminated_string() {
        assert!(tokenize("'abc").is_err());
    }

    #[test]
    fn test_spans_point_into_source() {
        let source = "count + 12";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens[0].span.slice(source), "count");
        assert_eq!(tokens[2].span.slice(source), "12");
    }
}
