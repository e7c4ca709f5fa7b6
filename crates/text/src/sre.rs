//! SRE text syntax.
//!
//! ```text
//! expr   := term (':' term)* | term ('+' term)*
//! term   := (atom | '(' expr ')') weight? ('*' rate weight?)?
//! atom   := identifier | 'ε'
//! weight := '[' integer ']'
//! rate   := number | '[' number ']'
//! ```
//!
//! Identifiers match `[A-Za-z_\\]\w*`. `\N` is a paste reference and is
//! only accepted inside SRE deltas. Sum terms need a weight and
//! concatenation terms must not have one; a lone term ignores its weight.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use stochex_expr::Expr;

use crate::error::ParseError;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?P<number>\d+(?:\.\d+)?)|(?P<ident>[A-Za-z_\\]\w*)|(?P<epsilon>ε)|(?P<symbol>[()\[\]+:*]))",
    )
    .expect("token pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    LeftBracket,
    RightBracket,
    Plus,
    Colon,
    Star,
    Number(String),
    Ident(String),
    Epsilon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "'('"),
            Token::Close => write!(f, "')'"),
            Token::LeftBracket => write!(f, "'['"),
            Token::RightBracket => write!(f, "']'"),
            Token::Plus => write!(f, "'+'"),
            Token::Colon => write!(f, "':'"),
            Token::Star => write!(f, "'*'"),
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(s) => write!(f, "identifier {s}"),
            Token::Epsilon => write!(f, "'ε'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.trim_start().is_empty() {
        let Some(caps) = TOKEN.captures(rest) else {
            let snippet: String = rest.trim_start().chars().take(12).collect();
            return Err(ParseError::Syntax {
                position: tokens.len(),
                reason: format!("unexpected input '{snippet}'"),
            });
        };
        let token = if let Some(m) = caps.name("number") {
            Token::Number(m.as_str().to_string())
        } else if let Some(m) = caps.name("ident") {
            Token::Ident(m.as_str().to_string())
        } else if caps.name("epsilon").is_some() {
            Token::Epsilon
        } else {
            match &caps["symbol"] {
                "(" => Token::Open,
                ")" => Token::Close,
                "[" => Token::LeftBracket,
                "]" => Token::RightBracket,
                "+" => Token::Plus,
                ":" => Token::Colon,
                _ => Token::Star,
            }
        };
        tokens.push(token);
        rest = &rest[caps[0].len()..];
    }
    Ok(tokens)
}

/// Parses an SRE and simplifies it.
pub fn parse_sre(input: &str) -> Result<Expr, ParseError> {
    let expr = parse_raw(input, None)?.simplify();
    debug!(nodes = expr.size(), "parsed expression");
    Ok(expr)
}

/// Parses an SRE as written. Paste references `\N` resolve against `pastes`
/// by 1-based pre-order index and keep the pasted subtree's ids.
pub(crate) fn parse_raw(input: &str, pastes: Option<&Expr>) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        pastes,
    };
    parser.level(false)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    pastes: Option<&'a Expr>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            position,
            reason: reason.into(),
        }
    }

    /// Terms joined by one kind of delimiter, up to `)` when `nested`.
    fn level(&mut self, nested: bool) -> Result<Expr, ParseError> {
        let mut terms = Vec::new();
        let mut delimiter: Option<Token> = None;
        loop {
            terms.push(self.term()?);
            match self.peek().cloned() {
                None if nested => return Err(self.error(self.pos, "missing ')'")),
                None => break,
                Some(Token::Close) if nested => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Close) => return Err(self.error(self.pos, "unmatched ')'")),
                Some(d @ (Token::Plus | Token::Colon)) => {
                    if delimiter.as_ref().is_some_and(|seen| *seen != d) {
                        return Err(self.error(
                            self.pos,
                            "':' and '+' mixed on one level, add parentheses",
                        ));
                    }
                    delimiter = Some(d);
                    self.pos += 1;
                }
                Some(other) => {
                    return Err(self.error(
                        self.pos,
                        format!("expected ':', '+' or the end of the term, found {other}"),
                    ));
                }
            }
        }
        self.combine(terms, delimiter)
    }

    fn combine(
        &self,
        mut terms: Vec<(Expr, Option<u64>)>,
        delimiter: Option<Token>,
    ) -> Result<Expr, ParseError> {
        if terms.len() == 1 {
            return Ok(terms.swap_remove(0).0);
        }
        match delimiter {
            Some(Token::Colon) => {
                if terms.iter().any(|(_, w)| w.is_some()) {
                    return Err(self.error(self.pos, "concatenation terms take no weight"));
                }
                Ok(Expr::concat(terms.into_iter().map(|(e, _)| e).collect())?)
            }
            _ => {
                let branches = terms
                    .into_iter()
                    .map(|(e, w)| w.map(|w| (e, w)))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| self.error(self.pos, "every sum term needs an integer weight"))?;
                Ok(Expr::sum(branches)?)
            }
        }
    }

    fn term(&mut self) -> Result<(Expr, Option<u64>), ParseError> {
        let at = self.pos;
        let mut expr = match self.next() {
            Some(Token::Open) => self.level(true)?,
            Some(Token::Ident(name)) => self.identifier(at, &name)?,
            Some(Token::Epsilon) => Expr::epsilon(),
            Some(other) => {
                return Err(self.error(at, format!("expected an expression, found {other}")));
            }
            None => return Err(self.error(at, "unexpected end of input")),
        };
        let mut weight = self.weight()?;
        if self.peek() == Some(&Token::Star) {
            if weight.is_some() {
                return Err(self.error(
                    self.pos,
                    "a weighted term cannot be repeated, add parentheses",
                ));
            }
            self.pos += 1;
            let rate = self.rate()?;
            expr = Expr::kleene(expr, rate)?;
            weight = self.weight()?;
        }
        Ok((expr, weight))
    }

    fn identifier(&self, at: usize, name: &str) -> Result<Expr, ParseError> {
        let Some(index) = paste_index(name) else {
            return Ok(Expr::atomic(name));
        };
        let Some(source) = self.pastes else {
            return Err(self.error(at, format!("paste reference {name} outside a delta")));
        };
        source
            .node_at(index)
            .ok_or(ParseError::IndexOutOfRange {
                index,
                size: source.size(),
            })
    }

    fn weight(&mut self) -> Result<Option<u64>, ParseError> {
        if self.peek() != Some(&Token::LeftBracket) {
            return Ok(None);
        }
        let at = self.pos;
        let (Some(Token::Number(n)), Some(Token::RightBracket)) =
            (self.tokens.get(at + 1).cloned(), self.tokens.get(at + 2).cloned())
        else {
            return Err(self.error(at, "expected '[weight]'"));
        };
        let weight = n
            .parse::<u64>()
            .map_err(|_| self.error(at + 1, format!("weight {n} is not a non-negative integer")))?;
        self.pos += 3;
        Ok(Some(weight))
    }

    fn rate(&mut self) -> Result<f64, ParseError> {
        let at = self.pos;
        let bracketed = self.peek() == Some(&Token::LeftBracket);
        if bracketed {
            self.pos += 1;
        }
        let Some(Token::Number(n)) = self.next() else {
            return Err(self.error(at, "'*' needs a rate"));
        };
        if bracketed && self.next() != Some(Token::RightBracket) {
            return Err(self.error(at, "expected ']' after the rate"));
        }
        n.parse::<f64>()
            .map_err(|_| self.error(at, format!("invalid rate {n}")))
    }
}

fn paste_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('\\')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
