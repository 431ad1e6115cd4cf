use super::lexer::{tokenize, Token};
use crate::error::{RecError, Result};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Implies,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Before,
    After,
    SameTime,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Int(i64),
    Real(f64),
    Str(String),
    /// A field reference. `index` is the 1-based occurrence when subscripted.
    Field { name: String, index: Option<usize> },
    /// `#Name`
    Count(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `lhs ~ rhs`. Literal patterns are compiled once.
    Match {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        compiled: Option<Regex>,
    },
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Names of unsubscripted field references, without duplicates.
    pub(crate) fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Field { name, index: None } => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Unary(_, e) => e.collect_fields(out),
            Expr::Binary(_, l, r) | Expr::Match { lhs: l, rhs: r, .. } => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
            Expr::Cond(c, t, e) => {
                c.collect_fields(out);
                t.collect_fields(out);
                e.collect_fields(out);
            }
            _ => {}
        }
    }
}

pub(crate) fn build_regex(pattern: &str, case_insensitive: bool) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
}

pub(crate) fn parse(source: &str, case_insensitive: bool) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        case_insensitive,
    };
    let expr = parser.parse_expr(0)?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(RecError::Compile(format!("unexpected token {other:?}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    case_insensitive: bool,
}

impl Parser {
    fn peek(&self) -> &Token {
        static EOF: Token = Token::Eof;
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.advance();
        if token == expected {
            Ok(())
        } else {
            Err(RecError::Compile(format!(
                "expected {expected:?}, found {token:?}"
            )))
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            if *self.peek() == Token::Question {
                if 1 < min_bp {
                    break;
                }
                self.advance();
                let then = self.parse_expr(0)?;
                self.expect(Token::Colon)?;
                let otherwise = self.parse_expr(1)?;
                lhs = Expr::Cond(Box::new(lhs), Box::new(then), Box::new(otherwise));
                continue;
            }

            if *self.peek() == Token::Match {
                if 6 < min_bp {
                    break;
                }
                self.advance();
                let rhs = self.parse_expr(7)?;
                let compiled = match &rhs {
                    Expr::Str(pattern) => Some(
                        build_regex(pattern, self.case_insensitive)
                            .map_err(|e| RecError::Compile(format!("invalid regexp '{pattern}': {e}")))?,
                    ),
                    _ => None,
                };
                lhs = Expr::Match {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    compiled,
                };
                continue;
            }

            let op = match self.peek() {
                Token::Or => Some((BinaryOp::Or, 2, 3)),
                Token::Implies => Some((BinaryOp::Implies, 2, 3)),
                Token::And => Some((BinaryOp::And, 4, 5)),
                Token::Eq => Some((BinaryOp::Eq, 6, 7)),
                Token::NotEq => Some((BinaryOp::NotEq, 6, 7)),
                Token::Lt => Some((BinaryOp::Lt, 6, 7)),
                Token::Gt => Some((BinaryOp::Gt, 6, 7)),
                Token::LtEq => Some((BinaryOp::LtEq, 6, 7)),
                Token::GtEq => Some((BinaryOp::GtEq, 6, 7)),
                Token::Before => Some((BinaryOp::Before, 6, 7)),
                Token::After => Some((BinaryOp::After, 6, 7)),
                Token::SameTime => Some((BinaryOp::SameTime, 6, 7)),
                Token::Concat => Some((BinaryOp::Concat, 8, 9)),
                Token::Plus => Some((BinaryOp::Add, 10, 11)),
                Token::Minus => Some((BinaryOp::Sub, 10, 11)),
                Token::Star => Some((BinaryOp::Mul, 12, 13)),
                Token::Slash => Some((BinaryOp::Div, 12, 13)),
                Token::Percent => Some((BinaryOp::Mod, 12, 13)),
                _ => None,
            };

            match op {
                Some((op, l_bp, r_bp)) => {
                    if l_bp < min_bp {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(r_bp)?;
                    lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => break,
            }
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Real(r) => Ok(Expr::Real(r)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Not => Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_expr(14)?))),
            Token::Minus => Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_expr(14)?))),
            Token::LParen => {
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Hash => match self.advance() {
                Token::Name(name) => Ok(Expr::Count(name)),
                other => Err(RecError::Compile(format!(
                    "expected a field name after '#', found {other:?}"
                ))),
            },
            Token::Name(name) => {
                if *self.peek() != Token::LBracket {
                    return Ok(Expr::Field { name, index: None });
                }
                self.advance();
                let index = match self.advance() {
                    Token::Int(n) if n >= 1 => n as usize,
                    other => {
                        return Err(RecError::Compile(format!(
                            "invalid subscript {other:?} for field '{name}'"
                        )))
                    }
                };
                self.expect(Token::RBracket)?;
                Ok(Expr::Field {
                    name,
                    index: Some(index),
                })
            }
            Token::Eof => Err(RecError::Compile("unexpected end of expression".into())),
            other => Err(RecError::Compile(format!("unexpected token {other:?}"))),
        }
    }
}
