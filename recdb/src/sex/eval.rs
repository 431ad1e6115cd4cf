use super::parser::{build_regex, BinaryOp, Expr, UnaryOp};
use crate::error::EvalError;
use crate::record::Record;
use crate::util::{parse_date, parse_int, parse_real};
use std::cmp::Ordering;

type EvalResult<T> = std::result::Result<T, EvalError>;

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// A reference to a field the record does not have
    Missing,
    Int(i64),
    Real(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Real(r) => r,
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

fn cmp_numbers(a: Number, b: Number) -> EvalResult<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Ok(x.cmp(&y)),
        _ => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| EvalError::TypeMismatch("comparison with NaN".into())),
    }
}

impl Value {
    fn from_bool(b: bool) -> Self {
        Value::Int(b as i64)
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Real(r) => Some(Number::Real(*r)),
            Value::Str(s) => parse_int(s)
                .map(Number::Int)
                .or_else(|| parse_real(s).map(Number::Real)),
            Value::Missing => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Str(s) => match self.number() {
                Some(n) => !n.is_zero(),
                None => !s.is_empty(),
            },
            _ => self.number().is_some_and(|n| !n.is_zero()),
        }
    }

    /// The value as text, `None` when missing.
    pub(crate) fn render(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Int(n) => Some(n.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Str(s) => Some(s.clone()),
        }
    }
}

/// Evaluation context: one record, with each unsubscripted field reference
/// bound to a particular occurrence (or to nothing when absent).
pub(crate) struct Env<'a> {
    pub record: &'a Record,
    pub bindings: &'a [(&'a str, Option<usize>)],
    pub case_insensitive: bool,
}

impl Env<'_> {
    fn lookup(&self, name: &str, index: Option<usize>) -> Option<&str> {
        let n = match index {
            Some(i) => i.checked_sub(1)?,
            None => match self.bindings.iter().find(|(b, _)| *b == name) {
                Some((_, bound)) => (*bound)?,
                None => 0,
            },
        };
        self.record.get_field(name, n).map(|f| f.value())
    }

    /// Truth of an expression in a boolean position. A bare field
    /// reference tests for existence.
    pub(crate) fn truth(&self, expr: &Expr) -> EvalResult<bool> {
        match expr {
            Expr::Field { name, index } => Ok(self.lookup(name, *index).is_some()),
            _ => Ok(self.eval(expr)?.truthy()),
        }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Real(r) => Ok(Value::Real(*r)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Field { name, index } => Ok(match self.lookup(name, *index) {
                Some(v) => Value::Str(v.to_string()),
                None => Value::Missing,
            }),
            Expr::Count(name) => Ok(Value::Int(self.record.field_count(name) as i64)),
            Expr::Unary(UnaryOp::Not, e) => Ok(Value::from_bool(!self.truth(e)?)),
            Expr::Unary(UnaryOp::Neg, e) => match self.eval(e)? {
                Value::Missing => Ok(Value::Missing),
                v => match v.number() {
                    Some(Number::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                    Some(Number::Real(r)) => Ok(Value::Real(-r)),
                    None => Err(EvalError::TypeMismatch(format!(
                        "cannot negate '{}'",
                        v.render().unwrap_or_default()
                    ))),
                },
            },
            Expr::Binary(BinaryOp::Or, l, r) => Ok(Value::from_bool(self.truth(l)? || self.truth(r)?)),
            Expr::Binary(BinaryOp::And, l, r) => Ok(Value::from_bool(self.truth(l)? && self.truth(r)?)),
            Expr::Binary(BinaryOp::Implies, l, r) => {
                Ok(Value::from_bool(!self.truth(l)? || self.truth(r)?))
            }
            Expr::Binary(op, l, r) => {
                let (a, b) = (self.eval(l)?, self.eval(r)?);
                self.binary(*op, a, b)
            }
            Expr::Match { lhs, rhs, compiled } => {
                let Some(text) = self.eval(lhs)?.render() else {
                    return Ok(Value::from_bool(false));
                };
                match compiled {
                    Some(re) => Ok(Value::from_bool(re.is_match(&text))),
                    None => {
                        let Some(pattern) = self.eval(rhs)?.render() else {
                            return Ok(Value::from_bool(false));
                        };
                        let re = build_regex(&pattern, self.case_insensitive)
                            .map_err(|_| EvalError::InvalidRegex(pattern.clone()))?;
                        Ok(Value::from_bool(re.is_match(&text)))
                    }
                }
            }
            Expr::Cond(c, t, e) => {
                if self.truth(c)? {
                    self.eval(t)
                } else {
                    self.eval(e)
                }
            }
        }
    }

    fn binary(&self, op: BinaryOp, a: Value, b: Value) -> EvalResult<Value> {
        let comparison = matches!(
            op,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::LtEq
                | BinaryOp::GtEq
                | BinaryOp::Before
                | BinaryOp::After
                | BinaryOp::SameTime
        );
        if a == Value::Missing || b == Value::Missing {
            return Ok(if comparison {
                Value::from_bool(false)
            } else {
                Value::Missing
            });
        }

        match op {
            BinaryOp::Eq => Ok(Value::from_bool(self.equal(&a, &b)?)),
            BinaryOp::NotEq => Ok(Value::from_bool(!self.equal(&a, &b)?)),
            BinaryOp::Lt => Ok(Value::from_bool(self.order(&a, &b)? == Ordering::Less)),
            BinaryOp::Gt => Ok(Value::from_bool(self.order(&a, &b)? == Ordering::Greater)),
            BinaryOp::LtEq => Ok(Value::from_bool(self.order(&a, &b)? != Ordering::Greater)),
            BinaryOp::GtEq => Ok(Value::from_bool(self.order(&a, &b)? != Ordering::Less)),
            BinaryOp::Before => Ok(Value::from_bool(dates(&a, &b)? == Ordering::Less)),
            BinaryOp::After => Ok(Value::from_bool(dates(&a, &b)? == Ordering::Greater)),
            BinaryOp::SameTime => Ok(Value::from_bool(dates(&a, &b)? == Ordering::Equal)),
            BinaryOp::Concat => {
                let mut s = a.render().unwrap_or_default();
                s.push_str(&b.render().unwrap_or_default());
                Ok(Value::Str(s))
            }
            _ => arithmetic(op, &a, &b),
        }
    }

    fn fold(&self, s: String) -> String {
        if self.case_insensitive {
            s.to_lowercase()
        } else {
            s
        }
    }

    fn equal(&self, a: &Value, b: &Value) -> EvalResult<bool> {
        if let (Some(x), Some(y)) = (a.number(), b.number()) {
            return Ok(cmp_numbers(x, y)? == Ordering::Equal);
        }
        let (x, y) = (a.render().unwrap_or_default(), b.render().unwrap_or_default());
        Ok(self.fold(x) == self.fold(y))
    }

    fn order(&self, a: &Value, b: &Value) -> EvalResult<Ordering> {
        match (a.number(), b.number()) {
            (Some(x), Some(y)) => cmp_numbers(x, y),
            (None, None) => {
                let (x, y) = (a.render().unwrap_or_default(), b.render().unwrap_or_default());
                Ok(self.fold(x).cmp(&self.fold(y)))
            }
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot order '{}' against '{}'",
                a.render().unwrap_or_default(),
                b.render().unwrap_or_default()
            ))),
        }
    }
}

fn dates(a: &Value, b: &Value) -> EvalResult<Ordering> {
    let parse = |v: &Value| {
        let text = v.render().unwrap_or_default();
        parse_date(&text).ok_or(EvalError::InvalidDate(text))
    };
    Ok(parse(a)?.cmp(&parse(b)?))
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> EvalResult<Value> {
    let (Some(x), Some(y)) = (a.number(), b.number()) else {
        return Err(EvalError::TypeMismatch(format!(
            "arithmetic on non-numeric values '{}' and '{}'",
            a.render().unwrap_or_default(),
            b.render().unwrap_or_default()
        )));
    };
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && y.is_zero() {
        return Err(EvalError::DivisionByZero);
    }

    Ok(match (x, y) {
        (Number::Int(x), Number::Int(y)) => Value::Int(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => x.wrapping_div(y),
            _ => x.wrapping_rem(y),
        }),
        _ => {
            let (x, y) = (x.as_f64(), y.as_f64());
            Value::Real(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                _ => x % y,
            })
        }
    })
}
