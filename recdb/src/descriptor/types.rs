use crate::field::is_valid_field_name;
use crate::util::{parse_date, parse_int, parse_real};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Type of a field, declared with `%type` or `%typedef`.
#[derive(Debug, Clone)]
pub enum FieldType {
    Int,
    Real,
    Bool,
    /// Single line of text
    Line,
    /// Text of at most this many characters
    Size(usize),
    /// Integer within an inclusive range
    Range { min: i64, max: i64 },
    Enum(Vec<String>),
    Regexp(Regex),
    Date,
    Email,
    Uuid,
    /// A valid field name
    Field,
    /// Foreign key into the record set of the given type
    Rec(String),
}

impl FieldType {
    /// Parse a type description such as `int`, `range 0 10` or `enum A B C`.
    /// Names of `typedefs` are resolved recursively.
    pub fn parse(description: &str, typedefs: &HashMap<String, String>) -> Result<Self, String> {
        let mut seen = Vec::new();
        parse_with(description, typedefs, &mut seen)
    }

    /// Check a value against this type, returning a reason when it does not conform.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let ok = match self {
            FieldType::Int => parse_int(value).is_some(),
            FieldType::Real => parse_real(value).is_some(),
            FieldType::Bool => matches!(value, "yes" | "no" | "true" | "false" | "0" | "1"),
            FieldType::Line => !value.contains('\n'),
            FieldType::Size(max) => value.chars().count() <= *max,
            FieldType::Range { min, max } => match parse_int(value) {
                Some(v) => v >= *min && v <= *max,
                None => false,
            },
            FieldType::Enum(values) => values.iter().any(|v| v == value),
            FieldType::Regexp(re) => re.is_match(value),
            FieldType::Date => parse_date(value).is_some(),
            FieldType::Email => email_regex().is_match(value),
            FieldType::Uuid => uuid::Uuid::parse_str(value).is_ok(),
            FieldType::Field => is_valid_field_name(value),
            FieldType::Rec(_) => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("value '{value}' is not a valid {self}"))
        }
    }

    /// Whether values of this type order numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Real | FieldType::Range { .. })
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9.-]+$").expect("static regex")
    })
}

fn parse_with(
    description: &str,
    typedefs: &HashMap<String, String>,
    seen: &mut Vec<String>,
) -> Result<FieldType, String> {
    let description = description.trim();
    let (kind, rest) = match description.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (description, ""),
    };

    let parsed = match kind {
        "int" => FieldType::Int,
        "real" => FieldType::Real,
        "bool" => FieldType::Bool,
        "line" => FieldType::Line,
        "date" => FieldType::Date,
        "email" => FieldType::Email,
        "uuid" => FieldType::Uuid,
        "field" => FieldType::Field,
        "size" => {
            let n = rest
                .parse::<usize>()
                .map_err(|_| format!("invalid size '{rest}'"))?;
            FieldType::Size(n)
        }
        "range" => {
            let bounds: Vec<&str> = rest.split_whitespace().collect();
            let parse_bound = |s: &str| match s {
                "MIN" => Ok(i64::MIN),
                "MAX" => Ok(i64::MAX),
                _ => parse_int(s).ok_or_else(|| format!("invalid range bound '{s}'")),
            };
            match bounds.as_slice() {
                [max] => FieldType::Range {
                    min: 0,
                    max: parse_bound(max)?,
                },
                [min, max] => {
                    let (min, max) = (parse_bound(min)?, parse_bound(max)?);
                    if min > max {
                        return Err(format!("empty range {min}..{max}"));
                    }
                    FieldType::Range { min, max }
                }
                _ => return Err(format!("invalid range '{rest}'")),
            }
        }
        "enum" => {
            let values: Vec<String> = rest.split_whitespace().map(String::from).collect();
            if values.is_empty() {
                return Err("enum without values".into());
            }
            FieldType::Enum(values)
        }
        "regexp" => {
            let pattern = strip_delimiters(rest)
                .ok_or_else(|| format!("regexp '{rest}' must be delimited"))?;
            let re = Regex::new(pattern).map_err(|e| format!("invalid regexp '{pattern}': {e}"))?;
            FieldType::Regexp(re)
        }
        "rec" => {
            if rest.is_empty() {
                return Err("rec type without a record type".into());
            }
            FieldType::Rec(rest.to_string())
        }
        other => match typedefs.get(other) {
            Some(def) => {
                if seen.iter().any(|s| s == other) {
                    return Err(format!("typedef cycle through '{other}'"));
                }
                seen.push(other.to_string());
                parse_with(def, typedefs, seen)?
            }
            None => return Err(format!("unknown type '{other}'")),
        },
    };

    Ok(parsed)
}

/// `/re/` - the delimiter is whatever character the description starts and ends with.
fn strip_delimiters(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    let inner = s.strip_prefix(first)?.strip_suffix(first)?;
    Some(inner)
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Real => write!(f, "real"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Line => write!(f, "line"),
            FieldType::Size(n) => write!(f, "size {n}"),
            FieldType::Range { min, max } => write!(f, "range {min} {max}"),
            FieldType::Enum(values) => write!(f, "enum {}", values.join(" ")),
            FieldType::Regexp(re) => write!(f, "regexp /{}/", re.as_str()),
            FieldType::Date => write!(f, "date"),
            FieldType::Email => write!(f, "email"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Field => write!(f, "field"),
            FieldType::Rec(t) => write!(f, "rec {t}"),
        }
    }
}

/// Constraint on the number of records in a set, from `%size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeConstraint {
    Exactly(usize),
    LessThan(usize),
    AtMost(usize),
    MoreThan(usize),
    AtLeast(usize),
}

impl SizeConstraint {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (op, n) = ["<=", ">=", "<", ">", "="]
            .iter()
            .find_map(|op| s.strip_prefix(op).map(|rest| (*op, rest.trim())))
            .unwrap_or(("=", s));
        let n = n
            .parse::<usize>()
            .map_err(|_| format!("invalid %size '{s}'"))?;
        Ok(match op {
            "<" => SizeConstraint::LessThan(n),
            "<=" => SizeConstraint::AtMost(n),
            ">" => SizeConstraint::MoreThan(n),
            ">=" => SizeConstraint::AtLeast(n),
            _ => SizeConstraint::Exactly(n),
        })
    }

    pub fn allows(&self, count: usize) -> bool {
        match *self {
            SizeConstraint::Exactly(n) => count == n,
            SizeConstraint::LessThan(n) => count < n,
            SizeConstraint::AtMost(n) => count <= n,
            SizeConstraint::MoreThan(n) => count > n,
            SizeConstraint::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for SizeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeConstraint::Exactly(n) => write!(f, "exactly {n}"),
            SizeConstraint::LessThan(n) => write!(f, "less than {n}"),
            SizeConstraint::AtMost(n) => write!(f, "at most {n}"),
            SizeConstraint::MoreThan(n) => write!(f, "more than {n}"),
            SizeConstraint::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<FieldType, String> {
        FieldType::parse(s, &HashMap::new())
    }

    #[test]
    fn test_basic_types() {
        assert!(parse("int").unwrap().check("42").is_ok());
        assert!(parse("int").unwrap().check("forty-two").is_err());
        assert!(parse("int").unwrap().check("0-5").is_err());
        assert!(parse("int").unwrap().check("0x1F").is_ok());
        assert!(parse("real").unwrap().check("3.14").is_ok());
        assert!(parse("bool").unwrap().check("yes").is_ok());
        assert!(parse("bool").unwrap().check("maybe").is_err());
        assert!(parse("line").unwrap().check("a\nb").is_err());
        assert!(parse("size 3").unwrap().check("abcd").is_err());
        assert!(parse("email").unwrap().check("jemarch@gnu.org").is_ok());
        assert!(parse("email").unwrap().check("not an email").is_err());
        assert!(parse("date").unwrap().check("2010-01-02").is_ok());
    }

    #[test]
    fn test_range() {
        let t = parse("range 1 5").unwrap();
        assert!(t.check("1").is_ok());
        assert!(t.check("5").is_ok());
        assert!(t.check("6").is_err());
        assert!(matches!(parse("range 10").unwrap(), FieldType::Range { min: 0, max: 10 }));
        assert!(parse("range 5 1").is_err());
    }

    #[test]
    fn test_enum_reports_value() {
        let t = parse("enum home office loaned").unwrap();
        assert!(t.check("office").is_ok());
        let err = t.check("garage").unwrap_err();
        assert!(err.contains("garage"));
    }

    #[test]
    fn test_regexp() {
        let t = parse("regexp /^[A-Z][a-z]+$/").unwrap();
        assert!(t.check("Berlin").is_ok());
        assert!(t.check("berlin").is_err());
        assert!(parse("regexp /[/").is_err());
    }

    #[test]
    fn test_typedefs() {
        let mut typedefs = HashMap::new();
        typedefs.insert("Id_t".to_string(), "int".to_string());
        typedefs.insert("Alias_t".to_string(), "Id_t".to_string());
        typedefs.insert("Loop_t".to_string(), "Loop_t".to_string());

        assert!(matches!(FieldType::parse("Alias_t", &typedefs).unwrap(), FieldType::Int));
        assert!(FieldType::parse("Loop_t", &typedefs).is_err());
        assert!(FieldType::parse("Unknown_t", &typedefs).is_err());
    }

    #[test]
    fn test_size_constraint() {
        assert_eq!(SizeConstraint::parse("<= 10").unwrap(), SizeConstraint::AtMost(10));
        assert_eq!(SizeConstraint::parse("3").unwrap(), SizeConstraint::Exactly(3));
        assert!(SizeConstraint::parse(">").is_err());
        assert!(SizeConstraint::AtLeast(2).allows(2));
        assert!(!SizeConstraint::LessThan(2).allows(2));
    }
}
