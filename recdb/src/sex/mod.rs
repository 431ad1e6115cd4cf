//! Selection expressions: boolean predicates over records.
//!
//! A Sex such as `Location = 'home' && #Author > 1` is compiled once and can
//! then be evaluated against any number of records. Unsubscripted references
//! to a field that occurs several times are tried against every occurrence;
//! the record matches when some combination of occurrences satisfies the
//! expression.

mod eval;
mod lexer;
mod parser;

use crate::error::{EvalError, Result};
use crate::record::Record;
use eval::Env;
use parser::Expr;

/// A compiled selection expression.
#[derive(Debug, Clone)]
pub struct Sex {
    source: String,
    case_insensitive: bool,
    expr: Expr,
    fields: Vec<String>,
}

impl Sex {
    pub fn compile(source: &str) -> Result<Self> {
        Self::compile_with(source, false)
    }

    /// Compile with string comparisons and regex matches optionally
    /// ignoring case.
    pub fn compile_with(source: &str, case_insensitive: bool) -> Result<Self> {
        let expr = parser::parse(source, case_insensitive)?;
        let mut names = Vec::new();
        expr.collect_fields(&mut names);
        let fields = names.into_iter().map(String::from).collect();
        Ok(Sex {
            source: source.to_string(),
            case_insensitive,
            expr,
            fields,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Evaluate against a record.
    ///
    /// Errors are only reported when no combination of field occurrences
    /// made the expression true.
    pub fn eval(&self, record: &Record) -> std::result::Result<bool, EvalError> {
        let counts: Vec<usize> = self.fields.iter().map(|n| record.field_count(n)).collect();
        let mut current = vec![0usize; counts.len()];
        let mut first_error = None;

        loop {
            let bindings = self.bindings(&current, &counts);
            let env = Env {
                record,
                bindings: &bindings,
                case_insensitive: self.case_insensitive,
            };
            match env.truth(&self.expr) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
            if !next_combination(&mut current, &counts) {
                break;
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Whether the record matches. Evaluation errors count as no match.
    pub fn matches(&self, record: &Record) -> bool {
        self.eval(record).unwrap_or_else(|e| {
            log::debug!("Expression '{}' failed on a record: {}", self.source, e);
            false
        })
    }

    /// Evaluate as a value rather than a predicate, using the first
    /// occurrence of every field.
    pub fn eval_str(&self, record: &Record) -> Option<String> {
        let counts: Vec<usize> = self.fields.iter().map(|n| record.field_count(n)).collect();
        let current = vec![0usize; counts.len()];
        let bindings = self.bindings(&current, &counts);
        let env = Env {
            record,
            bindings: &bindings,
            case_insensitive: self.case_insensitive,
        };
        env.eval(&self.expr).ok()?.render()
    }

    fn bindings(&self, current: &[usize], counts: &[usize]) -> Vec<(&str, Option<usize>)> {
        self.fields
            .iter()
            .zip(current.iter().zip(counts))
            .map(|(name, (&i, &count))| (name.as_str(), (count > 0).then_some(i)))
            .collect()
    }
}

/// Step to the next combination of occurrence indices. Returns false once
/// every combination has been visited.
fn next_combination(current: &mut [usize], counts: &[usize]) -> bool {
    for k in 0..current.len() {
        if current[k] + 1 < counts[k] {
            current[k] += 1;
            for c in current.iter_mut().take(k) {
                *c = 0;
            }
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields
            .iter()
            .map(|(n, v)| Field::new(*n, *v).unwrap())
            .collect()
    }

    fn movie() -> Record {
        record(&[
            ("Title", "Metropolis"),
            ("Year", "1927"),
            ("Audio", "English"),
            ("Audio", "German"),
            ("Date", "2011-03-04"),
            ("Rating", "8.3"),
        ])
    }

    fn check(source: &str) -> bool {
        Sex::compile(source).unwrap().eval(&movie()).unwrap()
    }

    #[test]
    fn test_string_equality() {
        assert!(check("Title = 'Metropolis'"));
        assert!(!check("Title = 'metropolis'"));
        let ci = Sex::compile_with("Title = 'metropolis'", true).unwrap();
        assert!(ci.eval(&movie()).unwrap());
    }

    #[test]
    fn test_multiple_occurrences_any_match() {
        assert!(check("Audio = 'German'"));
        assert!(check("Audio = 'English'"));
        assert!(!check("Audio = 'French'"));
        assert!(check("Audio[2] = 'German'"));
        assert!(!check("Audio[1] = 'German'"));
        assert!(check("#Audio = 2"));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(check("Year < 1930"));
        assert!(check("Year = 1927.0"));
        assert!(check("Rating >= 8"));
        assert!(check("Year + 3 = 1930"));
        assert!(check("Year % 100 = 27"));
        assert!(check("-Year < 0"));
    }

    #[test]
    fn test_malformed_numbers_compare_as_text() {
        let record = Record::from_fields([Field::new("Code", "0-12").unwrap()]);
        assert!(!Sex::compile("Code = -10").unwrap().matches(&record));
        assert!(Sex::compile("Code = '0-12'").unwrap().matches(&record));
    }

    #[test]
    fn test_missing_field_is_false() {
        assert!(!check("Director = 'Lang'"));
        assert!(check("Director != 'Lang' || Title"));
        assert!(!check("Director"));
        assert!(check("!Director"));
        assert!(check("#Director = 0"));
    }

    #[test]
    fn test_logic_and_ternary() {
        assert!(check("Year > 1900 && Audio = 'German'"));
        assert!(check("Year > 2000 OR Audio = 'German'"));
        assert!(check("NOT (Year > 2000)"));
        assert!(check("Year > 2000 => Audio = 'Klingon'"));
        assert!(check("(Year > 1900 ? 'old' : 'new') = 'old'"));
    }

    #[test]
    fn test_regex_and_concat() {
        assert!(check("Title ~ '^Metro'"));
        assert!(!check("Title ~ '^metro'"));
        assert!(Sex::compile_with("Title ~ '^metro'", true).unwrap().eval(&movie()).unwrap());
        assert!(check("Title & '/' & Year = 'Metropolis/1927'"));
    }

    #[test]
    fn test_dates() {
        assert!(check("Date << '2012-01-01'"));
        assert!(check("Date >> '2010-12-31'"));
        assert!(check("Date == '2011-03-04'"));
        assert!(matches!(
            Sex::compile("Title << '2012-01-01'").unwrap().eval(&movie()),
            Err(EvalError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_eval_errors() {
        let sex = Sex::compile("Year / 0 = 1").unwrap();
        assert_eq!(sex.eval(&movie()), Err(EvalError::DivisionByZero));
        assert!(!sex.matches(&movie()));

        let sex = Sex::compile("Title > 5").unwrap();
        assert!(matches!(sex.eval(&movie()), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_eval_str() {
        let sex = Sex::compile("Title & ' (' & Year & ')'").unwrap();
        assert_eq!(sex.eval_str(&movie()).as_deref(), Some("Metropolis (1927)"));
        assert_eq!(Sex::compile("Year * 2").unwrap().eval_str(&movie()).as_deref(), Some("3854"));
        assert_eq!(Sex::compile("Director").unwrap().eval_str(&movie()), None);
    }

    #[test]
    fn test_compile_errors() {
        assert!(Sex::compile("Title =").is_err());
        assert!(Sex::compile("Title = 'open").is_err());
        assert!(Sex::compile("Title ~ '['").is_err());
    }

    #[test]
    fn test_combinations_of_two_fields() {
        let rec = record(&[("A", "1"), ("A", "2"), ("B", "2"), ("B", "3")]);
        assert!(Sex::compile("A = B").unwrap().eval(&rec).unwrap());
        assert!(!Sex::compile("A = 3 && B = 1").unwrap().eval(&rec).unwrap());
        assert!(Sex::compile("A = 1 && B = 3").unwrap().eval(&rec).unwrap());
    }
}
