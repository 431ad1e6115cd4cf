//! Field expressions: which fields (and which occurrences) to keep.

use crate::error::{RecError, Result};
use crate::field::is_valid_field_name;
use crate::record::{Record, RecordElem};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Syntax a field expression is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FexKind {
    /// `Name Other`
    Simple,
    /// `Name,Other`
    Csv,
    /// `Name[2],Other[1-3]:Alias`
    Subscripts,
}

/// Which occurrences of a field an element selects. Indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    All,
    Nth(usize),
    /// Inclusive range
    Range(usize, usize),
}

impl Occurrence {
    pub const FIRST: Occurrence = Occurrence::Nth(1);

    /// Whether the 0-based occurrence `n` is selected.
    pub(crate) fn selects(&self, n: usize) -> bool {
        match *self {
            Occurrence::All => true,
            Occurrence::Nth(i) => n + 1 == i,
            Occurrence::Range(lo, hi) => n + 1 >= lo && n < hi,
        }
    }

    fn lower(&self) -> usize {
        match *self {
            Occurrence::All => 0,
            Occurrence::Nth(i) | Occurrence::Range(i, _) => i,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FexElem {
    pub field_name: String,
    pub occurrence: Occurrence,
    /// Name the selected fields take in the projection
    pub rewrite_to: Option<String>,
}

/// A compiled field expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fex {
    elems: Vec<FexElem>,
}

fn subscript_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^\[\]:\s]+)(?:\[(\d+)(?:-(\d+))?\])?(?::(\S+))?$").expect("static regex")
    })
}

fn check_name(name: &str) -> Result<()> {
    if is_valid_field_name(name) {
        Ok(())
    } else {
        Err(RecError::Compile(format!("invalid field name '{name}' in field expression")))
    }
}

impl Fex {
    pub fn new(source: &str, kind: FexKind) -> Result<Self> {
        let elems = match kind {
            FexKind::Simple => source
                .split_whitespace()
                .map(|name| {
                    check_name(name)?;
                    Ok(FexElem {
                        field_name: name.to_string(),
                        occurrence: Occurrence::All,
                        rewrite_to: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            FexKind::Csv => csv_parts(source)?
                .into_iter()
                .map(|name| {
                    check_name(name)?;
                    Ok(FexElem {
                        field_name: name.to_string(),
                        occurrence: Occurrence::All,
                        rewrite_to: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            FexKind::Subscripts => csv_parts(source)?
                .into_iter()
                .map(parse_subscripted)
                .collect::<Result<Vec<_>>>()?,
        };

        if elems.is_empty() {
            return Err(RecError::Compile("empty field expression".into()));
        }
        Ok(Fex { elems })
    }

    /// Whether `source` is a valid field expression of the given kind.
    pub fn check(source: &str, kind: FexKind) -> bool {
        Self::new(source, kind).is_ok()
    }

    pub fn size(&self) -> usize {
        self.elems.len()
    }

    pub fn get(&self, i: usize) -> Option<&FexElem> {
        self.elems.get(i)
    }

    pub fn elems(&self) -> &[FexElem] {
        &self.elems
    }

    pub fn append(&mut self, name: &str, occurrence: Occurrence) -> Result<()> {
        check_name(name)?;
        self.elems.push(FexElem {
            field_name: name.to_string(),
            occurrence,
            rewrite_to: None,
        });
        Ok(())
    }

    pub fn member(&self, name: &str, occurrence: Occurrence) -> bool {
        self.elems
            .iter()
            .any(|e| e.field_name == name && e.occurrence == occurrence)
    }

    /// Order the elements by their lowest selected index.
    pub fn sort(&mut self) {
        self.elems.sort_by_key(|e| e.occurrence.lower());
    }

    /// Distinct field names, in expression order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for elem in &self.elems {
            if !names.contains(&elem.field_name.as_str()) {
                names.push(&elem.field_name);
            }
        }
        names
    }

    /// Names the projected fields carry, after rewrites.
    pub fn output_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for elem in &self.elems {
            let name = elem.rewrite_to.as_deref().unwrap_or(&elem.field_name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn to_string_kind(&self, kind: FexKind) -> String {
        match kind {
            FexKind::Simple => self
                .elems
                .iter()
                .map(|e| e.field_name.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            FexKind::Csv => self
                .elems
                .iter()
                .map(|e| e.field_name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            FexKind::Subscripts => self
                .elems
                .iter()
                .map(|e| {
                    let mut s = e.field_name.clone();
                    match e.occurrence {
                        Occurrence::All => {}
                        Occurrence::Nth(n) => s.push_str(&format!("[{n}]")),
                        Occurrence::Range(lo, hi) => s.push_str(&format!("[{lo}-{hi}]")),
                    }
                    if let Some(alias) = &e.rewrite_to {
                        s.push(':');
                        s.push_str(alias);
                    }
                    s
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// A new record holding the selected fields, in expression order.
    /// Names the record does not have contribute nothing, and a field
    /// selected by several elements appears once.
    pub fn project(&self, record: &Record) -> Record {
        let mut out = Record::new();
        let mut taken: HashSet<usize> = HashSet::new();

        for elem in &self.elems {
            let mut occurrence = 0;
            for (idx, e) in record.elems().iter().enumerate() {
                let RecordElem::Field(field) = e else { continue };
                if field.name() != elem.field_name {
                    continue;
                }
                let n = occurrence;
                occurrence += 1;
                if !elem.occurrence.selects(n) || !taken.insert(idx) {
                    continue;
                }
                let mut field = field.clone();
                if let Some(alias) = &elem.rewrite_to {
                    // Aliases were validated at compile time
                    if field.set_name(alias.as_str()).is_err() {
                        continue;
                    }
                }
                out.push_field(field);
            }
        }

        out
    }
}

fn csv_parts(source: &str) -> Result<Vec<&str>> {
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }
    source
        .split(',')
        .map(str::trim)
        .map(|part| {
            if part.is_empty() {
                Err(RecError::Compile(format!("empty element in field expression '{source}'")))
            } else {
                Ok(part)
            }
        })
        .collect()
}

fn parse_subscripted(part: &str) -> Result<FexElem> {
    let caps = subscript_regex()
        .captures(part)
        .ok_or_else(|| RecError::Compile(format!("invalid field expression element '{part}'")))?;

    let name = &caps[1];
    check_name(name)?;

    let index = |i: usize| -> Result<Option<usize>> {
        match caps.get(i) {
            Some(m) => m
                .as_str()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| RecError::Compile(format!("invalid subscript in '{part}'"))),
            None => Ok(None),
        }
    };

    let occurrence = match (index(2)?, index(3)?) {
        (None, _) => Occurrence::All,
        (Some(0), _) | (_, Some(0)) => {
            return Err(RecError::Compile(format!("subscripts start at 1 in '{part}'")))
        }
        (Some(n), None) => Occurrence::Nth(n),
        (Some(lo), Some(hi)) if lo <= hi => Occurrence::Range(lo, hi),
        (Some(_), Some(_)) => {
            return Err(RecError::Compile(format!("empty subscript range in '{part}'")))
        }
    };

    let rewrite_to = match caps.get(4) {
        Some(alias) => {
            check_name(alias.as_str())?;
            Some(alias.as_str().to_string())
        }
        None => None,
    };

    Ok(FexElem {
        field_name: name.to_string(),
        occurrence,
        rewrite_to,
    })
}

impl fmt::Display for Fex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_kind(FexKind::Subscripts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn book() -> Record {
        [
            ("Title", "Good Omens"),
            ("Author", "Terry Pratchett"),
            ("Author", "Neil Gaiman"),
            ("Author", "Someone Else"),
            ("Year", "1990"),
        ]
        .iter()
        .map(|(n, v)| Field::new(*n, *v).unwrap())
        .collect()
    }

    fn values(record: &Record) -> Vec<(String, String)> {
        record
            .fields()
            .map(|f| (f.name().to_string(), f.value().to_string()))
            .collect()
    }

    #[test]
    fn test_simple_and_csv() {
        let simple = Fex::new("Title  Author", FexKind::Simple).unwrap();
        let csv = Fex::new("Title, Author", FexKind::Csv).unwrap();
        assert_eq!(simple, csv);
        assert_eq!(simple.size(), 2);
        assert_eq!(simple.get(1).unwrap().occurrence, Occurrence::All);
        assert!(!Fex::check("Title,,Author", FexKind::Csv));
        assert!(!Fex::check("", FexKind::Simple));
        assert!(!Fex::check("Bad-Name", FexKind::Simple));
    }

    #[test]
    fn test_subscripts() {
        let fex = Fex::new("Author[2],Author[1-2]:Writer,Year", FexKind::Subscripts).unwrap();
        assert_eq!(fex.get(0).unwrap().occurrence, Occurrence::Nth(2));
        assert_eq!(fex.get(1).unwrap().occurrence, Occurrence::Range(1, 2));
        assert_eq!(fex.get(1).unwrap().rewrite_to.as_deref(), Some("Writer"));
        assert_eq!(fex.to_string(), "Author[2],Author[1-2]:Writer,Year");
        assert!(!Fex::check("Author[0]", FexKind::Subscripts));
        assert!(!Fex::check("Author[3-1]", FexKind::Subscripts));
        assert!(!Fex::check("Author[x]", FexKind::Subscripts));
    }

    #[test]
    fn test_project_order_and_occurrences() {
        let fex = Fex::new("Year,Author[2]", FexKind::Subscripts).unwrap();
        assert_eq!(
            values(&fex.project(&book())),
            vec![
                ("Year".into(), "1990".into()),
                ("Author".into(), "Neil Gaiman".into())
            ]
        );

        let range = Fex::new("Author[2-3]", FexKind::Subscripts).unwrap();
        assert_eq!(range.project(&book()).field_count("Author"), 2);
    }

    #[test]
    fn test_project_rewrites_names() {
        let fex = Fex::new("Author[1]:Writer", FexKind::Subscripts).unwrap();
        let projected = fex.project(&book());
        assert_eq!(projected.first_value("Writer"), Some("Terry Pratchett"));
        assert!(!projected.has_field("Author"));
    }

    #[test]
    fn test_project_unknown_names_contribute_nothing() {
        let fex = Fex::new("Publisher Title", FexKind::Simple).unwrap();
        assert_eq!(values(&fex.project(&book())), vec![("Title".into(), "Good Omens".into())]);
    }

    #[test]
    fn test_project_is_idempotent() {
        for source in ["Author Title", "Title Author Title", "Year"] {
            let fex = Fex::new(source, FexKind::Simple).unwrap();
            let once = fex.project(&book());
            assert_eq!(fex.project(&once), once, "{source}");
        }
    }

    #[test]
    fn test_subscripted_projection_renumbers() {
        let first = Fex::new("Title,Author[1]", FexKind::Subscripts).unwrap();
        let once = first.project(&book());
        assert_eq!(first.project(&once), once);

        // The second author is the only one left, so it is now the first
        let second = Fex::new("Author[2]", FexKind::Subscripts).unwrap();
        let once = second.project(&book());
        assert_eq!(once.first_value("Author"), Some("Neil Gaiman"));
        assert_eq!(once.num_fields(), 1);
        assert_eq!(second.project(&once).num_fields(), 0);

        let aliased = Fex::new("Title:Name", FexKind::Subscripts).unwrap();
        let once = aliased.project(&book());
        assert_eq!(once.first_value("Name"), Some("Good Omens"));
        assert_eq!(aliased.project(&once).num_fields(), 0);
    }

    #[test]
    fn test_append_member_sort() {
        let mut fex = Fex::new("Author[3],Title", FexKind::Subscripts).unwrap();
        fex.append("Year", Occurrence::FIRST).unwrap();
        assert!(fex.member("Year", Occurrence::Nth(1)));
        assert!(!fex.member("Year", Occurrence::All));
        assert!(fex.append("not valid", Occurrence::All).is_err());

        fex.sort();
        assert_eq!(fex.to_string_kind(FexKind::Csv), "Title,Year,Author");
        assert_eq!(fex.names(), vec!["Title", "Year", "Author"]);
    }
}
