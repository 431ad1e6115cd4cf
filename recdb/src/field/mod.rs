// Fields - the name/value pairs records are made of

use crate::error::{RecError, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Where a field was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub source: String,
    /// 1-based line number
    pub line: usize,
}

impl Location {
    pub fn new(source: impl Into<String>, line: usize) -> Self {
        Location {
            source: source.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

/// An association between a label and a value.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    value: String,
    location: Option<Location>,
}

fn field_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^%?[A-Za-z][A-Za-z0-9_]*$").expect("static regex"))
}

/// Whether `name` is a syntactically valid field name.
pub fn is_valid_field_name(name: &str) -> bool {
    field_name_regex().is_match(name)
}

impl Field {
    /// Create a field, validating its name.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !is_valid_field_name(&name) {
            return Err(RecError::InvalidFieldName(name));
        }
        Ok(Field {
            name,
            value: value.into(),
            location: None,
        })
    }

    pub(crate) fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_valid_field_name(&name) {
            return Err(RecError::InvalidFieldName(name));
        }
        self.name = name;
        Ok(())
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    /// Special fields carry schema metadata (`%rec`, `%key`, ...).
    pub fn is_special(&self) -> bool {
        self.name.starts_with('%')
    }
}

/// Two fields are equal when their names and values match exactly.
pub fn field_equal(a: &Field, b: &Field) -> bool {
    a.name == b.name && a.value == b.value
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        field_equal(self, other)
    }
}

impl Eq for Field {}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::writer::write_field(self))
    }
}

/// A block of `#` comment text kept inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Comment { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

pub fn comment_equal(a: &Comment, b: &Comment) -> bool {
    a.text == b.text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_equality_ignores_location() {
        let a = Field::new("Author", "Richard M. Stallman").unwrap();
        let b = Field::new("Author", "Richard M. Stallman")
            .unwrap()
            .with_location(Location::new("books.rec", 4));
        assert!(field_equal(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_equality_is_case_sensitive() {
        let a = Field::new("Author", "Terry Pratchett").unwrap();
        let b = Field::new("author", "Terry Pratchett").unwrap();
        let c = Field::new("Author", "terry pratchett").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(Field::new("", "x").is_err());
        assert!(Field::new("1abc", "x").is_err());
        assert!(Field::new("Mike Wazowski", "x").is_err());
        assert!(Field::new("a-b", "x").is_err());
        assert!(Field::new("%rec", "Book").is_ok());
        assert!(Field::new("Publication_Year", "1999").is_ok());
    }

    #[test]
    fn test_set_name_and_value() {
        let mut field = Field::new("Skater", "Terry Pratchett").unwrap();
        field.set_value("The Friendly Monster");
        assert_eq!(field.value(), "The Friendly Monster");

        assert!(field.set_name("Not valid").is_err());
        assert_eq!(field.name(), "Skater");
        field.set_name("Monster").unwrap();
        assert_eq!(field.name(), "Monster");
    }

    #[test]
    fn test_special_field() {
        assert!(Field::new("%mandatory", "Title").unwrap().is_special());
        assert!(!Field::new("Title", "Dune").unwrap().is_special());
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new("movies.rec", 12);
        assert_eq!(loc.to_string(), "movies.rec:12");
    }
}
