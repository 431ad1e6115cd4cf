use crate::field::{Comment, Field, Location};
use std::fmt;

/// One element of a record: data or a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordElem {
    Field(Field),
    Comment(Comment),
}

/// An ordered sequence of fields (and the comments interleaved with them).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    elems: Vec<RecordElem>,
}

impl Record {
    pub fn new() -> Self {
        Record { elems: Vec::new() }
    }

    /// Build a record from already-validated fields.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Self {
        Record {
            elems: fields.into_iter().map(RecordElem::Field).collect(),
        }
    }

    pub fn elems(&self) -> &[RecordElem] {
        &self.elems
    }

    pub(crate) fn elems_mut(&mut self) -> &mut Vec<RecordElem> {
        &mut self.elems
    }

    pub fn push_field(&mut self, field: Field) {
        self.elems.push(RecordElem::Field(field));
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.elems.push(RecordElem::Comment(comment));
    }

    /// Insert a field so that it becomes the `pos`-th field of the record.
    /// Positions past the end append.
    pub fn insert_field(&mut self, pos: usize, field: Field) {
        let idx = self
            .elems
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, RecordElem::Field(_)))
            .nth(pos)
            .map(|(i, _)| i)
            .unwrap_or(self.elems.len());
        self.elems.insert(idx, RecordElem::Field(field));
    }

    /// Prepend comments before all other elements.
    pub(crate) fn prepend_comments(&mut self, comments: Vec<Comment>) {
        let mut elems: Vec<RecordElem> = comments.into_iter().map(RecordElem::Comment).collect();
        elems.append(&mut self.elems);
        self.elems = elems;
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.elems.iter().filter_map(|e| match e {
            RecordElem::Field(f) => Some(f),
            RecordElem::Comment(_) => None,
        })
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.elems.iter_mut().filter_map(|e| match e {
            RecordElem::Field(f) => Some(f),
            RecordElem::Comment(_) => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.elems.iter().filter_map(|e| match e {
            RecordElem::Comment(c) => Some(c),
            RecordElem::Field(_) => None,
        })
    }

    pub fn num_fields(&self) -> usize {
        self.fields().count()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Number of occurrences of the field `name`.
    pub fn field_count(&self, name: &str) -> usize {
        self.fields().filter(|f| f.name() == name).count()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields().any(|f| f.name() == name)
    }

    /// The `n`-th (0-based) occurrence of the field `name`.
    pub fn get_field(&self, name: &str, n: usize) -> Option<&Field> {
        self.fields().filter(|f| f.name() == name).nth(n)
    }

    pub fn get_field_mut(&mut self, name: &str, n: usize) -> Option<&mut Field> {
        self.fields_mut().filter(|f| f.name() == name).nth(n)
    }

    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.get_field(name, 0).map(|f| f.value())
    }

    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields()
            .filter(move |f| f.name() == name)
            .map(|f| f.value())
    }

    /// Whether the record has a field with this exact name and value.
    pub fn contains_field(&self, name: &str, value: &str) -> bool {
        self.fields().any(|f| f.name() == name && f.value() == value)
    }

    /// Whether any field of the record has the given value.
    pub fn contains_value(&self, value: &str, case_insensitive: bool) -> bool {
        self.fields().any(|f| {
            if case_insensitive {
                f.value().to_lowercase() == value.to_lowercase()
            } else {
                f.value() == value
            }
        })
    }

    /// Remove the `n`-th (0-based) occurrence of `name`. Returns the removed field.
    pub fn remove_field(&mut self, name: &str, n: usize) -> Option<Field> {
        let idx = self
            .elems
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, RecordElem::Field(f) if f.name() == name))
            .nth(n)
            .map(|(i, _)| i)?;
        match self.elems.remove(idx) {
            RecordElem::Field(f) => Some(f),
            RecordElem::Comment(_) => None,
        }
    }

    /// Remove every occurrence of `name`, returning how many were removed.
    pub fn remove_fields(&mut self, name: &str) -> usize {
        let before = self.elems.len();
        self.elems
            .retain(|e| !matches!(e, RecordElem::Field(f) if f.name() == name));
        before - self.elems.len()
    }

    /// Location of the first field, if the record was read from text.
    pub fn source_location(&self) -> Option<&Location> {
        self.fields().find_map(|f| f.location())
    }

    /// A record is special when it carries any `%` field.
    pub fn is_special(&self) -> bool {
        self.fields().any(|f| f.is_special())
    }

    /// Field names in order of first appearance.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for f in self.fields() {
            if !names.contains(&f.name()) {
                names.push(f.name());
            }
        }
        names
    }

    /// The record as a JSON object. Repeated fields become arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for name in self.field_names() {
            let values: Vec<serde_json::Value> = self
                .values(name)
                .map(|v| serde_json::Value::String(v.to_string()))
                .collect();
            let value = if values.len() == 1 {
                values.into_iter().next().unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Array(values)
            };
            map.insert(name.to_string(), value);
        }
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::writer::write_record(self))
    }
}

impl FromIterator<Field> for Record {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Record::from_fields(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Record {
        Record::from_fields([
            Field::new("Title", "GNU Emacs Manual").unwrap(),
            Field::new("Author", "Richard M. Stallman").unwrap(),
            Field::new("Author", "Another Author").unwrap(),
            Field::new("Location", "home").unwrap(),
        ])
    }

    #[test]
    fn test_occurrences() {
        let rec = book();
        assert_eq!(rec.num_fields(), 4);
        assert_eq!(rec.field_count("Author"), 2);
        assert_eq!(rec.get_field("Author", 1).unwrap().value(), "Another Author");
        assert!(rec.get_field("Author", 2).is_none());
        assert_eq!(rec.first_value("Location"), Some("home"));
        assert_eq!(rec.field_names(), vec!["Title", "Author", "Location"]);
    }

    #[test]
    fn test_contains() {
        let rec = book();
        assert!(rec.contains_field("Location", "home"));
        assert!(!rec.contains_field("Location", "Home"));
        assert!(rec.contains_value("HOME", true));
        assert!(!rec.contains_value("HOME", false));
    }

    #[test]
    fn test_remove_field_keeps_order() {
        let mut rec = book();
        let removed = rec.remove_field("Author", 0).unwrap();
        assert_eq!(removed.value(), "Richard M. Stallman");
        let names: Vec<&str> = rec.fields().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Title", "Author", "Location"]);

        assert_eq!(rec.remove_fields("Author"), 1);
        assert!(!rec.has_field("Author"));
    }

    #[test]
    fn test_insert_field_skips_comments() {
        let mut rec = Record::new();
        rec.push_comment(Comment::new(" leading"));
        rec.push_field(Field::new("A", "1").unwrap());
        rec.push_field(Field::new("C", "3").unwrap());
        rec.insert_field(1, Field::new("B", "2").unwrap());
        let names: Vec<&str> = rec.fields().map(|f| f.name()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(matches!(rec.elems()[0], RecordElem::Comment(_)));
    }

    #[test]
    fn test_to_json_groups_repeated_fields() {
        let json = book().to_json();
        assert_eq!(json["Title"], "GNU Emacs Manual");
        assert_eq!(json["Author"].as_array().unwrap().len(), 2);
    }
}
