use crate::descriptor::{self, Descriptor};
use crate::field::Comment;
use crate::record::Record;
use std::fmt;

/// All the records of one type, plus the record describing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    descriptor: Option<Record>,
    records: Vec<Record>,
    /// Comments with no record or descriptor to hang on
    comments: Vec<Comment>,
}

impl RecordSet {
    /// An empty, untyped record set.
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn with_descriptor(descriptor: Record) -> Self {
        RecordSet {
            descriptor: Some(descriptor),
            ..RecordSet::default()
        }
    }

    /// Type name declared by `%rec`, or `None` for the default record set.
    pub fn type_name(&self) -> Option<&str> {
        self.descriptor
            .as_ref()?
            .first_value(descriptor::REC)?
            .split_whitespace()
            .next()
    }

    /// Whether this set declares `type_name` (`None` matches the default set).
    pub fn is_type(&self, type_name: Option<&str>) -> bool {
        self.type_name() == type_name
    }

    pub fn descriptor_record(&self) -> Option<&Record> {
        self.descriptor.as_ref()
    }

    pub(crate) fn descriptor_record_mut(&mut self) -> Option<&mut Record> {
        self.descriptor.as_mut()
    }

    pub fn set_descriptor(&mut self, descriptor: Option<Record>) {
        self.descriptor = descriptor;
    }

    /// The schema derived from the descriptor record, computed fresh.
    pub fn descriptor(&self) -> Option<Descriptor> {
        descriptor::derive_descriptor(self)
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn get(&self, pos: usize) -> Option<&Record> {
        self.records.get(pos)
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Insert at `pos`; positions past the end append.
    pub fn insert(&mut self, pos: usize, record: Record) {
        let pos = pos.min(self.records.len());
        self.records.insert(pos, record);
    }

    pub fn remove(&mut self, pos: usize) -> Option<Record> {
        if pos < self.records.len() {
            Some(self.records.remove(pos))
        } else {
            None
        }
    }

    /// Loose comments, written after the records.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub(crate) fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// The records as a JSON array.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.records.iter().map(Record::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::writer::write_record_set(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn record(title: &str) -> Record {
        Record::from_fields([Field::new("Title", title).unwrap()])
    }

    #[test]
    fn test_type_name_from_descriptor() {
        let untyped = RecordSet::new();
        assert_eq!(untyped.type_name(), None);
        assert!(untyped.is_type(None));

        let typed = RecordSet::with_descriptor(Record::from_fields([
            Field::new("%rec", "Book http://example.com/books.rec").unwrap(),
        ]));
        assert_eq!(typed.type_name(), Some("Book"));
        assert!(typed.descriptor().is_some());
    }

    #[test]
    fn test_insert_clamps_position() {
        let mut rset = RecordSet::new();
        rset.push(record("a"));
        rset.insert(10, record("c"));
        rset.insert(1, record("b"));
        let titles: Vec<&str> = rset.iter().filter_map(|r| r.first_value("Title")).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(rset.remove(3).is_none());
        assert_eq!(rset.remove(0).unwrap().first_value("Title"), Some("a"));
    }
}
