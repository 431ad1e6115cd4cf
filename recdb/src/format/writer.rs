use crate::db::Database;
use crate::field::{Comment, Field};
use crate::record::{Record, RecordElem};
use crate::rset::RecordSet;

/// `Name: value`, with `+` continuation lines for multi-line values.
///
/// Backslashes ending the first line are doubled so the reader does not
/// take them for a line continuation. Blanks leading the first line are
/// dropped by the reader, as the rec format does not keep them.
pub fn write_field(field: &Field) -> String {
    let mut out = String::with_capacity(field.name().len() + field.value().len() + 2);
    out.push_str(field.name());
    out.push(':');

    let mut lines = field.value().split('\n');
    if let Some(first) = lines.next() {
        if !first.is_empty() {
            out.push(' ');
            out.push_str(first);
            let trailing = first.len() - first.trim_end_matches('\\').len();
            out.extend(std::iter::repeat('\\').take(trailing));
        }
    }
    for line in lines {
        out.push_str("\n+");
        if !line.is_empty() {
            out.push(' ');
            out.push_str(line);
        }
    }
    out
}

/// One `#` line per line of comment text.
pub fn write_comment(comment: &Comment) -> String {
    comment
        .text()
        .split('\n')
        .map(|line| format!("#{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_record(record: &Record) -> String {
    record
        .elems()
        .iter()
        .map(|elem| match elem {
            RecordElem::Field(f) => write_field(f),
            RecordElem::Comment(c) => write_comment(c),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The descriptor (if any) followed by the records, one blank line apart.
/// Loose comments close the set.
pub fn write_record_set(rset: &RecordSet) -> String {
    let mut paragraphs: Vec<String> = rset
        .descriptor_record()
        .into_iter()
        .chain(rset.iter())
        .filter(|r| !r.is_empty())
        .map(write_record)
        .collect();
    if !rset.comments().is_empty() {
        let comments: Vec<String> = rset.comments().iter().map(write_comment).collect();
        paragraphs.push(comments.join("\n"));
    }
    paragraphs.join("\n\n")
}

/// The whole database as rec text. An empty database writes nothing.
///
/// The default record set comes first: records written after a descriptor
/// would read back as part of that typed set.
pub fn write_database(db: &Database) -> String {
    let (untyped, typed): (Vec<&RecordSet>, Vec<&RecordSet>) =
        db.iter().partition(|rset| rset.type_name().is_none());
    let sets: Vec<String> = untyped
        .into_iter()
        .chain(typed)
        .map(write_record_set)
        .filter(|s| !s.is_empty())
        .collect();
    if sets.is_empty() {
        return String::new();
    }
    let mut out = sets.join("\n\n");
    out.push('\n');
    out
}
