use crate::db::Database;
use crate::descriptor;
use crate::error::{RecError, Result};
use crate::field::{is_valid_field_name, Comment, Field, Location};
use crate::record::{Record, RecordElem};
use crate::rset::RecordSet;
use std::path::Path;

/// Parse a rec file into a database.
pub fn parse_file(path: &Path) -> Result<Database> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, &path.display().to_string())
}

/// Parse rec text into a database. `source` names the text in error locations.
pub fn parse_str(text: &str, source: &str) -> Result<Database> {
    let sets = parse_record_sets(text, source)?;
    let mut db = Database::new();
    for rset in sets {
        // Duplicates were rejected while parsing
        db.push_record_set(rset);
    }
    Ok(db)
}

/// Parse rec text into its record sets, in file order.
///
/// Any syntax error, or a type declared twice in the same text, fails the
/// whole parse.
pub fn parse_record_sets(text: &str, source: &str) -> Result<Vec<RecordSet>> {
    let paragraphs = read_paragraphs(text, source)?;

    let mut sets: Vec<RecordSet> = Vec::new();
    let mut pending_comments: Vec<Comment> = Vec::new();

    for paragraph in paragraphs {
        let Paragraph { mut record, line } = paragraph;
        let (is_special, location) = match record.fields().next() {
            Some(first) => (
                first.is_special(),
                first
                    .location()
                    .cloned()
                    .unwrap_or_else(|| Location::new(source, line)),
            ),
            None => {
                pending_comments.extend(record.comments().cloned());
                continue;
            }
        };

        if !pending_comments.is_empty() {
            record.prepend_comments(std::mem::take(&mut pending_comments));
        }

        if is_special {
            let rec_field = record.get_field(descriptor::REC, 0).ok_or_else(|| {
                RecError::parse(location.clone(), "record descriptor lacks a %rec field")
            })?;
            let type_name = rec_field
                .value()
                .split_whitespace()
                .next()
                .ok_or_else(|| RecError::parse(location.clone(), "empty %rec field"))?
                .to_string();
            if sets.iter().any(|s| s.type_name() == Some(type_name.as_str())) {
                return Err(RecError::parse(
                    location,
                    format!("duplicate record set type '{type_name}'"),
                ));
            }
            sets.push(RecordSet::with_descriptor(record));
        } else {
            match sets.last_mut() {
                Some(rset) => rset.push(record),
                None => {
                    let mut rset = RecordSet::new();
                    rset.push(record);
                    sets.push(rset);
                }
            }
        }
    }

    if !pending_comments.is_empty() {
        attach_trailing_comments(&mut sets, pending_comments);
    }

    Ok(sets)
}

fn attach_trailing_comments(sets: &mut Vec<RecordSet>, comments: Vec<Comment>) {
    if sets.is_empty() {
        sets.push(RecordSet::new());
    }
    let Some(rset) = sets.last_mut() else { return };
    let target = match rset.records_mut().last_mut() {
        Some(record) => Some(record),
        None => rset.descriptor_record_mut(),
    };
    match target {
        Some(record) => {
            for comment in comments {
                record.push_comment(comment);
            }
        }
        None => {
            for comment in comments {
                rset.push_comment(comment);
            }
        }
    }
}

/// A blank-line separated block of lines.
struct Paragraph {
    record: Record,
    line: usize,
}

fn read_paragraphs(text: &str, source: &str) -> Result<Vec<Paragraph>> {
    let mut paragraphs = Vec::new();
    let mut current: Option<Paragraph> = None;
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((line_no, line)) = lines.next() {
        let location = || Location::new(source, line_no);

        if line.trim().is_empty() {
            if let Some(p) = current.take() {
                paragraphs.push(p);
            }
            continue;
        }

        let paragraph = current.get_or_insert_with(|| Paragraph {
            record: Record::new(),
            line: line_no,
        });
        let elems = paragraph.record.elems_mut();

        if let Some(text) = line.strip_prefix('#') {
            // Consecutive comment lines form one comment
            match elems.last_mut() {
                Some(RecordElem::Comment(comment)) => {
                    let joined = format!("{}\n{}", comment.text(), text);
                    comment.set_text(joined);
                }
                _ => elems.push(RecordElem::Comment(Comment::new(text))),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            let rest = rest.strip_prefix([' ', '\t']).unwrap_or(rest);
            match elems.last_mut() {
                Some(RecordElem::Field(field)) => {
                    let value = format!("{}\n{}", field.value(), rest);
                    field.set_value(value);
                }
                _ => {
                    return Err(RecError::parse(
                        location(),
                        "continuation line without a preceding field",
                    ))
                }
            }
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(RecError::parse(
                location(),
                format!("expected 'Name: value', found '{line}'"),
            ));
        };
        if !is_valid_field_name(name) {
            return Err(RecError::parse(
                location(),
                format!("invalid field name '{name}'"),
            ));
        }

        let (mut value, mut continued) =
            decode_backslashes(value.trim_start_matches([' ', '\t']));
        while continued {
            match lines.next() {
                Some((_, next)) => {
                    let (more, again) = decode_backslashes(next);
                    value.push_str(&more);
                    continued = again;
                }
                None => {
                    return Err(RecError::parse(
                        location(),
                        "line continuation at end of input",
                    ))
                }
            }
        }

        let field = Field::new(name, value)?.with_location(location());
        elems.push(RecordElem::Field(field));
    }

    if let Some(p) = current.take() {
        paragraphs.push(p);
    }

    Ok(paragraphs)
}

/// Decode the backslashes ending a line of value. A run of `2n` stands
/// for `n` literal backslashes; an odd run also continues the value on the
/// next line.
fn decode_backslashes(line: &str) -> (String, bool) {
    let body = line.trim_end_matches('\\');
    let run = line.len() - body.len();
    let mut text = body.to_string();
    text.extend(std::iter::repeat('\\').take(run / 2));
    (text, run % 2 == 1)
}
