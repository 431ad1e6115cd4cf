use super::Selector;
use crate::db::Database;
use crate::descriptor::FieldType;
use crate::error::{RecError, Result};
use crate::fex::{Fex, FexElem};
use crate::field::{is_valid_field_name, Comment, Field};
use crate::format::writer;
use crate::record::{Record, RecordElem};
use crate::rset::RecordSet;
use crate::util::parse_int;

#[derive(Debug, Clone, Default)]
pub struct InsertOptions<'a> {
    pub type_name: Option<String>,
    /// Records to replace; `All` inserts a new record instead
    pub selector: Selector<'a>,
    /// Where to insert; `None` appends
    pub position: Option<usize>,
    /// Descriptor record to install for `type_name`
    pub descriptor: Option<Record>,
    /// Skip generating `%auto` fields
    pub no_auto: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions<'a> {
    pub type_name: Option<String>,
    pub selector: Selector<'a>,
    /// Records before this position are left alone
    pub position: usize,
    /// Turn deleted records into comments
    pub comment_out: bool,
    /// Drop the record set once it has no records left
    pub remove_empty_set: bool,
}

/// What `set` does to each selected field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SetAction {
    #[default]
    None,
    Rename(String),
    Set(String),
    Add(String),
    SetAdd(String),
    Delete,
    Comment,
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions<'a> {
    pub type_name: Option<String>,
    pub selector: Selector<'a>,
    /// Records before this position are left alone
    pub position: usize,
    pub fex: Fex,
    pub action: SetAction,
}

/// Position of the target set, creating the default set when it is asked
/// for and missing.
fn target_set(db: &mut Database, type_name: Option<&str>) -> Result<usize> {
    if let Some(pos) = db.position_of(type_name) {
        return Ok(pos);
    }
    match type_name {
        Some(t) => Err(RecError::TypeNotFound(t.to_string())),
        None => {
            db.insert_record_set(RecordSet::new(), 0)?;
            Ok(0)
        }
    }
}

/// Insert a record, replace selected records, or install a descriptor.
/// Returns the number of records written.
pub fn insert(db: &mut Database, opts: &InsertOptions<'_>, record: Record) -> Result<usize> {
    let mut written = 0;

    if let Some(descriptor) = &opts.descriptor {
        install_descriptor(db, opts, descriptor.clone())?;
        written += 1;
        if record.num_fields() == 0 {
            return Ok(written);
        }
    }

    let type_name = opts.type_name.as_deref().or(match &opts.descriptor {
        Some(d) => d.first_value(crate::descriptor::REC).and_then(|v| v.split_whitespace().next()),
        None => None,
    });
    let idx = target_set(db, type_name)?;
    let rset = db.get_record_set_mut(idx)?;

    if !opts.selector.is_all() {
        let targets = opts.selector.positions(rset.records(), 0);
        for &pos in &targets {
            rset.records_mut()[pos] = record.clone();
        }
        return Ok(written + targets.len());
    }

    let mut record = record;
    if !opts.no_auto {
        add_auto_fields(rset, &mut record)?;
    }
    let pos = opts.position.unwrap_or(rset.num_records());
    rset.insert(pos, record);
    Ok(written + 1)
}

fn install_descriptor(db: &mut Database, opts: &InsertOptions<'_>, descriptor: Record) -> Result<()> {
    let declared = descriptor
        .first_value(crate::descriptor::REC)
        .and_then(|v| v.split_whitespace().next())
        .map(String::from)
        .ok_or_else(|| RecError::InvalidDescriptor("descriptor lacks a %rec field".into()))?;
    if let Some(t) = &opts.type_name {
        if *t != declared {
            return Err(RecError::InvalidDescriptor(format!(
                "descriptor declares '{declared}' but '{t}' was given"
            )));
        }
    }

    match db.get_record_set_by_type_mut(&declared) {
        Ok(rset) => rset.set_descriptor(Some(descriptor)),
        Err(_) => {
            let pos = opts.position.unwrap_or(db.size());
            db.insert_record_set(RecordSet::with_descriptor(descriptor), pos)?;
        }
    }
    Ok(())
}

/// Generate the `%auto` fields the record does not carry, ahead of its
/// other fields.
fn add_auto_fields(rset: &RecordSet, record: &mut Record) -> Result<()> {
    let Some(desc) = rset.descriptor() else {
        return Ok(());
    };

    let mut inserted = 0;
    for name in &desc.auto {
        if record.has_field(name) {
            continue;
        }
        let value = match desc.field_type(name) {
            None | Some(FieldType::Int) | Some(FieldType::Range { .. }) => {
                let max = rset
                    .iter()
                    .flat_map(|r| r.values(name))
                    .filter_map(parse_int)
                    .max();
                let floor = match desc.field_type(name) {
                    Some(FieldType::Range { min, .. }) => *min,
                    _ => 0,
                };
                max.map_or(floor, |m| m.saturating_add(1).max(floor)).to_string()
            }
            Some(FieldType::Date) => chrono::Local::now().to_rfc2822(),
            Some(FieldType::Uuid) => uuid::Uuid::new_v4().to_string(),
            Some(other) => {
                log::warn!("Cannot generate a value of type '{}' for %auto field '{}'", other, name);
                continue;
            }
        };
        record.insert_field(inserted, Field::new(name.as_str(), value)?);
        inserted += 1;
    }
    Ok(())
}

/// Delete (or comment out) the selected records. Returns how many.
pub fn delete(db: &mut Database, opts: &DeleteOptions<'_>) -> Result<usize> {
    let Some(idx) = db.position_of(opts.type_name.as_deref()) else {
        return match &opts.type_name {
            Some(t) => Err(RecError::TypeNotFound(t.clone())),
            None => Ok(0),
        };
    };
    let rset = db.get_record_set_mut(idx)?;

    let doomed = opts.selector.positions(rset.records(), opts.position);

    for &pos in doomed.iter().rev() {
        let Some(record) = rset.remove(pos) else { continue };
        if opts.comment_out {
            bury(rset, pos, commented_out(&record));
        }
    }

    if opts.remove_empty_set && rset.is_empty() {
        db.remove_record_set(idx)?;
    }
    Ok(doomed.len())
}

/// The record as comments: each run of fields becomes one comment, and
/// the comments it already carried are kept as they are.
fn commented_out(record: &Record) -> Vec<Comment> {
    let mut comments = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    for elem in record.elems() {
        match elem {
            RecordElem::Field(f) => fields.push(writer::write_field(f)),
            RecordElem::Comment(c) => {
                if !fields.is_empty() {
                    comments.push(Comment::new(fields.join("\n")));
                    fields.clear();
                }
                comments.push(c.clone());
            }
        }
    }
    if !fields.is_empty() {
        comments.push(Comment::new(fields.join("\n")));
    }
    comments
}

/// Keep a commented-out record next to where it was: ahead of the record
/// that now takes its place, or after the one before it. A set left with
/// no record or descriptor keeps the comments on its own.
fn bury(rset: &mut RecordSet, pos: usize, comments: Vec<Comment>) {
    if let Some(next) = rset.records_mut().get_mut(pos) {
        next.prepend_comments(comments);
        return;
    }
    let holder = match pos.checked_sub(1) {
        Some(prev) => rset.records_mut().get_mut(prev),
        None => None,
    };
    let holder = match holder {
        Some(record) => Some(record),
        None => rset.descriptor_record_mut(),
    };
    match holder {
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

/// Apply an action to the fields selected by the field expression in every
/// selected record. Returns the number of records changed.
pub fn set(db: &mut Database, opts: &SetOptions<'_>) -> Result<usize> {
    if let SetAction::Rename(name) = &opts.action {
        if !is_valid_field_name(name) {
            return Err(RecError::InvalidFieldName(name.clone()));
        }
    }
    let idx = match db.position_of(opts.type_name.as_deref()) {
        Some(idx) => idx,
        None => {
            return match &opts.type_name {
                Some(t) => Err(RecError::TypeNotFound(t.clone())),
                None => Ok(0),
            }
        }
    };
    let rset = db.get_record_set_mut(idx)?;

    let targets = opts.selector.positions(rset.records(), opts.position);
    let mut changed = 0;
    for pos in targets {
        let record = &mut rset.records_mut()[pos];
        let mut touched = false;
        for elem in opts.fex.elems() {
            touched |= apply(record, elem, &opts.action)?;
        }
        if touched {
            changed += 1;
        }
    }
    Ok(changed)
}

/// Element positions (within `record.elems()`) of the fields `elem` selects.
fn selected(record: &Record, elem: &FexElem) -> Vec<usize> {
    let mut n = 0;
    let mut out = Vec::new();
    for (idx, e) in record.elems().iter().enumerate() {
        if let RecordElem::Field(f) = e {
            if f.name() == elem.field_name {
                if elem.occurrence.selects(n) {
                    out.push(idx);
                }
                n += 1;
            }
        }
    }
    out
}

fn apply(record: &mut Record, elem: &FexElem, action: &SetAction) -> Result<bool> {
    let targets = selected(record, elem);
    let elems = record.elems_mut();

    match action {
        SetAction::None => Ok(false),
        SetAction::Set(value) => {
            set_values(elems, &targets, value);
            Ok(!targets.is_empty())
        }
        SetAction::SetAdd(value) if !targets.is_empty() => {
            set_values(elems, &targets, value);
            Ok(true)
        }
        SetAction::Add(value) | SetAction::SetAdd(value) => {
            elems.push(RecordElem::Field(Field::new(elem.field_name.as_str(), value.as_str())?));
            Ok(true)
        }
        SetAction::Delete => {
            for &idx in targets.iter().rev() {
                elems.remove(idx);
            }
            Ok(!targets.is_empty())
        }
        SetAction::Rename(name) => {
            for &idx in &targets {
                if let RecordElem::Field(f) = &mut elems[idx] {
                    f.set_name(name.as_str())?;
                }
            }
            Ok(!targets.is_empty())
        }
        SetAction::Comment => {
            for &idx in &targets {
                let text = match &elems[idx] {
                    RecordElem::Field(f) => writer::write_field(f),
                    RecordElem::Comment(_) => continue,
                };
                elems[idx] = RecordElem::Comment(Comment::new(text));
            }
            Ok(!targets.is_empty())
        }
    }
}

fn set_values(elems: &mut [RecordElem], targets: &[usize], value: &str) {
    for &idx in targets {
        if let RecordElem::Field(f) = &mut elems[idx] {
            f.set_value(value);
        }
    }
}
