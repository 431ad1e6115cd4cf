//! Record descriptors - the schema of a record set.
//!
//! A descriptor is never stored on its own. It is derived on demand from the
//! special (`%`-prefixed) fields of a record set's descriptor record, so it can
//! never go stale when that record changes.

mod types;

pub use types::{FieldType, SizeConstraint};

use crate::field::Field;
use crate::record::Record;
use crate::rset::RecordSet;
use std::collections::HashMap;

pub const REC: &str = "%rec";
pub const MANDATORY: &str = "%mandatory";
pub const ALLOWED: &str = "%allowed";
pub const PROHIBIT: &str = "%prohibit";
pub const KEY: &str = "%key";
pub const UNIQUE: &str = "%unique";
pub const CONFIDENTIAL: &str = "%confidential";
pub const TYPE: &str = "%type";
pub const TYPEDEF: &str = "%typedef";
pub const AUTO: &str = "%auto";
pub const SORT: &str = "%sort";
pub const SIZE: &str = "%size";
pub const DOC: &str = "%doc";

const LIST_FIELDS: &[&str] = &[MANDATORY, ALLOWED, PROHIBIT, UNIQUE, CONFIDENTIAL, AUTO, SORT];

/// Schema constraints for one record type.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    pub type_name: Option<String>,
    /// Second word of `%rec`, naming an external source of records
    pub remote: Option<String>,
    pub mandatory: Vec<String>,
    pub allowed: Vec<String>,
    pub prohibited: Vec<String>,
    pub key: Option<String>,
    pub unique: Vec<String>,
    pub confidential: Vec<String>,
    pub types: HashMap<String, FieldType>,
    pub auto: Vec<String>,
    pub sort: Vec<String>,
    pub size: Option<SizeConstraint>,
    pub doc: Option<String>,
    /// Problems found while reading the descriptor record
    pub problems: Vec<String>,
    record: Record,
}

/// Derive the descriptor of a record set, if it has a descriptor record.
pub fn derive_descriptor(rset: &RecordSet) -> Option<Descriptor> {
    rset.descriptor_record().map(Descriptor::from_record)
}

impl Descriptor {
    /// Read the special fields of a descriptor record.
    pub fn from_record(record: &Record) -> Self {
        let mut desc = Descriptor {
            record: record.clone(),
            ..Descriptor::default()
        };

        // Typedefs first so %type can refer to them regardless of order
        let mut typedefs: HashMap<String, String> = HashMap::new();
        for field in record.fields().filter(|f| f.name() == TYPEDEF) {
            match field.value().trim().split_once(char::is_whitespace) {
                Some((name, def)) => {
                    typedefs.insert(name.to_string(), def.trim().to_string());
                }
                None => desc
                    .problems
                    .push(format!("%typedef '{}' has no type description", field.value())),
            }
        }

        for field in record.fields() {
            let value = field.value().trim();
            match field.name() {
                REC => {
                    if desc.type_name.is_some() {
                        desc.problems.push("more than one %rec field".into());
                        continue;
                    }
                    let mut words = value.split_whitespace();
                    desc.type_name = words.next().map(String::from);
                    desc.remote = words.next().map(String::from);
                }
                MANDATORY => desc.mandatory.extend(names(value)),
                ALLOWED => desc.allowed.extend(names(value)),
                PROHIBIT => desc.prohibited.extend(names(value)),
                UNIQUE => desc.unique.extend(names(value)),
                CONFIDENTIAL => desc.confidential.extend(names(value)),
                AUTO => desc.auto.extend(names(value)),
                SORT => desc.sort.extend(names(value)),
                KEY => {
                    if desc.key.is_some() {
                        desc.problems.push("more than one %key field".into());
                        continue;
                    }
                    let mut keys = names(value);
                    desc.key = keys.next();
                    if keys.next().is_some() {
                        desc.problems.push(format!("%key '{value}' names more than one field"));
                    }
                }
                TYPE => desc.read_type(value, &typedefs),
                SIZE => match SizeConstraint::parse(value) {
                    Ok(size) => desc.size = Some(size),
                    Err(e) => desc.problems.push(e),
                },
                DOC => desc.doc = Some(field.value().to_string()),
                _ => {}
            }
        }

        if desc.type_name.is_none() {
            desc.problems.push("descriptor has no %rec field".into());
        }

        desc
    }

    fn read_type(&mut self, value: &str, typedefs: &HashMap<String, String>) {
        let Some((fields, description)) = value.split_once(char::is_whitespace) else {
            self.problems
                .push(format!("%type '{value}' has no type description"));
            return;
        };
        match FieldType::parse(description, typedefs) {
            Ok(field_type) => {
                for name in fields.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    self.types.insert(name.to_string(), field_type.clone());
                }
            }
            Err(e) => self.problems.push(format!("%type {fields}: {e}")),
        }
    }

    /// The descriptor record this was read from.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Whether the descriptor record has the field `name` with `value`,
    /// either as its whole value or as one of the names it lists.
    pub fn contains_field(&self, name: &str, value: &str) -> bool {
        self.record
            .fields()
            .filter(|f| f.name() == name)
            .any(|f| f.value().trim() == value || names(f.value()).any(|n| n == value))
    }

    /// A copy of the descriptor record limited to `fields`.
    pub fn restrict_to(&self, fields: &[&str]) -> Record {
        restrict_descriptor(&self.record, fields)
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.types.get(name)
    }

    pub fn is_confidential(&self, name: &str) -> bool {
        self.confidential.iter().any(|c| c == name)
    }

    /// Fields every record must carry: the mandatory ones and the key.
    pub fn required_fields(&self) -> Vec<&str> {
        let mut required: Vec<&str> = self.mandatory.iter().map(String::as_str).collect();
        if let Some(key) = &self.key {
            if !required.contains(&key.as_str()) {
                required.push(key);
            }
        }
        required
    }

    /// Fields whose values must not repeat across records: `%unique` and the key.
    pub fn unique_fields(&self) -> Vec<&str> {
        let mut unique: Vec<&str> = self.unique.iter().map(String::as_str).collect();
        if let Some(key) = &self.key {
            if !unique.contains(&key.as_str()) {
                unique.push(key);
            }
        }
        unique
    }
}

fn names(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Build a descriptor record restricted to `fields`, for result sets whose
/// records were narrowed by a field expression. Constraints on fields that
/// are no longer present are dropped, and so is `%size`.
pub fn restrict_descriptor(record: &Record, fields: &[&str]) -> Record {
    let keep = |name: &str| fields.contains(&name);
    let mut restricted = Record::new();

    for field in record.fields() {
        let name = field.name();
        if LIST_FIELDS.contains(&name) {
            let kept: Vec<String> = names(field.value()).filter(|n| keep(n)).collect();
            if !kept.is_empty() {
                push_special(&mut restricted, field, kept.join(" "));
            }
        } else if name == KEY {
            if names(field.value()).all(|n| keep(&n)) {
                restricted.push_field(field.clone());
            }
        } else if name == TYPE {
            let value = field.value().trim();
            if let Some((list, description)) = value.split_once(char::is_whitespace) {
                let kept: Vec<&str> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|n| keep(n))
                    .collect();
                if !kept.is_empty() {
                    push_special(&mut restricted, field, format!("{} {}", kept.join(","), description.trim()));
                }
            }
        } else if name != SIZE {
            restricted.push_field(field.clone());
        }
    }

    restricted
}

fn push_special(record: &mut Record, original: &Field, value: String) {
    let mut field = original.clone();
    field.set_value(value);
    record.push_field(field);
}
