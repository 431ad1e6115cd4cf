use super::{sample_positions, Selector};
use crate::db::Database;
use crate::descriptor::{self, FieldType};
use crate::error::{RecError, Result};
use crate::fex::Fex;
use crate::field::Field;
use crate::record::{Record, RecordElem};
use crate::rset::RecordSet;
use crate::util::{parse_date, parse_real};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
pub struct QueryOptions<'a> {
    /// Record set to query; `None` queries the default set
    pub type_name: Option<String>,
    /// Foreign key field to inner-join on
    pub join: Option<String>,
    pub selector: Selector<'a>,
    pub group_by: Vec<String>,
    pub fex: Option<Fex>,
    /// Sort keys; empty means the descriptor's `%sort`
    pub sort_by: Vec<String>,
    /// Maximum number of records; `None` or `Some(0)` is unlimited
    pub limit: Option<usize>,
    /// Take the limited records as a uniform random sample
    pub random_sample: bool,
    pub seed: Option<u64>,
}

/// Run a query, returning the matching records as a new record set.
pub fn query(db: &Database, opts: &QueryOptions<'_>) -> Result<RecordSet> {
    let rset = match &opts.type_name {
        Some(t) => db.get_record_set_by_type(t)?,
        None => match db.default_set() {
            Some(rset) => rset,
            None => return Ok(RecordSet::new()),
        },
    };

    let (descriptor, source) = match &opts.join {
        Some(field) => join(db, rset, field)?,
        None => (rset.descriptor_record().cloned(), rset.records().to_vec()),
    };

    let selected = opts.selector.positions(&source, 0);
    let mut source: Vec<Option<Record>> = source.into_iter().map(Some).collect();
    let mut records: Vec<Record> = selected
        .into_iter()
        .filter_map(|pos| source[pos].take())
        .collect();

    if !opts.group_by.is_empty() {
        records = group(records, &opts.group_by);
    }

    let sort_by: Vec<String> = if opts.sort_by.is_empty() {
        descriptor
            .as_ref()
            .map(|d| descriptor::Descriptor::from_record(d).sort)
            .unwrap_or_default()
    } else {
        opts.sort_by.clone()
    };
    if !sort_by.is_empty() {
        records.sort_by(|a, b| compare_records(a, b, &sort_by));
    }

    if let Some(limit) = opts.limit.filter(|&n| n > 0) {
        records = if opts.random_sample {
            sample(records, limit, opts.seed)
        } else {
            records.into_iter().take(limit).collect()
        };
    }

    let descriptor = match &opts.fex {
        Some(fex) => {
            records = records
                .iter()
                .map(|r| fex.project(r))
                .filter(|r| r.num_fields() > 0)
                .collect();
            descriptor.map(|d| descriptor::restrict_descriptor(&d, &fex.output_names()))
        }
        None => descriptor,
    };

    let mut result = match descriptor {
        Some(d) => RecordSet::with_descriptor(d),
        None => RecordSet::new(),
    };
    for record in records {
        result.push(record);
    }
    Ok(result)
}

/// Inner join of `rset` with the set its `field` refers to. Each joined
/// record keeps its own fields except `field`, followed by the fields of the
/// referenced record renamed `field_Name`.
fn join(db: &Database, rset: &RecordSet, field: &str) -> Result<(Option<Record>, Vec<Record>)> {
    let type_name = rset.type_name().unwrap_or_default();
    let target = match rset.descriptor().as_ref().and_then(|d| d.field_type(field).cloned()) {
        Some(FieldType::Rec(target)) => target,
        _ => {
            return Err(RecError::InvalidDescriptor(format!(
                "field '{field}' of '{type_name}' is not a foreign key"
            )))
        }
    };
    let other = db.get_record_set_by_type(&target)?;
    let key = other.descriptor().and_then(|d| d.key).ok_or_else(|| {
        RecError::InvalidDescriptor(format!("record set '{target}' has no %key"))
    })?;

    let mut joined = Vec::new();
    for record in rset.iter() {
        for value in record.values(field) {
            for referenced in other.iter().filter(|o| o.first_value(&key) == Some(value)) {
                let mut out = Record::new();
                for elem in record.elems() {
                    match elem {
                        RecordElem::Field(f) if f.name() == field => {}
                        elem => out.elems_mut().push(elem.clone()),
                    }
                }
                for f in referenced.fields() {
                    let mut renamed = f.clone();
                    renamed.set_name(format!("{}_{}", field, f.name()))?;
                    out.push_field(renamed);
                }
                joined.push(out);
            }
        }
    }

    let descriptor = Record::from_fields([Field::new(
        descriptor::REC,
        format!("{type_name}_{target}"),
    )?]);
    Ok((Some(descriptor), joined))
}

/// Sort by the group fields, then fold each run of records sharing the
/// same group values into its first record.
fn group(mut records: Vec<Record>, fields: &[String]) -> Vec<Record> {
    records.sort_by(|a, b| compare_records(a, b, fields));

    let key = |r: &Record| -> Vec<Option<String>> {
        fields
            .iter()
            .map(|f| r.first_value(f).map(String::from))
            .collect()
    };

    let mut grouped: Vec<Record> = Vec::new();
    let mut last_key: Option<Vec<Option<String>>> = None;
    for record in records {
        let k = key(&record);
        match grouped.last_mut() {
            Some(head) if last_key.as_ref() == Some(&k) => {
                for f in record.fields().filter(|f| !fields.iter().any(|g| g == f.name())) {
                    head.push_field(f.clone());
                }
            }
            _ => {
                grouped.push(record);
                last_key = Some(k);
            }
        }
    }
    grouped
}

fn compare_records(a: &Record, b: &Record, fields: &[String]) -> Ordering {
    fields
        .iter()
        .map(|f| compare_values(a.first_value(f), b.first_value(f)))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Numbers order numerically and dates chronologically; anything else
/// orders lexically. Records lacking the field sort first.
pub(crate) fn compare_values(a: Option<&str>, b: Option<&str>) -> Ordering {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (a, b) => return a.is_some().cmp(&b.is_some()),
    };
    if let (Some(x), Some(y)) = (parse_real(a), parse_real(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Some(x), Some(y)) = (parse_date(a), parse_date(b)) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

/// A uniform random subset of `n` records, in their original order.
fn sample(records: Vec<Record>, n: usize, seed: Option<u64>) -> Vec<Record> {
    let picked = sample_positions(records.len(), n, seed);
    let mut records: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|i| records[i].take())
        .collect()
}
