use crate::db::Database;
use crate::descriptor::Descriptor;
use crate::field::Location;
use crate::record::Record;
use crate::rset::RecordSet;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A constraint violation found by the integrity checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityError {
    pub type_name: Option<String>,
    /// Position of the offending record within its set
    pub position: Option<usize>,
    pub location: Option<Location>,
    pub message: String,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            return write!(f, "{}: error: {}", location, self.message);
        }
        let type_name = self.type_name.as_deref().unwrap_or("<default>");
        match self.position {
            Some(pos) => write!(f, "{}[{}]: error: {}", type_name, pos, self.message),
            None => write!(f, "{}: error: {}", type_name, self.message),
        }
    }
}

struct Reporter<'a> {
    type_name: Option<&'a str>,
    errors: &'a mut Vec<IntegrityError>,
    count: usize,
}

impl Reporter<'_> {
    fn report(&mut self, position: Option<usize>, location: Option<&Location>, message: String) {
        self.errors.push(IntegrityError {
            type_name: self.type_name.map(String::from),
            position,
            location: location.cloned(),
            message,
        });
        self.count += 1;
    }
}

/// Check every record set of the database against its descriptor.
/// All problems are collected; the return value is how many were found.
pub fn integrity_check(
    db: &Database,
    check_mandatory: bool,
    check_unique: bool,
    errors: &mut Vec<IntegrityError>,
) -> usize {
    db.iter()
        .map(|rset| check_record_set(rset, check_mandatory, check_unique, errors))
        .sum()
}

/// Check one record set. Untyped sets carry no constraints.
pub fn check_record_set(
    rset: &RecordSet,
    check_mandatory: bool,
    check_unique: bool,
    errors: &mut Vec<IntegrityError>,
) -> usize {
    let Some(desc) = rset.descriptor() else {
        return 0;
    };
    let descriptor_location = rset.descriptor_record().and_then(Record::source_location);
    let mut reporter = Reporter {
        type_name: rset.type_name(),
        errors,
        count: 0,
    };

    for problem in &desc.problems {
        reporter.report(None, descriptor_location, format!("invalid descriptor: {problem}"));
    }

    if let Some(size) = desc.size {
        if !size.allows(rset.num_records()) {
            reporter.report(
                None,
                descriptor_location,
                format!(
                    "the record set has {} records, expected {}",
                    rset.num_records(),
                    size
                ),
            );
        }
    }

    let unique_fields = desc.unique_fields();
    let mut seen: HashMap<&str, HashSet<&str>> = HashMap::new();

    for (pos, record) in rset.iter().enumerate() {
        check_fields(&desc, record, Some(pos), check_mandatory, &mut reporter);

        if !check_unique {
            continue;
        }
        for &name in &unique_fields {
            for field in record.fields().filter(|f| f.name() == name) {
                if !seen.entry(name).or_default().insert(field.value()) {
                    reporter.report(
                        Some(pos),
                        field.location(),
                        format!("duplicate value '{}' for unique field '{}'", field.value(), name),
                    );
                }
            }
        }
    }

    reporter.count
}

/// Check a single record against a descriptor, before it joins a set.
pub fn check_record(
    desc: &Descriptor,
    record: &Record,
    position: Option<usize>,
    check_mandatory: bool,
    errors: &mut Vec<IntegrityError>,
) -> usize {
    let mut reporter = Reporter {
        type_name: desc.type_name.as_deref(),
        errors,
        count: 0,
    };
    check_fields(desc, record, position, check_mandatory, &mut reporter);
    reporter.count
}

fn check_fields(
    desc: &Descriptor,
    record: &Record,
    position: Option<usize>,
    check_mandatory: bool,
    reporter: &mut Reporter<'_>,
) {
    let record_location = record.source_location();

    if check_mandatory {
        for name in desc.required_fields() {
            if !record.has_field(name) {
                reporter.report(
                    position,
                    record_location,
                    format!("mandatory field '{name}' is missing"),
                );
            }
        }
    }

    if let Some(key) = &desc.key {
        let count = record.field_count(key);
        if count > 1 {
            reporter.report(
                position,
                record_location,
                format!("key field '{key}' appears {count} times"),
            );
        }
    }

    for name in &desc.prohibited {
        if let Some(field) = record.get_field(name, 0) {
            reporter.report(
                position,
                field.location(),
                format!("prohibited field '{name}' is present"),
            );
        }
    }

    if !desc.allowed.is_empty() {
        let permitted: HashSet<&str> = desc
            .allowed
            .iter()
            .map(String::as_str)
            .chain(desc.required_fields())
            .collect();
        for field in record.fields() {
            if !permitted.contains(field.name()) {
                reporter.report(
                    position,
                    field.location(),
                    format!("field '{}' is not allowed in this record set", field.name()),
                );
            }
        }
    }

    for field in record.fields() {
        if let Some(field_type) = desc.field_type(field.name()) {
            if let Err(reason) = field_type.check(field.value()) {
                reporter.report(
                    position,
                    field.location(),
                    format!("field '{}': {}", field.name(), reason),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::format::parser::parse_str;

    const MOVIES: &str = "\
%rec: Movie
%mandatory: Title Date
%key: Id
%unique: Title
%type: Year int
%type: Audio enum English German French

Id: 1
Title: Metropolis
Year: 1927
Audio: German
Date: 1927-01-10

Id: 2
Title: Solaris
Year: 1972
Audio: Russian

Id: 2
Title: Metropolis
Year: nineteen
";

    fn check(text: &str) -> Vec<IntegrityError> {
        let db = parse_str(text, "movies.rec").unwrap();
        let mut errors = Vec::new();
        let n = integrity_check(&db, true, true, &mut errors);
        assert_eq!(n, errors.len());
        errors
    }

    #[test]
    fn test_errors_serialize() {
        let errors = check(MOVIES);
        let json = serde_json::to_value(&errors[0]).unwrap();
        assert_eq!(json["type_name"], "Movie");
        assert!(json["message"].is_string());
        assert_eq!(json["location"]["source"], "movies.rec");
    }

    #[test]
    fn test_movies_errors() {
        let messages: Vec<String> = check(MOVIES).iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), 6, "{messages:#?}");
        assert!(messages.contains(&"movies.rec:14: error: mandatory field 'Date' is missing".to_string()));
        assert!(messages.contains(&"movies.rec:17: error: field 'Audio': value 'Russian' is not a valid enum English German French".to_string()));
        assert!(messages.iter().any(|m| m.contains("duplicate value '2' for unique field 'Id'")));
        assert!(messages.iter().any(|m| m.contains("duplicate value 'Metropolis'")));
        assert!(messages.iter().any(|m| m.contains("field 'Year': value 'nineteen'")));
    }

    #[test]
    fn test_one_error_per_missing_field() {
        let errors = check("%rec: Book\n%mandatory: Title Author\n\nYear: 1999\n\nTitle: x\n");
        let missing: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            missing,
            vec![
                "mandatory field 'Title' is missing",
                "mandatory field 'Author' is missing",
                "mandatory field 'Author' is missing",
            ]
        );
    }

    #[test]
    fn test_flags_disable_checks() {
        let db = parse_str(MOVIES, "movies.rec").unwrap();
        let mut errors = Vec::new();
        let n = integrity_check(&db, false, false, &mut errors);
        // Only the two type violations remain
        assert_eq!(n, 2, "{errors:#?}");
    }

    #[test]
    fn test_allowed_prohibited_and_key() {
        let text = "\
%rec: Account
%key: Login
%allowed: Name
%prohibit: Password

Login: a
Login: b
Name: x
Password: secret
";
        let messages: Vec<String> = check(text).into_iter().map(|e| e.message).collect();
        assert!(messages.contains(&"key field 'Login' appears 2 times".to_string()));
        assert!(messages.contains(&"prohibited field 'Password' is present".to_string()));
        assert!(messages.contains(&"field 'Password' is not allowed in this record set".to_string()));
    }

    #[test]
    fn test_size_and_descriptor_problems() {
        let errors = check("%rec: Pair\n%size: 2\n%type: X nonsense\n\nA: 1\n");
        assert_eq!(errors.len(), 2, "{errors:#?}");
        assert!(errors.iter().all(|e| e.location == Some(Location::new("movies.rec", 1))));
    }

    #[test]
    fn test_untyped_set_has_no_constraints() {
        assert!(check("A: 1\n\nA: 1\n").is_empty());
    }

    #[test]
    fn test_check_record_without_location() {
        let db = parse_str(MOVIES, "movies.rec").unwrap();
        let desc = db.get_record_set(0).unwrap().descriptor().unwrap();
        let record = Record::from_fields([Field::new("Title", "Stalker").unwrap()]);
        let mut errors = Vec::new();
        assert_eq!(check_record(&desc, &record, Some(3), true, &mut errors), 2);
        assert_eq!(errors[0].to_string(), "Movie[3]: error: mandatory field 'Date' is missing");
    }
}
