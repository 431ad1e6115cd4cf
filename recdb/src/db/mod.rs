use crate::error::{RecError, Result};
use crate::format::{parser, writer};
use crate::rset::RecordSet;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// An ordered collection of record sets, at most one per type.
/// Loads whole rec files and writes them back whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    record_sets: Vec<RecordSet>,
}

/// Outcome of appending a file to a database.
#[derive(Debug, Default)]
pub struct AppendReport {
    /// Record sets taken from the file
    pub added: usize,
    /// Record sets rejected because their type already existed
    pub skipped: Vec<RecError>,
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    /// Callers guarantee the type is not already present.
    pub(crate) fn push_record_set(&mut self, rset: RecordSet) {
        self.record_sets.push(rset);
    }

    /// Load a rec file. Syntax errors abort the load.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = parser::parse_file(path)?;
        log::debug!(
            "Loaded {} record set(s) from {}",
            db.size(),
            path.display()
        );
        Ok(db)
    }

    /// Append the record sets of another rec file.
    ///
    /// A syntax error in the file fails the whole append and leaves the
    /// database untouched. A record set whose type already exists is skipped
    /// and reported; the others are still added.
    pub fn append(&mut self, path: impl AsRef<Path>) -> Result<AppendReport> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        self.append_str(&content, &path.display().to_string())
    }

    pub fn append_str(&mut self, text: &str, source: &str) -> Result<AppendReport> {
        let sets = parser::parse_record_sets(text, source)?;
        let mut report = AppendReport::default();

        for rset in sets {
            let type_name = rset.type_name().map(String::from);
            if self.find(type_name.as_deref()).is_some() {
                let name = type_name.unwrap_or_else(|| "<default>".to_string());
                log::warn!("Skipping duplicate record set '{}' from {}", name, source);
                report.skipped.push(RecError::DuplicateType(name));
                continue;
            }
            if type_name.is_none() {
                self.record_sets.insert(0, rset);
            } else {
                self.record_sets.push(rset);
            }
            report.added += 1;
        }

        Ok(report)
    }

    /// Write the database to `path`, replacing the file atomically.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.to_rec_string().as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)?;

        log::debug!(
            "Wrote {} record set(s) to {}",
            self.size(),
            path.display()
        );
        Ok(())
    }

    pub fn to_rec_string(&self) -> String {
        writer::write_database(self)
    }

    /// Number of record sets.
    pub fn size(&self) -> usize {
        self.record_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_sets.is_empty()
    }

    pub fn get_record_set(&self, pos: usize) -> Result<&RecordSet> {
        let size = self.size();
        self.record_sets
            .get(pos)
            .ok_or(RecError::IndexOutOfRange { index: pos, size })
    }

    pub fn get_record_set_mut(&mut self, pos: usize) -> Result<&mut RecordSet> {
        let size = self.size();
        self.record_sets
            .get_mut(pos)
            .ok_or(RecError::IndexOutOfRange { index: pos, size })
    }

    pub fn get_record_set_by_type(&self, type_name: &str) -> Result<&RecordSet> {
        self.find(Some(type_name))
            .map(|i| &self.record_sets[i])
            .ok_or_else(|| RecError::TypeNotFound(type_name.to_string()))
    }

    pub fn get_record_set_by_type_mut(&mut self, type_name: &str) -> Result<&mut RecordSet> {
        match self.find(Some(type_name)) {
            Some(i) => Ok(&mut self.record_sets[i]),
            None => Err(RecError::TypeNotFound(type_name.to_string())),
        }
    }

    /// The set of records that precede any descriptor, if there is one.
    pub fn default_set(&self) -> Option<&RecordSet> {
        self.record_sets.iter().find(|r| r.type_name().is_none())
    }

    pub fn default_set_mut(&mut self) -> Option<&mut RecordSet> {
        self.record_sets.iter_mut().find(|r| r.type_name().is_none())
    }

    pub fn type_exists(&self, type_name: &str) -> bool {
        self.find(Some(type_name)).is_some()
    }

    /// Declared type names, in file order.
    pub fn types(&self) -> Vec<&str> {
        self.record_sets.iter().filter_map(|r| r.type_name()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordSet> {
        self.record_sets.iter()
    }

    /// Position of the set with this type (`None` finds the default set).
    pub fn position_of(&self, type_name: Option<&str>) -> Option<usize> {
        self.find(type_name)
    }

    fn find(&self, type_name: Option<&str>) -> Option<usize> {
        self.record_sets.iter().position(|r| r.is_type(type_name))
    }

    /// Insert a record set at `pos`. Positions past the end append, and the
    /// default set always goes first.
    /// Fails if a set of the same type (or a second default set) exists.
    pub fn insert_record_set(&mut self, rset: RecordSet, pos: usize) -> Result<()> {
        let Some(type_name) = rset.type_name() else {
            if self.find(None).is_some() {
                return Err(RecError::DuplicateType("<default>".to_string()));
            }
            self.record_sets.insert(0, rset);
            return Ok(());
        };
        if self.find(Some(type_name)).is_some() {
            return Err(RecError::DuplicateType(type_name.to_string()));
        }
        let pos = pos.min(self.record_sets.len());
        self.record_sets.insert(pos, rset);
        Ok(())
    }

    pub fn remove_record_set(&mut self, pos: usize) -> Result<RecordSet> {
        if pos >= self.record_sets.len() {
            return Err(RecError::IndexOutOfRange {
                index: pos,
                size: self.size(),
            });
        }
        Ok(self.record_sets.remove(pos))
    }
}

impl FromStr for Database {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_str(s, "<string>")
    }
}

impl<'a> IntoIterator for &'a Database {
    type Item = &'a RecordSet;
    type IntoIter = std::slice::Iter<'a, RecordSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.record_sets.iter()
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rec_string())
    }
}
