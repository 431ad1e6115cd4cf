//! A plain-text record database.
//!
//! Databases are read from and written to the rec format: blank-line
//! separated records of `Name: value` fields, grouped into typed record sets
//! by `%rec` descriptors. On top of that model sit selection expressions
//! ([`Sex`]), field expressions ([`Fex`]), the query and mutation operations
//! in [`query`] and the descriptor-driven [`integrity`] checker.

pub mod db;
pub mod descriptor;
pub mod error;
pub mod fex;
pub mod field;
pub mod format;
pub mod integrity;
pub mod query;
pub mod record;
pub mod rset;
pub mod sex;
pub mod util;

pub use db::{AppendReport, Database};
pub use descriptor::{derive_descriptor, Descriptor, FieldType};
pub use error::{EvalError, RecError, Result};
pub use fex::{Fex, FexElem, FexKind, Occurrence};
pub use field::{Comment, Field, Location};
pub use integrity::{integrity_check, IntegrityError};
pub use query::{
    delete, insert, query, set, DeleteOptions, InsertOptions, QueryOptions, Selector, SetAction,
    SetOptions,
};
pub use record::{Record, RecordElem};
pub use rset::RecordSet;
pub use sex::Sex;
