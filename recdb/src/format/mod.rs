//! The rec text format: reading files into databases and writing them back.

pub mod parser;
pub mod writer;

pub use parser::{parse_file, parse_record_sets, parse_str};
pub use writer::{write_comment, write_database, write_field, write_record, write_record_set};
