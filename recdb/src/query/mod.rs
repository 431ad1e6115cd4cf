//! Query and mutation operations over a database.
//!
//! Every operation names a record set (`type_name`, or the default set when
//! `None`) and picks records in it with a [`Selector`].

mod mutate;
mod select;

pub use mutate::{delete, insert, set, DeleteOptions, InsertOptions, SetAction, SetOptions};
pub use select::{query, QueryOptions};

use crate::record::Record;
use crate::sex::Sex;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// How records are chosen. The variants are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub enum Selector<'a> {
    #[default]
    All,
    Sex(&'a Sex),
    /// Inclusive, 0-based ranges of record positions
    Index(Vec<(usize, usize)>),
    /// Records with a field whose value contains `pattern`
    FastString {
        pattern: String,
        case_insensitive: bool,
    },
    /// `count` records picked uniformly at random
    Random { count: usize, seed: Option<u64> },
}

impl Selector<'_> {
    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }

    /// Positions of the selected records among `records[start..]`, in
    /// ascending order.
    pub fn positions(&self, records: &[Record], start: usize) -> Vec<usize> {
        let start = start.min(records.len());
        match self {
            Selector::Random { count, seed } => {
                sample_positions(records.len() - start, *count, *seed)
                    .into_iter()
                    .map(|p| p + start)
                    .collect()
            }
            _ => records
                .iter()
                .enumerate()
                .skip(start)
                .filter(|(pos, r)| self.matches(*pos, r))
                .map(|(pos, _)| pos)
                .collect(),
        }
    }

    /// Whether the record at `pos` is selected on its own merits. Random
    /// selection depends on the whole set, so only [`Selector::positions`]
    /// applies it.
    fn matches(&self, pos: usize, record: &Record) -> bool {
        match self {
            Selector::All | Selector::Random { .. } => true,
            Selector::Sex(sex) => sex.matches(record),
            Selector::Index(ranges) => ranges.iter().any(|&(lo, hi)| pos >= lo && pos <= hi),
            Selector::FastString {
                pattern,
                case_insensitive,
            } => {
                if *case_insensitive {
                    let pattern = pattern.to_lowercase();
                    record
                        .fields()
                        .any(|f| f.value().to_lowercase().contains(&pattern))
                } else {
                    record.fields().any(|f| f.value().contains(pattern.as_str()))
                }
            }
        }
    }
}

/// `n` distinct positions below `len`, uniformly chosen and sorted.
/// A seed makes the choice reproducible.
pub(crate) fn sample_positions(len: usize, n: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut picked = rand::seq::index::sample(&mut rng, len, n.min(len)).into_vec();
    picked.sort_unstable();
    picked
}

/// Parse an index list such as `0,2-4` into inclusive ranges.
pub fn parse_index_list(s: &str) -> Option<Vec<(usize, usize)>> {
    s.split(',')
        .map(str::trim)
        .map(|part| match part.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (lo.trim().parse().ok()?, hi.trim().parse().ok()?);
                (lo <= hi).then_some((lo, hi))
            }
            None => part.parse().ok().map(|n| (n, n)),
        })
        .collect()
}
