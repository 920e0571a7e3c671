use crate::error::Result;
use crate::types::{Record, Row};
use std::collections::hash_set::{self, HashSet};
use tracing::debug;

/// Set of records keyed by value; inserting an equal record twice is a no-op.
#[derive(Debug, Default, Clone)]
pub struct UniqueRecords {
    records: HashSet<Record>,
}

impl UniqueRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the record was not already present.
    pub fn insert(&mut self, record: Record) -> bool {
        self.records.insert(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for UniqueRecords {
    type Item = Record;
    type IntoIter = hash_set::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<Record> for UniqueRecords {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Canonicalizes data rows into records and collapses exact duplicates.
pub struct Deduplicator;

impl Deduplicator {
    /// Insert one record per data row into `set` and return its cardinality.
    ///
    /// Every row must carry at least twelve fields in record order. A shorter
    /// row is a fatal `MalformedRow` error; rows before it stay inserted.
    pub fn ingest(rows: &[Row], set: &mut UniqueRecords) -> Result<usize> {
        for (index, row) in rows.iter().enumerate() {
            let record = Record::from_row(index, row)?;
            set.insert(record);
        }
        debug!(rows = rows.len(), unique = set.len(), "rows deduplicated");
        Ok(set.len())
    }
}
