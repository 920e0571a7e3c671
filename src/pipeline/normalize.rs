use crate::constants::{MEMO_COLUMN, MISSING_VALUE};
use crate::types::Row;
use tracing::debug;

/// Column-level clean-up applied to the raw table before canonicalization.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    as_of: String,
}

impl FieldNormalizer {
    /// `as_of` is the import date appended to every row (MM/DD/YYYY).
    pub fn new(as_of: impl Into<String>) -> Self {
        Self { as_of: as_of.into() }
    }

    pub fn as_of(&self) -> &str {
        &self.as_of
    }

    /// Drop the `Memo` column and append the as-of date, header included.
    ///
    /// Only applies when the header names a `Memo` column (first match wins);
    /// otherwise every row keeps its original shape. The header receives the
    /// date itself as its trailing label, not an `import_date` name.
    ///
    /// Returns the removed column index, if any.
    pub fn strip_memo_and_stamp(&self, rows: &mut [Row]) -> Option<usize> {
        let memo_index = rows
            .first()?
            .iter()
            .position(|header| header == MEMO_COLUMN)?;

        for row in rows.iter_mut() {
            if memo_index < row.len() {
                row.remove(memo_index);
            }
            row.push(self.as_of.clone());
        }

        debug!(memo_index, rows = rows.len(), "memo column removed");
        Some(memo_index)
    }

    /// Replace every blank (whitespace-only) field with `missing`.
    ///
    /// Expects data rows only; the caller has already split off the header.
    /// Idempotent. Returns the number of fields replaced.
    pub fn fill_blanks(rows: &mut [Row]) -> usize {
        let mut replaced = 0;
        for row in rows.iter_mut() {
            for field in row.iter_mut() {
                if field.trim().is_empty() {
                    *field = MISSING_VALUE.to_string();
                    replaced += 1;
                }
            }
        }
        replaced
    }
}
