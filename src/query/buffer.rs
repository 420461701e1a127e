//! Append-only row accumulation with amortized growth.

use crate::config::DEFAULT_INITIAL_ROW_CAPACITY;
use crate::db::Row;

/// Accumulates rows of a result set whose size is unknown up front.
///
/// Starts at a capacity hint; when an append would overflow, capacity grows
/// to `1.5 * new_len + 1`. Rows keep the order they were pushed in.
#[derive(Debug)]
pub struct RowBuffer {
    rows: Vec<Row>,
    growth_events: usize,
}

impl RowBuffer {
    /// Creates a buffer preallocated for `hint` rows.
    pub fn with_capacity(hint: usize) -> Self {
        Self {
            rows: Vec::with_capacity(hint),
            growth_events: 0,
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: Row) {
        let new_len = self.rows.len() + 1;
        if new_len > self.rows.capacity() {
            let target = new_len * 3 / 2 + 1;
            self.rows.reserve_exact(target - self.rows.len());
            self.growth_events += 1;
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Number of times the buffer had to reallocate.
    pub fn growth_events(&self) -> usize {
        self.growth_events
    }

    /// Rows pushed so far.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Default for RowBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_ROW_CAPACITY)
    }
}
