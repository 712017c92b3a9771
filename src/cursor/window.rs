//! Client-side cache of fetched rows
//!
//! A [`RowWindow`] holds a contiguous run of rows identified by absolute
//! 1-based row numbers. Depending on the cursor mode it either grows to
//! hold the whole result or slides so only the latest batch is cached.

use crate::constants::FetchOrientation;
use crate::row::Row;
use crate::session::{FetchBatch, FetchRequest};
use crate::types::RowId;

/// How a fetched batch is merged into the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowUpdate {
    /// Append after the cached rows
    Append,
    /// Drop the cached rows and cache the batch instead
    Replace,
}

/// Cached rows of one cursor
#[derive(Debug, Clone)]
pub struct RowWindow {
    rows: Vec<Row>,
    fetch_size: u32,
    /// Absolute row number of `rows[0]`
    window_start: u64,
    exhausted: bool,
    row_count: Option<u64>,
    fetches: u64,
}

impl RowWindow {
    /// Empty window fetching `fetch_size` rows per batch
    pub fn new(fetch_size: u32) -> Self {
        Self {
            rows: Vec::new(),
            fetch_size: fetch_size.max(1),
            window_start: 1,
            exhausted: false,
            row_count: None,
            fetches: 0,
        }
    }

    /// Rows per batch
    pub fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    /// Absolute row number of the first cached row
    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    /// Row number just past the last cached row
    pub fn window_end(&self) -> u64 {
        self.window_start + self.rows.len() as u64
    }

    /// Number of cached rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows are cached
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The server has no rows left to deliver after the cached ones
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Total number of rows, once known
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// The result set is known to be empty
    pub fn is_empty_result(&self) -> bool {
        self.row_count == Some(0)
    }

    /// Fetch round trips applied so far
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    /// Whether absolute row `row` is cached
    pub fn contains(&self, row: u64) -> bool {
        row >= self.window_start && row < self.window_end()
    }

    /// Cached row by absolute row number
    pub fn get(&self, row: u64) -> Option<&Row> {
        if !self.contains(row) {
            return None;
        }
        self.rows.get((row - self.window_start) as usize)
    }

    pub(crate) fn get_mut(&mut self, row: u64) -> Option<&mut Row> {
        if !self.contains(row) {
            return None;
        }
        let index = (row - self.window_start) as usize;
        self.rows.get_mut(index)
    }

    /// Identity of a cached row
    pub fn row_id(&self, row: u64) -> Option<&RowId> {
        self.get(row).and_then(Row::row_id)
    }

    /// Identities of every cached row, in row order
    pub fn row_ids(&self) -> impl Iterator<Item = Option<&RowId>> + '_ {
        self.rows.iter().map(Row::row_id)
    }

    /// Request for the batch after the last one delivered
    pub(crate) fn next_request(&self) -> FetchRequest {
        FetchRequest::next(self.fetch_size)
    }

    /// Request for a batch starting at `row`
    pub(crate) fn absolute_request(&self, row: u64) -> FetchRequest {
        FetchRequest::absolute(row, self.fetch_size)
    }

    /// Request for the final batch
    pub(crate) fn last_request(&self) -> FetchRequest {
        FetchRequest::last(self.fetch_size)
    }

    /// Merge a fetched batch; returns the number of rows it carried
    pub(crate) fn apply(&mut self, batch: FetchBatch, orientation: FetchOrientation, update: WindowUpdate) -> usize {
        let n = batch.rows.len();
        self.fetches += 1;
        match update {
            WindowUpdate::Append if !self.rows.is_empty() => self.rows.extend(batch.rows),
            _ => {
                self.window_start = batch.start_row.max(1);
                self.rows = batch.rows;
            }
        }

        if let Some(count) = batch.row_count {
            self.row_count = Some(count);
        } else if batch.exhausted && (n > 0 || orientation == FetchOrientation::Next) {
            self.row_count = Some((batch.start_row + n as u64).saturating_sub(1));
        }
        self.exhausted = batch.exhausted;
        n
    }

    pub(crate) fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn rows(start: i64, n: i64) -> Vec<Row> {
        (start..start + n)
            .map(|i| Row::with_row_id(vec![Value::Integer(i)], RowId::new(1, 0, 1, i as u16)))
            .collect()
    }

    fn batch(start_row: u64, n: i64, exhausted: bool) -> FetchBatch {
        FetchBatch {
            start_row,
            rows: rows(start_row as i64, n),
            exhausted,
            row_count: None,
        }
    }

    #[test]
    fn test_append_grows_window() {
        let mut window = RowWindow::new(10);
        window.apply(batch(1, 10, false), FetchOrientation::Next, WindowUpdate::Append);
        window.apply(batch(11, 5, true), FetchOrientation::Next, WindowUpdate::Append);
        assert_eq!(window.len(), 15);
        assert_eq!(window.window_start(), 1);
        assert!(window.is_exhausted());
        assert_eq!(window.row_count(), Some(15));
        assert_eq!(window.get(12).and_then(|r| r.get_i64(0)), Some(12));
        assert_eq!(window.fetches(), 2);
    }

    #[test]
    fn test_replace_slides_window() {
        let mut window = RowWindow::new(10);
        window.apply(batch(1, 10, false), FetchOrientation::Next, WindowUpdate::Replace);
        window.apply(batch(11, 10, false), FetchOrientation::Next, WindowUpdate::Replace);
        assert_eq!(window.window_start(), 11);
        assert!(!window.contains(10));
        assert!(window.contains(20));
        assert_eq!(window.row_count(), None);
        assert_eq!(window.row_id(11), Some(&RowId::new(1, 0, 1, 11)));
    }

    #[test]
    fn test_empty_next_batch_means_empty_result() {
        let mut window = RowWindow::new(10);
        window.apply(batch(1, 0, true), FetchOrientation::Next, WindowUpdate::Replace);
        assert!(window.is_empty_result());
        assert!(!window.contains(1));
    }

    #[test]
    fn test_empty_absolute_batch_leaves_count_unknown() {
        let mut window = RowWindow::new(10);
        window.apply(batch(50, 0, true), FetchOrientation::Absolute, WindowUpdate::Replace);
        assert_eq!(window.row_count(), None);
    }

    #[test]
    fn test_reported_count_wins() {
        let mut window = RowWindow::new(10);
        let mut b = batch(41, 10, false);
        b.row_count = Some(100);
        window.apply(b, FetchOrientation::Absolute, WindowUpdate::Replace);
        assert_eq!(window.row_count(), Some(100));
        assert_eq!(window.window_start(), 41);
        assert_eq!(window.row_ids().count(), 10);
    }
}
