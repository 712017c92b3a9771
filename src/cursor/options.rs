use crate::constants::{Concurrency, ResultSetType};

/// Options for opening a cursor.
///
/// # Example
///
/// ```rust
/// use ob_client::{Concurrency, CursorOptions, ResultSetType};
///
/// let options = CursorOptions::scroll_sensitive()
///     .with_fetch_size(20)
///     .with_concurrency(Concurrency::Updatable);
/// assert_eq!(options.result_set_type, ResultSetType::ScrollSensitive);
/// assert!(!options.is_streaming());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorOptions {
    /// Scroll mode
    pub result_set_type: ResultSetType,
    /// Concurrency mode
    pub concurrency: Concurrency,
    /// Rows per round trip; 0 uses the connection default. A forward-only
    /// cursor with a non-zero fetch size streams its rows.
    pub fetch_size: u32,
    /// Per-cursor override of the in-row LOB threshold
    pub lob_prefetch_size: Option<u32>,
}

impl CursorOptions {
    /// Create new cursor options (forward-only, read-only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward-only streaming cursor fetching `fetch_size` rows at a time
    pub fn streaming(fetch_size: u32) -> Self {
        Self::new().with_fetch_size(fetch_size.max(1))
    }

    /// Scroll-insensitive cursor
    pub fn scroll_insensitive() -> Self {
        Self::new().with_result_set_type(ResultSetType::ScrollInsensitive)
    }

    /// Scroll-sensitive cursor
    pub fn scroll_sensitive() -> Self {
        Self::new().with_result_set_type(ResultSetType::ScrollSensitive)
    }

    /// Set the scroll mode
    pub fn with_result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.result_set_type = result_set_type;
        self
    }

    /// Set the concurrency mode
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Shorthand for an updatable cursor
    pub fn updatable(self) -> Self {
        self.with_concurrency(Concurrency::Updatable)
    }

    /// Set the fetch size
    pub fn with_fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = rows;
        self
    }

    /// Set the in-row LOB threshold for this cursor
    pub fn with_lob_prefetch_size(mut self, bytes: u32) -> Self {
        self.lob_prefetch_size = Some(bytes);
        self
    }

    /// Forward-only with a fetch size: rows arrive on demand and the cursor
    /// holds the connection until it is drained or closed
    pub fn is_streaming(&self) -> bool {
        self.result_set_type == ResultSetType::ForwardOnly && self.fetch_size > 0
    }

    /// Whether every row is fetched when the cursor opens
    pub(crate) fn buffers_everything(&self) -> bool {
        match self.result_set_type {
            ResultSetType::ScrollInsensitive => true,
            ResultSetType::ForwardOnly => self.fetch_size == 0,
            ResultSetType::ScrollSensitive => false,
        }
    }
}
