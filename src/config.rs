//! Driver configuration and option string parsing
//!
//! Options can be set with builder methods or parsed from a query-string
//! style option list:
//! - `defaultFetchSize=50&lobPrefetchSize=1024`
//! - `?lobChunkSize=4096;invalidateLocatorsOnCommit=false`

use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_FETCH_SIZE, DEFAULT_LOB_CHUNK_SIZE, DEFAULT_LOB_PREFETCH_SIZE};
use crate::error::{Error, Result};

/// Driver configuration for the LOB and cursor engines.
///
/// # Examples
///
/// ```rust
/// use ob_client::Config;
///
/// let config = Config::default()
///     .default_fetch_size(50)
///     .lob_prefetch_size(1024);
/// assert_eq!(config.default_fetch_size, 50);
///
/// let parsed: Config = "defaultFetchSize=50&lobPrefetchSize=1024".parse().unwrap();
/// assert_eq!(parsed.lob_prefetch_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Rows per round trip when a cursor does not choose its own fetch size
    pub default_fetch_size: u32,
    /// LOBs up to this many bytes travel with their locator
    pub lob_prefetch_size: u32,
    /// Piece size for the LOB piece protocol
    pub lob_chunk_size: u32,
    /// Whether commit/rollback invalidates outstanding locators for mutation
    pub invalidate_locators_on_commit: bool,
}

impl Config {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default fetch size (0 is replaced by the built-in default)
    pub fn default_fetch_size(mut self, rows: u32) -> Self {
        self.default_fetch_size = if rows == 0 { DEFAULT_FETCH_SIZE } else { rows };
        self
    }

    /// Set the in-row LOB threshold
    pub fn lob_prefetch_size(mut self, bytes: u32) -> Self {
        self.lob_prefetch_size = bytes;
        self
    }

    /// Set the LOB piece size (at least 1 byte)
    pub fn lob_chunk_size(mut self, bytes: u32) -> Self {
        self.lob_chunk_size = bytes.max(1);
        self
    }

    /// Set whether commit/rollback invalidates locators
    pub fn invalidate_locators_on_commit(mut self, invalidate: bool) -> Self {
        self.invalidate_locators_on_commit = invalidate;
        self
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "defaultFetchSize" => {
                let rows = parse_number(key, value)?;
                *self = self.clone().default_fetch_size(rows);
            }
            "lobPrefetchSize" => self.lob_prefetch_size = parse_number(key, value)?,
            "lobChunkSize" => {
                let bytes = parse_number(key, value)?;
                *self = self.clone().lob_chunk_size(bytes);
            }
            "invalidateLocatorsOnCommit" => {
                self.invalidate_locators_on_commit = match value {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(Error::InvalidConfig(format!(
                            "{} expects true or false, got {:?}",
                            key, value
                        )))
                    }
                }
            }
            _ => return Err(Error::InvalidConfig(format!("unknown option: {}", key))),
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} expects a number, got {:?}", key, value)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_fetch_size: DEFAULT_FETCH_SIZE,
            lob_prefetch_size: DEFAULT_LOB_PREFETCH_SIZE,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            invalidate_locators_on_commit: true,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('?');
        let mut config = Config::default();

        for pair in s.split(['&', ';']).filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidConfig(format!("expected key=value, got {:?}", pair))
            })?;
            config.apply(key.trim(), value.trim())?;
        }

        Ok(config)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "defaultFetchSize={}&lobPrefetchSize={}&lobChunkSize={}&invalidateLocatorsOnCommit={}",
            self.default_fetch_size,
            self.lob_prefetch_size,
            self.lob_chunk_size,
            self.invalidate_locators_on_commit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config: Config = "defaultFetchSize=10&lobPrefetchSize=64;lobChunkSize=16"
            .parse()
            .unwrap();
        assert_eq!(config.default_fetch_size, 10);
        assert_eq!(config.lob_prefetch_size, 64);
        assert_eq!(config.lob_chunk_size, 16);
        assert!(config.invalidate_locators_on_commit);
    }

    #[test]
    fn test_parse_leading_question_mark() {
        let config: Config = "?invalidateLocatorsOnCommit=false".parse().unwrap();
        assert!(!config.invalidate_locators_on_commit);
    }

    #[test]
    fn test_parse_empty_is_default() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_errors() {
        assert!("defaultFetchSize".parse::<Config>().is_err());
        assert!("defaultFetchSize=abc".parse::<Config>().is_err());
        assert!("unknown=1".parse::<Config>().is_err());
        assert!("invalidateLocatorsOnCommit=maybe".parse::<Config>().is_err());
    }

    #[test]
    fn test_zero_values_are_normalized() {
        let config = Config::default().default_fetch_size(0).lob_chunk_size(0);
        assert_eq!(config.default_fetch_size, DEFAULT_FETCH_SIZE);
        assert_eq!(config.lob_chunk_size, 1);
    }

    #[test]
    fn test_display_roundtrip() {
        let config = Config::default().default_fetch_size(7).lob_prefetch_size(9);
        let parsed: Config = config.to_string().parse().unwrap();
        assert_eq!(parsed, config);
    }
}
