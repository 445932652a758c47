//! Stream configuration that the CLI and embedding services share.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::QuerySpec;
use crate::schema::USER_DATA_TABLE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Store DSN, e.g. `csv:///var/lib/users` or `memory://prodev`.
    pub dsn: Option<String>,

    /// Table the default query reads.
    pub table: String,

    /// Rows per multi-row fetch for batched streams. Must be at least 1.
    pub batch_size: usize,

    /// Max number of cached result sets; 0 disables the cache.
    pub cache_capacity: usize,

    /// Optional cache entry lifetime.
    pub cache_ttl_ms: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            table: USER_DATA_TABLE.to_string(),
            batch_size: 100,
            cache_capacity: 64,
            cache_ttl_ms: None,
        }
    }
}

/// Partial configuration as read from a YAML file. Every key is optional;
/// present keys override whatever was configured before.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub dsn: Option<String>,
    pub table: Option<String>,
    pub batch_size: Option<usize>,
    pub cache_capacity: Option<usize>,
    pub cache_ttl_ms: Option<u64>,
}

impl ConfigFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn apply_to(&self, cfg: &mut StreamConfig) {
        if let Some(dsn) = &self.dsn {
            cfg.dsn = Some(dsn.clone());
        }
        if let Some(table) = &self.table {
            cfg.table = table.clone();
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if let Some(n) = self.cache_capacity {
            cfg.cache_capacity = n;
        }
        if let Some(ms) = self.cache_ttl_ms {
            cfg.cache_ttl_ms = Some(ms);
        }
    }
}

impl StreamConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWSTREAM_DSN`: store DSN
    /// - `ROWSTREAM_TABLE`: table name
    /// - `ROWSTREAM_BATCH_SIZE`: rows per batch fetch
    /// - `ROWSTREAM_CACHE_CAPACITY`: cached result sets
    /// - `ROWSTREAM_CACHE_TTL_MS`: cache entry lifetime
    ///
    /// Unparseable numbers are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("ROWSTREAM_DSN") {
            cfg.dsn = Some(s);
        }

        if let Ok(s) = std::env::var("ROWSTREAM_TABLE") {
            cfg.table = s;
        }

        if let Ok(s) = std::env::var("ROWSTREAM_BATCH_SIZE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.batch_size = v;
            }
        }

        if let Ok(s) = std::env::var("ROWSTREAM_CACHE_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.cache_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("ROWSTREAM_CACHE_TTL_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.cache_ttl_ms = Some(v);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.table.trim().is_empty() {
            return Err(Error::Config("table name must not be empty".into()));
        }
        Ok(())
    }

    pub fn require_dsn(&self) -> Result<&str> {
        self.dsn
            .as_deref()
            .ok_or_else(|| Error::Config("no DSN configured (set ROWSTREAM_DSN or --dsn)".into()))
    }

    /// `SELECT * FROM <table>`.
    pub fn default_query(&self) -> QuerySpec {
        QuerySpec::select_all(&self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_overrides_only_present_keys() {
        let mut cfg = StreamConfig::default();
        let file = ConfigFile::from_yaml_str("dsn: csv:///tmp/users\nbatch_size: 7\n").unwrap();
        file.apply_to(&mut cfg);
        assert_eq!(cfg.dsn.as_deref(), Some("csv:///tmp/users"));
        assert_eq!(cfg.batch_size, 7);
        assert_eq!(cfg.table, USER_DATA_TABLE);
    }

    #[test]
    fn test_unknown_yaml_key_is_config_error() {
        let err = ConfigFile::from_yaml_str("batchsize: 7\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let cfg = StreamConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
