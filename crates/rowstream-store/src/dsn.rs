//! DSN parsing: `memory://<database>` and `csv:///<directory>`.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    raw: String,
    url: Url,
}

impl Dsn {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| StoreError::InvalidDsn {
            dsn: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.trim().to_string(),
            url,
        })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Database name for host-style DSNs (`memory://prodev` → `prodev`).
    pub fn database(&self) -> Result<&str> {
        self.url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| self.invalid("missing database name"))
    }

    /// Filesystem path for path-style DSNs (`csv:///srv/users` → `/srv/users`).
    pub fn path(&self) -> Result<PathBuf> {
        if self.url.host_str().is_some_and(|h| !h.is_empty()) {
            return Err(self.invalid("expected an absolute path such as csv:///data"));
        }
        let path = self.url.path();
        if path.is_empty() {
            return Err(self.invalid("missing path"));
        }
        Ok(PathBuf::from(path))
    }

    fn invalid(&self, reason: &str) -> StoreError {
        StoreError::InvalidDsn {
            dsn: self.raw.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_dsn_database() {
        let dsn = Dsn::parse("memory://prodev").unwrap();
        assert_eq!(dsn.scheme(), "memory");
        assert_eq!(dsn.database().unwrap(), "prodev");
    }

    #[test]
    fn test_csv_dsn_path() {
        let dsn = Dsn::parse("csv:///srv/users").unwrap();
        assert_eq!(dsn.scheme(), "csv");
        assert_eq!(dsn.path().unwrap(), PathBuf::from("/srv/users"));
    }

    #[test]
    fn test_garbage_dsn_is_invalid() {
        assert!(matches!(
            Dsn::parse("not a dsn"),
            Err(StoreError::InvalidDsn { .. })
        ));
    }
}
