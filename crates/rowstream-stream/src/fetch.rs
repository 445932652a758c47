//! Materializing reads for small result sets.
//!
//! Unlike the streams, these collect every row before returning, so they are
//! meant for lookups and short listings. They still go through a
//! `ConnectionManager`, which is closed before returning.

use std::sync::Arc;

use rowstream_core::error::Result;
use rowstream_core::query::QuerySpec;
use rowstream_core::types::{Row, Scalar};
use rowstream_store::Driver;

use crate::cache::QueryCache;
use crate::manager::ConnectionManager;

/// Rows per round trip while materializing.
const FETCH_CHUNK: usize = 256;

/// Run `sql` once and collect its rows.
pub fn execute_query(driver: &dyn Driver, dsn: &str, sql: &str, params: &[Scalar]) -> Result<Vec<Row>> {
    ConnectionManager::scoped(driver, dsn, |m| {
        m.execute(sql, params)?;
        let mut out = Vec::new();
        loop {
            let chunk = m.fetch_many(FETCH_CHUNK)?;
            let short = chunk.len() < FETCH_CHUNK;
            out.extend(chunk);
            if short {
                return Ok(out);
            }
        }
    })
}

/// Collect the rows of `query`, serving repeats from `cache` when given.
pub fn fetch_all(
    driver: &dyn Driver,
    dsn: &str,
    query: &QuerySpec,
    cache: Option<&QueryCache>,
) -> Result<Arc<Vec<Row>>> {
    let Some(cache) = cache.filter(|c| c.is_enabled()) else {
        return execute_query(driver, dsn, &query.sql, &query.params).map(Arc::new);
    };
    let key = query.cache_key(dsn)?;
    if let Some(rows) = cache.get(&key) {
        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, rows = rows.len(), "query cache hit");
        return Ok(rows);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(key = %key, "query cache miss");
    let rows = execute_query(driver, dsn, &query.sql, &query.params)?;
    Ok(cache.insert(key, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstream_core::record::UserRecord;
    use rowstream_store::{MemoryDriver, TrackingDriver};
    use uuid::Uuid;

    fn driver(n: u128) -> TrackingDriver<MemoryDriver> {
        let memory = MemoryDriver::new();
        let users: Vec<UserRecord> = (0..n)
            .map(|i| {
                UserRecord::new(Uuid::from_u128(i + 1), format!("u{i}"), "u@example.com", 20 + i as i64)
            })
            .collect();
        memory.insert_users("db", &users).unwrap();
        TrackingDriver::new(memory)
    }

    #[test]
    fn test_execute_query_collects_across_chunks() {
        let d = driver(600);
        let rows = execute_query(&d, "memory://db", "SELECT age FROM user_data", &[]).unwrap();
        assert_eq!(rows.len(), 600);
        let snap = d.counters().snapshot();
        assert_eq!(snap.fetch_many_calls, 3);
        assert_eq!(snap.open_connections, 0);
    }

    #[test]
    fn test_fetch_all_hits_cache_on_repeat() {
        let d = driver(3);
        let cache = QueryCache::new(8, None);
        let q = QuerySpec::new("SELECT * FROM user_data WHERE age >= ?").with_params(vec![Scalar::I64(21)]);

        let first = fetch_all(&d, "memory://db", &q, Some(&cache)).unwrap();
        let second = fetch_all(&d, "memory://db", &q, Some(&cache)).unwrap();
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(d.counters().snapshot().connects, 1);

        let other = q.clone().with_params(vec![Scalar::I64(22)]);
        assert_eq!(fetch_all(&d, "memory://db", &other, Some(&cache)).unwrap().len(), 1);
        assert_eq!(d.counters().snapshot().connects, 2);
    }
}
