use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::QueryExecutor;

pub const HISTORY_TTL_KEY: &str = "cache.history_ttl_ms";
pub const CURRENT_TTL_KEY: &str = "cache.current_ttl_ms";
pub const LOOKUP_TTL_KEY: &str = "cache.lookup_ttl_ms";
pub const STATUS_TTL_KEY: &str = "cache.status_ttl_ms";

/// Cache lifetimes per kind of read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Goal history series.
    pub history_ttl: Duration,
    /// Current value of a single goal and the dashboard.
    pub current_ttl: Duration,
    /// Distinct-value lists for filter dropdowns.
    pub lookup_ttl: Duration,
    /// Near-real-time status reads.
    pub status_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_ttl: Duration::from_secs(5 * 60),
            current_ttl: Duration::from_secs(60),
            lookup_ttl: Duration::from_secs(30 * 60),
            status_ttl: Duration::from_secs(15),
        }
    }
}

fn parse_ms(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| Error::Config(format!("{key} must be a whole number of milliseconds, got {raw:?}")))
}

impl EngineConfig {
    /// Defaults, overridden by any `cache.*_ttl_ms` keys in `app_config`.
    /// A missing `app_config` table leaves the defaults in place.
    pub async fn load(exec: &dyn QueryExecutor) -> Result<Self> {
        let mut config = Self::default();
        let rows = match exec
            .query(
                "SELECT key, value FROM app_config WHERE key LIKE 'cache.%'",
                &[],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) if e.is_missing_table() => return Ok(config),
            Err(e) => return Err(e),
        };

        for row in &rows {
            let (Some(key), Some(value)) = (row.get_str("key"), row.get_str("value")) else {
                continue;
            };
            let slot = match key {
                HISTORY_TTL_KEY => &mut config.history_ttl,
                CURRENT_TTL_KEY => &mut config.current_ttl,
                LOOKUP_TTL_KEY => &mut config.lookup_ttl,
                STATUS_TTL_KEY => &mut config.status_ttl,
                _ => continue,
            };
            *slot = parse_ms(key, value)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::set_config;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_defaults_without_overrides() {
        let db = Database::open_memory().await.unwrap();
        let config = EngineConfig::load(&db).await.unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.status_ttl, Duration::from_secs(15));
        assert_eq!(config.lookup_ttl, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_overrides_from_app_config() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                set_config(conn, HISTORY_TTL_KEY, "1000")?;
                set_config(conn, STATUS_TTL_KEY, " 250 ")?;
                set_config(conn, "cache.unknown", "abc")?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let config = EngineConfig::load(&db).await.unwrap();
        assert_eq!(config.history_ttl, Duration::from_millis(1000));
        assert_eq!(config.status_ttl, Duration::from_millis(250));
        assert_eq!(config.current_ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_invalid_number_is_config_error() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                set_config(conn, LOOKUP_TTL_KEY, "thirty minutes")?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let err = EngineConfig::load(&db).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
