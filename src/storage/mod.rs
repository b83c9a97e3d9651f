#[cfg(test)]
pub(crate) mod fixtures;
pub mod repository;

use async_trait::async_trait;
use rusqlite::types::ToSql;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, Row, SqlValue};

/// Database wraps two `tokio_rusqlite::Connection` instances (writer + reader)
/// using WAL mode for concurrent access. The writer serializes writes via
/// `tokio_rusqlite`'s internal channel; the reader can proceed without blocking.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at the default path (`~/.kpidash/kpidash.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".kpidash");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("kpidash.db")).await
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_reader(&reader).await?;

        Ok(Self { writer, reader })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // For in-memory, we share the same connection for reader/writer
        // since in-memory DBs are per-connection.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            migrations().to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(include_str!("migrations/001_goals.sql")),
        M::up(include_str!("migrations/002_fact_tables.sql")),
    ])
}

/// Run a statement on `conn`, collecting rows as ordered column/value pairs.
fn query_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[SqlValue],
) -> std::result::Result<Vec<Row>, rusqlite::Error> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(param_refs.as_slice())?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut r = Row::new();
        for (i, name) in names.iter().enumerate() {
            r.push(name, SqlValue::from_value_ref(row.get_ref(i)?));
        }
        out.push(r);
    }
    Ok(out)
}

// The closures hand back `Ok(inner)` so that SQLite failures reach the caller
// classified by `Error::from(rusqlite::Error)`; only connection-level
// failures travel through tokio_rusqlite's own error type.
#[async_trait]
impl QueryExecutor for Database {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let result = self
            .reader
            .call(move |conn| {
                Ok::<_, rusqlite::Error>(query_rows(conn, &sql, &params).map_err(Error::from))
            })
            .await?;
        result
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let result = self
            .writer
            .call(move |conn| {
                let param_refs: Vec<&dyn ToSql> =
                    params.iter().map(|p| p as &dyn ToSql).collect();
                Ok::<_, rusqlite::Error>(
                    conn.execute(&sql, param_refs.as_slice())
                        .map(|n| n as u64)
                        .map_err(Error::from),
                )
            })
            .await?;
        result
    }

    async fn insert(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let result = self
            .writer
            .call(move |conn| {
                let param_refs: Vec<&dyn ToSql> =
                    params.iter().map(|p| p as &dyn ToSql).collect();
                Ok::<_, rusqlite::Error>(
                    conn.execute(&sql, param_refs.as_slice())
                        .map(|_| conn.last_insert_rowid())
                        .map_err(Error::from),
                )
            })
            .await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let db = Database::open_memory().await.unwrap();

        let tables: Vec<String> = db
            .reader()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                Ok::<Vec<String>, rusqlite::Error>(rows.filter_map(|r| r.ok()).collect())
            })
            .await
            .unwrap();

        assert!(tables.contains(&"goals_config".to_string()));
        assert!(tables.contains(&"faturamento_analitico".to_string()));
        assert!(tables.contains(&"feegow_proposals".to_string()));
        assert!(tables.contains(&"feegow_contracts".to_string()));
        assert!(tables.contains(&"app_config".to_string()));
    }

    #[tokio::test]
    async fn test_open_at_reopens_migrated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kpidash.db");

        let db = Database::open_at(&path).await.unwrap();
        db.execute(
            "INSERT INTO app_config (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            &["k".into(), "v".into()],
        )
        .await
        .unwrap();
        drop(db);

        let db = Database::open_at(&path).await.unwrap();
        let rows = db
            .query("SELECT value FROM app_config WHERE key = ?1", &["k".into()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("value"), Some("v"));
    }

    #[tokio::test]
    async fn test_query_binds_parameters_verbatim() {
        let db = Database::open_memory().await.unwrap();
        let tricky = "O'Brien \"quoted\"; DROP TABLE goals_config; --";
        let rows = db
            .query("SELECT ?1 AS echoed, ?2 AS n", &[tricky.into(), 5i64.into()])
            .await
            .unwrap();
        assert_eq!(rows[0].get_str("echoed"), Some(tricky));
        assert_eq!(rows[0].get_i64("n"), Some(5));
    }

    #[tokio::test]
    async fn test_missing_table_surfaces_as_missing_table() {
        let db = Database::open_memory().await.unwrap();
        let err = db
            .query("SELECT * FROM not_ingested_yet", &[])
            .await
            .unwrap_err();
        assert!(err.is_missing_table(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_insert_returns_rowid() {
        let db = Database::open_memory().await.unwrap();
        let id = db
            .insert(
                "INSERT INTO goals_config (name, periodicity, linked_kpi_id) VALUES (?1, ?2, ?3)",
                &["g".into(), "daily".into(), "manual".into()],
            )
            .await
            .unwrap();
        assert!(id > 0);
        let affected = db
            .execute("DELETE FROM goals_config WHERE id = ?1", &[id.into()])
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }
}
