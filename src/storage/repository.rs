use rusqlite::{params, Connection, OptionalExtension};

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "cache.lookup_ttl_ms", "60000")?;
                let val = get_config(conn, "cache.lookup_ttl_ms")?;
                assert_eq!(val, Some("60000".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                set_config(conn, "cache.lookup_ttl_ms", "1000")?;
                set_config(conn, "a.first", "x")?;
                let all = list_config(conn)?;
                assert_eq!(
                    all,
                    vec![
                        ("a.first".to_string(), "x".to_string()),
                        ("cache.lookup_ttl_ms".to_string(), "1000".to_string()),
                    ]
                );
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
