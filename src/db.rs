use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    // Collections are stored as whole JSON snapshots, one row per fixed key.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |r| {
            r.get::<_, String>(0)
        })
        .optional()?;
    Ok(v)
}

pub fn kv_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO kv_store(key, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, value, &now),
    )?;
    Ok(())
}

/// Raw stored JSON text; parsing is left to the caller so a corrupt value can
/// be skipped instead of failing the whole read.
pub fn settings_get_raw(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let raw = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get::<_, String>(0),
        )
        .optional()?;
    Ok(raw)
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn kv_values_survive_reopen() {
        let ws = temp_dir("rollcall-db-kv");
        {
            let conn = open_db(&ws).expect("open");
            kv_set(&conn, "classes", "[]").expect("set");
            kv_set(&conn, "classes", "[{\"id\":\"c1\"}]").expect("overwrite");
        }
        let conn = open_db(&ws).expect("reopen");
        assert_eq!(
            kv_get(&conn, "classes").expect("get").as_deref(),
            Some("[{\"id\":\"c1\"}]")
        );
        assert_eq!(kv_get(&conn, "students").expect("get"), None);
        let stamped: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM kv_store WHERE key = 'classes'",
                [],
                |r| r.get(0),
            )
            .expect("updated_at column");
        assert!(stamped.is_some());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn settings_roundtrip_json() {
        let ws = temp_dir("rollcall-db-settings");
        let conn = open_db(&ws).expect("open");
        assert!(settings_get_raw(&conn, "attendance.allowedDurations")
            .expect("get")
            .is_none());
        settings_set_json(
            &conn,
            "attendance.allowedDurations",
            &serde_json::json!([5, 10]),
        )
        .expect("set");
        let raw = settings_get_raw(&conn, "attendance.allowedDurations")
            .expect("get")
            .expect("stored");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&raw).expect("parse"),
            serde_json::json!([5, 10])
        );
        let _ = std::fs::remove_dir_all(ws);
    }
}
