use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub mod sessions;
pub mod settings;

pub use sessions::{SessionRecord, SessionRepository};
pub use settings::SettingsRepository;

/// Open (and migrate) the database at an explicit path.
pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

/// Open the database at its default location.
pub fn init_db() -> Result<Connection> {
    open(&crate::global::db_file()?)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS recording_sessions (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'recording',
            title TEXT,
            language TEXT NOT NULL DEFAULT 'de',
            audio_path TEXT,
            audio_bytes_len INTEGER,
            transcript_text TEXT,
            transcript_json TEXT,
            summary_json TEXT,
            settings_snapshot TEXT,
            error TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP
        )",
        [],
    )
    .context("Failed to create recording_sessions table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_created_at \
         ON recording_sessions(created_at DESC)",
        [],
    )
    .context("Failed to create sessions created_at index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_status ON recording_sessions(status)",
        [],
    )
    .context("Failed to create sessions status index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_settings (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create app_settings table")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
                 AND name IN ('recording_sessions', 'app_settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("protokoll.db");
        let conn = open(&db_path).unwrap();
        drop(conn);
        assert!(db_path.exists());
    }
}
