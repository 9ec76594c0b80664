//! Recording session persistence.
//!
//! CRUD operations for the `recording_sessions` table. Raw SQL with
//! rusqlite, no ORM; the settings snapshot and the transcript/summary
//! payloads are stored as JSON text columns.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::session::SessionStatus;

/// A session record from the database.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub status: String,
    pub title: Option<String>,
    pub language: String,
    pub audio_path: Option<String>,
    pub audio_bytes_len: Option<i64>,
    pub transcript_text: Option<String>,
    pub transcript_json: Option<String>,
    pub summary_json: Option<String>,
    pub settings_snapshot: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl SessionRecord {
    pub fn status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    pub fn has_transcript(&self) -> bool {
        self.transcript_text
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Creation timestamp as parsed from SQLite's CURRENT_TIMESTAMP format.
    pub fn created_at_naive(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S").ok()
    }
}

const SELECT_COLUMNS: &str = "id, status, title, language, audio_path, audio_bytes_len, \
     transcript_text, transcript_json, summary_json, settings_snapshot, error, \
     created_at, updated_at";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        status: row.get(1)?,
        title: row.get(2)?,
        language: row.get(3)?,
        audio_path: row.get(4)?,
        audio_bytes_len: row.get(5)?,
        transcript_text: row.get(6)?,
        transcript_json: row.get(7)?,
        summary_json: row.get(8)?,
        settings_snapshot: row.get(9)?,
        error: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Repository for session records.
pub struct SessionRepository;

impl SessionRepository {
    /// Insert a new session (status = recording) with its settings snapshot.
    pub fn insert(
        conn: &Connection,
        id: &str,
        language: &str,
        audio_path: &str,
        settings_snapshot: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO recording_sessions (id, status, language, audio_path, settings_snapshot) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                SessionStatus::Recording.as_str(),
                language,
                audio_path,
                settings_snapshot,
            ],
        )
        .context("Failed to insert session")?;
        Ok(())
    }

    /// Get a session by id.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<SessionRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM recording_sessions WHERE id = ?1"
            ))
            .context("Failed to prepare session query")?;

        let mut rows = stmt
            .query_map(params![id], record_from_row)
            .context("Failed to query session")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List sessions, newest first.
    pub fn list(conn: &Connection) -> Result<Vec<SessionRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM recording_sessions \
                 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare sessions list query")?;

        let rows = stmt
            .query_map([], record_from_row)
            .context("Failed to list sessions")?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }

        Ok(sessions)
    }

    /// Mark a session completed with transcript, summary, and title.
    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        conn: &Connection,
        id: &str,
        title: &str,
        transcript_text: &str,
        transcript_json: &str,
        summary_json: &str,
        audio_bytes_len: i64,
    ) -> Result<()> {
        let changed = conn
            .execute(
                "UPDATE recording_sessions SET status = ?1, title = ?2, transcript_text = ?3, \
                 transcript_json = ?4, summary_json = ?5, audio_bytes_len = ?6, \
                 updated_at = CURRENT_TIMESTAMP WHERE id = ?7",
                params![
                    SessionStatus::Completed.as_str(),
                    title,
                    transcript_text,
                    transcript_json,
                    summary_json,
                    audio_bytes_len,
                    id,
                ],
            )
            .context("Failed to complete session")?;
        anyhow::ensure!(changed == 1, "No session row updated for id {id}");
        Ok(())
    }

    /// Mark a session failed with an error message.
    pub fn fail(conn: &Connection, id: &str, error: &str) -> Result<()> {
        conn.execute(
            "UPDATE recording_sessions SET status = ?1, error = ?2, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![SessionStatus::Failed.as_str(), error, id],
        )
        .context("Failed to mark session as failed")?;
        Ok(())
    }
}
