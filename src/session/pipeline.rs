//! Session lifecycle orchestration.
//!
//! Owns the finalize sequence (transcribe, summarize, derive a title) and
//! the status machine persisted through the session repository. Database
//! work runs on the blocking pool; finalize attempts on one session are
//! serialized through a per-session lock, and a session that already left
//! the recording state is rejected outright.

use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audio::AudioStore;
use crate::db::{self, SessionRecord, SessionRepository, SettingsRepository};
use crate::error::PipelineError;
use crate::session::title::derive_title;
use crate::session::SessionStatus;
use crate::settings::SettingsProfile;
use crate::summary::{Summarizer, SummaryResult};
use crate::transcription::Transcriber;

/// Result of creating a new session.
#[derive(Debug, Clone)]
pub struct SessionCreated {
    pub id: String,
    pub websocket_url: String,
    pub created_at: String,
}

/// Result of a successful finalize.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub id: String,
    pub status: SessionStatus,
    pub transcript: String,
    pub summary: SummaryResult,
    pub title: String,
}

pub struct SessionPipeline {
    db_path: PathBuf,
    audio: AudioStore,
    transcriber: Arc<Transcriber>,
    summarizer: Arc<Summarizer>,
    finalize_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionPipeline {
    pub fn new(
        db_path: PathBuf,
        audio: AudioStore,
        transcriber: Arc<Transcriber>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        Self {
            db_path,
            audio,
            transcriber,
            summarizer,
            finalize_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn audio_store(&self) -> &AudioStore {
        &self.audio
    }

    /// Run a closure against a fresh connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::open(&db_path)?;
            f(&conn)
        })
        .await
        .map_err(|e| PipelineError::storage(anyhow::anyhow!("Database task failed: {e}")))?
        .map_err(PipelineError::storage)
    }

    /// Create a session in the recording state with a snapshot of the
    /// current settings profile. Later profile edits never reach it.
    pub async fn create_session(&self) -> Result<SessionCreated, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let audio_path = self.audio.prepare(&id).map_err(PipelineError::storage)?;

        let session_id = id.clone();
        let record = self
            .with_db(move |conn| {
                let profile = SettingsRepository::load_or_default(conn)?;
                let snapshot = serde_json::to_string(&profile)?;
                SessionRepository::insert(
                    conn,
                    &session_id,
                    &profile.language,
                    &audio_path.to_string_lossy(),
                    &snapshot,
                )?;
                SessionRepository::get(conn, &session_id)?
                    .context("Session missing right after insert")
            })
            .await?;

        info!("Created session {}", record.id);

        Ok(SessionCreated {
            websocket_url: format!("/api/sessions/{}/stream", record.id),
            id: record.id,
            created_at: record.created_at,
        })
    }

    pub async fn get_session(&self, id: &str) -> Result<SessionRecord, PipelineError> {
        let session_id = id.to_string();
        self.with_db(move |conn| SessionRepository::get(conn, &session_id))
            .await?
            .ok_or(PipelineError::NotFound)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, PipelineError> {
        self.with_db(SessionRepository::list).await
    }

    /// Structured summary of a finalized session.
    pub async fn get_summary(&self, id: &str) -> Result<SummaryResult, PipelineError> {
        let record = self.get_session(id).await?;
        let json = record.summary_json.ok_or(PipelineError::NotFound)?;
        serde_json::from_str(&json).map_err(PipelineError::storage)
    }

    pub async fn load_settings(&self) -> Result<SettingsProfile, PipelineError> {
        self.with_db(SettingsRepository::load_or_default).await
    }

    pub async fn save_settings(
        &self,
        profile: SettingsProfile,
    ) -> Result<SettingsProfile, PipelineError> {
        self.with_db(move |conn| {
            SettingsRepository::save(conn, &profile)?;
            Ok(profile)
        })
        .await
    }

    async fn finalize_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.finalize_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Finalize a recording session: transcribe, summarize, title, persist.
    ///
    /// Audio preconditions fail before any engine is touched. Transcription
    /// failures are fatal to the attempt; generation failures degrade to the
    /// placeholder protocol and the session still completes.
    pub async fn finalize(&self, id: &str) -> Result<FinalizeOutcome, PipelineError> {
        let lock = self.finalize_lock(id).await;
        let _guard = lock.lock().await;

        let record = self.get_session(id).await?;
        match record.status() {
            Some(SessionStatus::Recording) => {}
            _ => return Err(PipelineError::NotRecording(record.status.clone())),
        }

        let audio_path = record
            .audio_path
            .as_deref()
            .map(PathBuf::from)
            .ok_or(PipelineError::MissingAudio)?;
        if !audio_path.exists() {
            return Err(PipelineError::AudioUnavailable);
        }
        let audio_bytes_len = std::fs::metadata(&audio_path)
            .map(|m| m.len() as i64)
            .unwrap_or(0);

        let transcription = match self
            .transcriber
            .transcribe_file(&audio_path, Some(&record.language))
            .await
        {
            Ok(result) => result,
            Err(err) => {
                self.record_failure(id, &err).await;
                return Err(err);
            }
        };

        let profile = match record.settings_snapshot.as_deref() {
            Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
                warn!("Unreadable settings snapshot for session {}: {}", id, e);
                SettingsProfile::default()
            }),
            None => SettingsProfile::default(),
        };

        // Cleaning can reject every segment; the raw transcript is still
        // better input than nothing.
        let summary_input = if transcription.clean_text.trim().is_empty() {
            transcription.raw_text.clone()
        } else {
            transcription.clean_text.clone()
        };

        let summary = self.summarizer.summarize(&summary_input, &profile).await;
        let title = derive_title(&summary_input, Some(&summary), record.created_at_naive());

        let transcript_json =
            serde_json::to_string(&transcription).map_err(PipelineError::storage)?;
        let summary_json = serde_json::to_string(&summary).map_err(PipelineError::storage)?;

        {
            let session_id = id.to_string();
            let title = title.clone();
            let transcript_text = transcription.raw_text.clone();
            self.with_db(move |conn| {
                SessionRepository::complete(
                    conn,
                    &session_id,
                    &title,
                    &transcript_text,
                    &transcript_json,
                    &summary_json,
                    audio_bytes_len,
                )
            })
            .await?;
        }

        info!(
            "Session {} finalized: {} segments, {} bytes audio, title {:?}",
            id,
            transcription.segments.len(),
            audio_bytes_len,
            title
        );

        Ok(FinalizeOutcome {
            id: id.to_string(),
            status: SessionStatus::Completed,
            transcript: transcription.raw_text,
            summary,
            title,
        })
    }

    /// Move a session to the failed state after a hard transcription error.
    async fn record_failure(&self, id: &str, err: &PipelineError) {
        if !matches!(err, PipelineError::EmptyAudio | PipelineError::Engine(_)) {
            return;
        }
        let session_id = id.to_string();
        let message = err.to_string();
        if let Err(db_err) = self
            .with_db(move |conn| SessionRepository::fail(conn, &session_id, &message))
            .await
        {
            error!("Failed to record failure for session {}: {}", id, db_err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::GenerationClient;
    use crate::transcription::{EngineSegment, EngineTranscription, SpeechEngine};
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeEngine {
        fail: bool,
    }

    impl SpeechEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn transcribe(
            &self,
            _audio_path: &Path,
            _language: Option<&str>,
        ) -> anyhow::Result<EngineTranscription> {
            if self.fail {
                anyhow::bail!("model blew up");
            }
            Ok(EngineTranscription {
                language: Some("de".to_string()),
                duration_seconds: 4.0,
                segments: vec![
                    EngineSegment {
                        start: 0.0,
                        end: 2.5,
                        text: "wir haben das Budget besprochen.".to_string(),
                    },
                    EngineSegment {
                        start: 2.5,
                        end: 4.0,
                        text: "keine weiteren Punkte offen.".to_string(),
                    },
                ],
            })
        }
    }

    struct FakeGeneration {
        reply: Option<String>,
    }

    #[async_trait]
    impl GenerationClient for FakeGeneration {
        async fn generate(&self, _model: &str, _prompt: &str) -> anyhow::Result<String> {
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => anyhow::bail!("generation timed out"),
            }
        }
    }

    struct Harness {
        pipeline: SessionPipeline,
        _dir: tempfile::TempDir,
    }

    fn harness(engine_fails: bool, reply: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("protokoll.db");
        let audio = AudioStore::new(dir.path().join("storage"));
        let transcriber = Arc::new(Transcriber::with_engine(Arc::new(FakeEngine {
            fail: engine_fails,
        })));
        let summarizer = Arc::new(Summarizer::new(
            Arc::new(FakeGeneration {
                reply: reply.map(String::from),
            }),
            "llama3",
        ));
        Harness {
            pipeline: SessionPipeline::new(db_path, audio, transcriber, summarizer),
            _dir: dir,
        }
    }

    async fn write_audio(pipeline: &SessionPipeline, id: &str, bytes: &[u8]) {
        let record = pipeline.get_session(id).await.unwrap();
        let path = PathBuf::from(record.audio_path.unwrap());
        crate::audio::append_chunk(&path, bytes).await.unwrap();
    }

    #[tokio::test]
    async fn test_finalize_happy_path() {
        let h = harness(
            false,
            Some("1. Agenda-Überblick: Budget wurde besprochen.\n2. Entscheidungen: Keine."),
        );
        let created = h.pipeline.create_session().await.unwrap();
        assert_eq!(
            created.websocket_url,
            format!("/api/sessions/{}/stream", created.id)
        );
        write_audio(&h.pipeline, &created.id, &[7u8; 9600]).await;

        let outcome = h.pipeline.finalize(&created.id).await.unwrap();

        assert_eq!(outcome.status, SessionStatus::Completed);
        assert_eq!(
            outcome.transcript,
            "wir haben das Budget besprochen. keine weiteren Punkte offen."
        );
        assert_eq!(
            outcome.summary.section("Agenda-Ueberblick"),
            Some("Budget wurde besprochen.")
        );
        assert_eq!(outcome.title, "Budget wurde besprochen.");

        let record = h.pipeline.get_session(&created.id).await.unwrap();
        assert_eq!(record.status(), Some(SessionStatus::Completed));
        assert!(record.has_transcript());
        assert_eq!(record.audio_bytes_len, Some(9600));
    }

    #[tokio::test]
    async fn test_finalize_unknown_session() {
        let h = harness(false, None);
        let err = h.pipeline.finalize("nope").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound));
    }

    #[tokio::test]
    async fn test_refinalize_is_rejected() {
        let h = harness(false, Some("Entscheidungen: Keine."));
        let created = h.pipeline.create_session().await.unwrap();
        write_audio(&h.pipeline, &created.id, &[7u8; 4800]).await;

        h.pipeline.finalize(&created.id).await.unwrap();
        let err = h.pipeline.finalize(&created.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotRecording(status) if status == "completed"));
    }

    #[tokio::test]
    async fn test_missing_audio_file_fails_before_engine() {
        let h = harness(true, None);
        let created = h.pipeline.create_session().await.unwrap();
        let record = h.pipeline.get_session(&created.id).await.unwrap();
        // The directory exists but the audio file was never written, and the
        // failing engine proves it is never reached.
        assert!(!PathBuf::from(record.audio_path.unwrap()).exists());

        let err = h.pipeline.finalize(&created.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::AudioUnavailable));

        let record = h.pipeline.get_session(&created.id).await.unwrap();
        assert_eq!(record.status(), Some(SessionStatus::Recording));
    }

    #[tokio::test]
    async fn test_empty_audio_marks_session_failed() {
        let h = harness(false, None);
        let created = h.pipeline.create_session().await.unwrap();
        write_audio(&h.pipeline, &created.id, b"").await;

        let err = h.pipeline.finalize(&created.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAudio));

        let record = h.pipeline.get_session(&created.id).await.unwrap();
        assert_eq!(record.status(), Some(SessionStatus::Failed));
        assert_eq!(record.error.as_deref(), Some("Audiodatei ist leer"));
    }

    #[tokio::test]
    async fn test_engine_failure_marks_session_failed() {
        let h = harness(true, None);
        let created = h.pipeline.create_session().await.unwrap();
        write_audio(&h.pipeline, &created.id, &[7u8; 4800]).await;

        let err = h.pipeline.finalize(&created.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Engine(_)));

        let record = h.pipeline.get_session(&created.id).await.unwrap();
        assert_eq!(record.status(), Some(SessionStatus::Failed));
    }

    #[tokio::test]
    async fn test_generation_failure_still_completes_with_placeholders() {
        let h = harness(false, None);
        let created = h.pipeline.create_session().await.unwrap();
        write_audio(&h.pipeline, &created.id, &[7u8; 4800]).await;

        let outcome = h.pipeline.finalize(&created.id).await.unwrap();

        assert_eq!(outcome.status, SessionStatus::Completed);
        assert!(outcome
            .summary
            .sections
            .iter()
            .all(|s| s.text == crate::summary::PLACEHOLDER_TEXT));
        assert_eq!(outcome.summary.raw, "");

        let summary = h.pipeline.get_summary(&created.id).await.unwrap();
        assert_eq!(summary, outcome.summary);
    }

    #[tokio::test]
    async fn test_get_summary_before_finalize_is_not_found() {
        let h = harness(false, None);
        let created = h.pipeline.create_session().await.unwrap();
        let err = h.pipeline.get_summary(&created.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound));
    }

    #[tokio::test]
    async fn test_settings_snapshot_shields_session_from_edits() {
        let h = harness(false, Some("Entscheidungen\nBudget genehmigt."));
        let mut profile = SettingsProfile::default();
        profile.sections = vec!["Entscheidungen".to_string()];
        h.pipeline.save_settings(profile).await.unwrap();

        let created = h.pipeline.create_session().await.unwrap();
        write_audio(&h.pipeline, &created.id, &[7u8; 4800]).await;

        // Edit the profile after the session was created.
        let mut edited = SettingsProfile::default();
        edited.sections = vec!["Risiken".to_string()];
        h.pipeline.save_settings(edited).await.unwrap();

        let outcome = h.pipeline.finalize(&created.id).await.unwrap();
        let names: Vec<&str> = outcome.summary.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Entscheidungen"]);
    }
}
