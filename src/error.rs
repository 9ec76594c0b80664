//! Error taxonomy for the session pipeline.
//!
//! Transcription problems are fatal to a finalize attempt; generation
//! problems never surface here; the summarizer degrades to the placeholder
//! protocol on its own.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unknown session id.
    #[error("Sitzung nicht gefunden")]
    NotFound,

    /// The session has no audio path attached.
    #[error("Keine Audiodaten")]
    MissingAudio,

    /// An audio path is attached but the data cannot be located.
    #[error("Audiodatei fehlt")]
    AudioUnavailable,

    /// The audio input has zero bytes.
    #[error("Audiodatei ist leer")]
    EmptyAudio,

    /// Finalize was attempted on a session that is not recording.
    #[error("Sitzung ist nicht im Aufnahmezustand (Status: {0})")]
    NotRecording(String),

    /// The speech-recognition engine itself failed.
    #[error("Spracherkennung fehlgeschlagen: {0}")]
    Engine(anyhow::Error),

    /// Reading or writing session state failed.
    #[error("Speicherfehler: {0}")]
    Storage(anyhow::Error),
}

impl PipelineError {
    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        Self::Storage(err.into())
    }

    pub fn engine(err: impl Into<anyhow::Error>) -> Self {
        Self::Engine(err.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(PipelineError::NotFound.to_string(), "Sitzung nicht gefunden");
        assert_eq!(PipelineError::MissingAudio.to_string(), "Keine Audiodaten");
        assert_eq!(
            PipelineError::NotRecording("completed".to_string()).to_string(),
            "Sitzung ist nicht im Aufnahmezustand (Status: completed)"
        );
    }

    #[test]
    fn test_engine_error_preserves_source() {
        let err = PipelineError::engine(anyhow::anyhow!("model not loaded"));
        assert!(err.to_string().contains("model not loaded"));
    }
}
