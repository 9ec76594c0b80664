//! Transcription adapter around an external speech-recognition engine.
//!
//! The engine itself is a narrow, blocking interface; the adapter owns the
//! lazily-constructed shared engine instance, moves calls onto the blocking
//! pool, wraps headerless PCM input into a temporary WAV container, and
//! normalizes engine output into the canonical transcription result.

use anyhow::{Context, Result};
use hound::{WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::PipelineError;

pub mod cleaner;
pub mod whisper_cli;

pub use whisper_cli::WhisperCliEngine;

/// One recognized span of speech. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Canonical transcription of one session's audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub detected_language: Option<String>,
    pub duration_seconds: f64,
    pub segments: Vec<Segment>,
    /// Segment texts space-joined in order, untouched by the cleaner.
    pub raw_text: String,
    /// Cleaned transcript; empty when no segment survives the filter.
    pub clean_text: String,
}

/// Raw result of one engine invocation.
#[derive(Debug, Clone)]
pub struct EngineTranscription {
    pub language: Option<String>,
    pub duration_seconds: f64,
    pub segments: Vec<EngineSegment>,
}

#[derive(Debug, Clone)]
pub struct EngineSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Blocking interface to the external recognizer. Implementations are shared
/// across sessions; calls always run on the blocking pool.
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<EngineTranscription>;
}

type EngineFactory = dyn Fn() -> Result<Arc<dyn SpeechEngine>> + Send + Sync;

/// Adapter owning the engine instance for the whole process.
///
/// The engine is constructed on first use (model loading is expensive) and
/// reused afterwards; tests inject a pre-built fake via [`Transcriber::with_engine`].
pub struct Transcriber {
    engine: OnceCell<Arc<dyn SpeechEngine>>,
    factory: Box<EngineFactory>,
}

/// Containers the engine consumes directly; anything else is treated as
/// headerless PCM and wrapped first.
const PASSTHROUGH_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg"];

impl Transcriber {
    pub fn new(
        factory: impl Fn() -> Result<Arc<dyn SpeechEngine>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            engine: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Build an adapter around an already-constructed engine.
    pub fn with_engine(engine: Arc<dyn SpeechEngine>) -> Self {
        let factory_engine = engine.clone();
        Self {
            engine: OnceCell::new_with(Some(engine)),
            factory: Box::new(move || Ok(factory_engine.clone())),
        }
    }

    async fn engine(&self) -> Result<Arc<dyn SpeechEngine>, PipelineError> {
        let engine = self
            .engine
            .get_or_try_init(|| async { (self.factory)() })
            .await
            .map_err(PipelineError::Engine)?;
        Ok(engine.clone())
    }

    /// Transcribe one audio file into the canonical result.
    pub async fn transcribe_file(
        &self,
        audio_path: &Path,
        language_hint: Option<&str>,
    ) -> Result<TranscriptionResult, PipelineError> {
        let engine = self.engine().await?;
        info!(
            "Transcribing audio file {:?} with {}",
            audio_path,
            engine.name()
        );

        let path = audio_path.to_path_buf();
        let language = language_hint.map(str::to_owned);
        let output = tokio::task::spawn_blocking(move || {
            run_engine(engine.as_ref(), &path, language.as_deref())
        })
        .await
        .map_err(|e| PipelineError::engine(anyhow::anyhow!("Transcription task failed: {e}")))??;

        let result = normalize_output(output);
        info!(
            "Transcription complete: {} segments, {} chars raw, {} chars clean",
            result.segments.len(),
            result.raw_text.len(),
            result.clean_text.len()
        );
        Ok(result)
    }
}

fn run_engine(
    engine: &dyn SpeechEngine,
    path: &Path,
    language: Option<&str>,
) -> Result<EngineTranscription, PipelineError> {
    let (input, temp_guard) = prepare_engine_input(path)?;
    let result = engine.transcribe(&input, language).map_err(PipelineError::Engine);
    // The temporary container is removed on every exit path, engine failure
    // included.
    drop(temp_guard);
    result
}

fn prepare_engine_input(path: &Path) -> Result<(PathBuf, Option<TempPath>), PipelineError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if matches!(extension.as_deref(), Some(ext) if PASSTHROUGH_EXTENSIONS.contains(&ext)) {
        return Ok((path.to_path_buf(), None));
    }

    let raw = std::fs::read(path)?;
    if raw.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    let temp = tempfile::Builder::new()
        .prefix("protokoll-audio-")
        .suffix(".wav")
        .tempfile()
        .map_err(PipelineError::from)?;
    let temp_path = temp.into_temp_path();
    write_pcm_wav(&temp_path, &raw).map_err(PipelineError::storage)?;
    Ok((temp_path.to_path_buf(), Some(temp_path)))
}

/// Wrap headerless PCM (mono, 16-bit, 48 kHz) into a WAV container.
fn write_pcm_wav(path: &Path, raw: &[u8]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).context("Failed to create temporary WAV container")?;
    for sample in raw.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }
    writer
        .finalize()
        .context("Failed to finalize temporary WAV container")?;
    Ok(())
}

fn normalize_output(output: EngineTranscription) -> TranscriptionResult {
    let segments: Vec<Segment> = output
        .segments
        .into_iter()
        .enumerate()
        .map(|(index, s)| Segment {
            index,
            start: s.start,
            end: s.end,
            text: s.text.trim().to_string(),
        })
        .collect();

    let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    let raw_text = texts.join(" ");
    let clean_text = cleaner::clean_segments(texts.iter().copied());

    TranscriptionResult {
        detected_language: output.language,
        duration_seconds: output.duration_seconds,
        segments,
        raw_text,
        clean_text,
    }
}
