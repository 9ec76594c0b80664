//! Speech engine backed by a whisper.cpp-style CLI.
//!
//! The binary is invoked once per session with JSON output enabled; the
//! JSON file lands in a temporary directory that is discarded after parsing.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::{EngineSegment, EngineTranscription, SpeechEngine};

pub struct WhisperCliEngine {
    command: PathBuf,
    model_path: Option<PathBuf>,
}

impl WhisperCliEngine {
    pub fn new(command_path: Option<&str>, model_path: Option<&str>) -> Result<Self> {
        let command = match command_path {
            Some(path) => PathBuf::from(path),
            None => which::which("whisper-cli")
                .context("whisper-cli not found in PATH (set engine.command_path)")?,
        };

        info!("Initialized whisper CLI engine: {:?}", command);

        Ok(Self {
            command,
            model_path: model_path.map(PathBuf::from),
        })
    }
}

impl SpeechEngine for WhisperCliEngine {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<EngineTranscription> {
        let out_dir = tempfile::tempdir().context("Failed to create engine output dir")?;
        let out_prefix = out_dir.path().join("transcript");

        let mut cmd = Command::new(&self.command);
        cmd.arg("-f")
            .arg(audio_path)
            .arg("-oj")
            .arg("-of")
            .arg(&out_prefix)
            .arg("-np");
        if let Some(model) = &self.model_path {
            cmd.arg("-m").arg(model);
        }
        if let Some(lang) = language {
            cmd.args(["-l", lang]);
        }

        debug!("Running whisper CLI: {:?}", cmd);
        let output = cmd.output().context("Failed to run whisper CLI")?;
        if !output.status.success() {
            bail!(
                "whisper CLI exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let json_path = out_prefix.with_extension("json");
        let json = std::fs::read_to_string(&json_path)
            .context("whisper CLI produced no JSON output")?;
        parse_cli_output(&json)
    }
}

#[derive(Debug, Deserialize)]
struct CliOutput {
    result: Option<CliResult>,
    #[serde(default)]
    transcription: Vec<CliSegment>,
}

#[derive(Debug, Deserialize)]
struct CliResult {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CliSegment {
    offsets: CliOffsets,
    text: String,
}

/// Millisecond offsets as whisper.cpp emits them.
#[derive(Debug, Deserialize)]
struct CliOffsets {
    from: u64,
    to: u64,
}

fn parse_cli_output(json: &str) -> Result<EngineTranscription> {
    let parsed: CliOutput =
        serde_json::from_str(json).context("Failed to parse whisper CLI JSON output")?;

    let segments: Vec<EngineSegment> = parsed
        .transcription
        .into_iter()
        .map(|s| EngineSegment {
            start: s.offsets.from as f64 / 1000.0,
            end: s.offsets.to as f64 / 1000.0,
            text: s.text,
        })
        .collect();
    let duration_seconds = segments.last().map(|s| s.end).unwrap_or(0.0);

    Ok(EngineTranscription {
        language: parsed.result.and_then(|r| r.language),
        duration_seconds,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = r#"{
        "result": { "language": "de" },
        "transcription": [
            {
                "timestamps": { "from": "00:00:00,000", "to": "00:00:02,500" },
                "offsets": { "from": 0, "to": 2500 },
                "text": " Wir haben das Budget besprochen."
            },
            {
                "timestamps": { "from": "00:00:02,500", "to": "00:00:04,000" },
                "offsets": { "from": 2500, "to": 4000 },
                "text": " Keine weiteren Punkte."
            }
        ]
    }"#;

    #[test]
    fn test_parse_cli_output() {
        let result = parse_cli_output(SAMPLE_OUTPUT).unwrap();
        assert_eq!(result.language.as_deref(), Some("de"));
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].start, 0.0);
        assert_eq!(result.segments[0].end, 2.5);
        assert_eq!(result.segments[1].text, " Keine weiteren Punkte.");
        assert_eq!(result.duration_seconds, 4.0);
    }

    #[test]
    fn test_parse_output_without_segments() {
        let result = parse_cli_output(r#"{"result":{"language":"de"},"transcription":[]}"#).unwrap();
        assert!(result.segments.is_empty());
        assert_eq!(result.duration_seconds, 0.0);
    }

    #[test]
    fn test_parse_output_without_language_block() {
        let result = parse_cli_output(r#"{"transcription":[]}"#).unwrap();
        assert!(result.language.is_none());
    }

    #[test]
    fn test_parse_invalid_json_is_an_error() {
        assert!(parse_cli_output("nicht json").is_err());
    }
}
