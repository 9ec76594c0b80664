//! Service wiring: config, engine, pipeline, API server.

use crate::api::ApiServer;
use crate::audio::AudioStore;
use crate::config::Config;
use crate::session::SessionPipeline;
use crate::summary::{OllamaClient, Summarizer};
use crate::transcription::{SpeechEngine, Transcriber, WhisperCliEngine};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting protokoll service");

    let config = Config::load()?;

    let db_path = config.db_path()?;
    let storage_dir = config.storage_dir()?;
    std::fs::create_dir_all(&storage_dir).context("Failed to create storage directory")?;

    // The engine loads its model on first use, not at startup; a misconfigured
    // engine only fails the first finalize, never the whole service.
    let engine_config = config.engine.clone();
    let transcriber = Arc::new(Transcriber::new(move || {
        let engine = WhisperCliEngine::new(
            engine_config.command_path.as_deref(),
            engine_config.model_path.as_deref(),
        )?;
        Ok(Arc::new(engine) as Arc<dyn SpeechEngine>)
    }));

    let generation = OllamaClient::new(
        config.generation.base_url.clone(),
        Duration::from_secs(config.generation.timeout_seconds),
    )?;
    let summarizer = Arc::new(Summarizer::new(
        Arc::new(generation),
        config.generation.model.clone(),
    ));

    let pipeline = Arc::new(SessionPipeline::new(
        db_path,
        AudioStore::new(storage_dir),
        transcriber,
        summarizer,
    ));

    let api_server = ApiServer::new(pipeline, &config.server);
    api_server.start().await
}
