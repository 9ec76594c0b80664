//! Session API endpoints.
//!
//! REST surface for creating, inspecting, and finalizing sessions, plus the
//! WebSocket endpoint that carries the live audio stream.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::ApiState;
use crate::db::SessionRecord;
use crate::error::PipelineError;
use crate::session::title::fallback_title;
use crate::session::SessionStatus;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/transcript", get(get_transcript))
        .route("/sessions/:id/summary", get(get_summary))
        .route("/sessions/:id/audio", post(append_audio))
        .route("/sessions/:id/finalize", post(finalize_session))
        .route("/sessions/:id/stream", get(stream_audio))
        .with_state(state)
}

async fn create_session(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let created = state.pipeline.create_session().await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": created.id,
            "websocket_url": created.websocket_url,
            "created_at": created.created_at,
        })),
    ))
}

fn list_item(record: &SessionRecord) -> Value {
    json!({
        "id": record.id,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
        "status": record.status,
        "has_transcript": record.has_transcript(),
        "title": record
            .title
            .clone()
            .unwrap_or_else(|| fallback_title(record.created_at_naive())),
    })
}

async fn list_sessions(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let records = state.pipeline.list_sessions().await?;
    let entries: Vec<Value> = records.iter().map(list_item).collect();
    Ok(Json(json!(entries)))
}

async fn get_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    let record = state.pipeline.get_session(&id).await?;
    let mut detail = list_item(&record);
    detail["language"] = json!(record.language);
    detail["summary"] = parse_json_column(record.summary_json.as_deref());
    Ok(Json(detail))
}

async fn get_transcript(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    let record = state.pipeline.get_session(&id).await?;
    let transcript = record
        .transcript_text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::not_found("Transkript nicht gefunden"))?;
    Ok(Json(json!({
        "transcript": transcript,
        "summary": parse_json_column(record.summary_json.as_deref()),
    })))
}

async fn get_summary(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    let summary = state.pipeline.get_summary(&id).await?;
    Ok(Json(serde_json::to_value(summary).map_err(|e| {
        ApiError::internal(format!("Failed to serialize summary: {e}"))
    })?))
}

#[derive(Debug, Deserialize)]
struct AppendAudioRequest {
    /// Base64-encoded audio chunk.
    chunk: String,
}

/// Append one audio chunk outside the stream. Accepted while the session is
/// still recording; finalize is the cut-off.
async fn append_audio(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<AppendAudioRequest>,
) -> ApiResult<Json<Value>> {
    let record = state.pipeline.get_session(&id).await?;
    if record.status() != Some(SessionStatus::Recording) {
        return Err(PipelineError::NotRecording(record.status.clone()).into());
    }
    let audio_path = record
        .audio_path
        .as_deref()
        .ok_or(PipelineError::MissingAudio)?;

    let bytes = BASE64
        .decode(request.chunk.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("Ungueltige Audiodaten: {e}")))?;

    let written = crate::audio::append_chunk(std::path::Path::new(audio_path), &bytes)
        .await
        .map_err(PipelineError::from)?;

    Ok(Json(json!({ "ok": true, "bytes": written })))
}

async fn finalize_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    info!("Finalize requested for session {}", id);
    let outcome = state.pipeline.finalize(&id).await?;
    Ok(Json(json!({
        "id": outcome.id,
        "status": outcome.status,
        "transcript": outcome.transcript,
        "summary": outcome.summary,
        "title": outcome.title,
    })))
}

fn parse_json_column(column: Option<&str>) -> Value {
    column
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or(Value::Null)
}

// ============================================================================
// WebSocket audio stream
// ============================================================================

async fn stream_audio(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| async move {
        if let Err(err) = handle_stream(state, id, socket).await {
            error!("WebSocket audio stream failed: {err:#}");
        }
    })
}

/// Pump the live audio stream into the session's append-only sink.
///
/// Binary frames extend the audio file in arrival order; a "stop" text frame
/// or a disconnect ends the loop. The session stays in the recording state;
/// finalize is a separate call.
async fn handle_stream(state: ApiState, id: String, mut socket: WebSocket) -> anyhow::Result<()> {
    let record = match state.pipeline.get_session(&id).await {
        Ok(record) => record,
        Err(_) => {
            reject_stream(&mut socket, "Sitzung nicht gefunden").await;
            return Ok(());
        }
    };

    let Some(audio_path) = record.audio_path.as_deref().map(std::path::PathBuf::from) else {
        reject_stream(&mut socket, "Keine Audiodaten").await;
        return Ok(());
    };

    let mut sink = state.pipeline.audio_store().open(&audio_path).await?;
    info!("Audio stream opened for session {}", id);

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!("Audio stream for session {} dropped: {}", id, err);
                break;
            }
        };

        match message {
            Message::Binary(bytes) if !bytes.is_empty() => match sink.append(&bytes).await {
                Ok(written) => {
                    let ack = json!({ "ok": true, "bytes": written }).to_string();
                    if socket.send(Message::Text(ack)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!("Failed to append audio for session {}: {}", id, err);
                    let payload = json!({ "error": err.to_string() }).to_string();
                    socket.send(Message::Text(payload)).await.ok();
                    break;
                }
            },
            Message::Binary(_) => {}
            Message::Text(text) => {
                if text == "stop" {
                    let ack = json!({ "ok": true, "event": "stopped" }).to_string();
                    socket.send(Message::Text(ack)).await.ok();
                    break;
                }
                socket.send(Message::Text(json!({ "ok": true }).to_string())).await.ok();
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let received = sink.bytes_written();
    sink.close().await?;
    info!(
        "Audio stream closed for session {} ({} bytes received)",
        id, received
    );
    Ok(())
}

async fn reject_stream(socket: &mut WebSocket, reason: &str) {
    let payload = json!({ "error": reason }).to_string();
    socket.send(Message::Text(payload)).await.ok();
    socket
        .send(Message::Close(Some(CloseFrame {
            code: 1008,
            reason: reason.to_string().into(),
        })))
        .await
        .ok();
}
