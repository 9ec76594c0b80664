//! Settings API endpoints.

use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::ApiState;
use crate::settings::SettingsProfile;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .with_state(state)
}

async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let profile = state.pipeline.load_settings().await?;
    Ok(Json(json!({ "data": profile })))
}

async fn update_settings(
    State(state): State<ApiState>,
    Json(profile): Json<SettingsProfile>,
) -> ApiResult<Json<Value>> {
    info!("Updating settings profile ({} sections)", profile.sections.len());
    let saved = state.pipeline.save_settings(profile).await?;
    Ok(Json(json!({ "data": saved })))
}
