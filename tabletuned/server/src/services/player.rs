use axum::Json;
use axum::extract::{Path, State};
use libtabletune_queue::tabletune_queue::QueueItem;
use serde::{Deserialize, Serialize};

use crate::server::AppState;
use crate::services::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaybackReport {
    item_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NowPlayingResponse {
    current: Option<QueueItem>,
}

/// The bar-side player connected or asked for a track.
pub(crate) async fn ready(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
) -> Result<Json<NowPlayingResponse>, ApiError> {
    let current = state.queue.player_ready(&bar_id).await?;
    Ok(Json(NowPlayingResponse { current }))
}

pub(crate) async fn completed(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
    Json(report): Json<PlaybackReport>,
) -> Result<Json<NowPlayingResponse>, ApiError> {
    let current = state
        .queue
        .playback_completed(&bar_id, &report.item_id)
        .await?;
    Ok(Json(NowPlayingResponse { current }))
}

pub(crate) async fn skipped(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
    Json(report): Json<PlaybackReport>,
) -> Result<Json<NowPlayingResponse>, ApiError> {
    let current = state
        .queue
        .playback_skipped(&bar_id, &report.item_id)
        .await?;
    Ok(Json(NowPlayingResponse { current }))
}

/// Admin skip of whatever is currently playing.
pub(crate) async fn skip(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
) -> Result<Json<NowPlayingResponse>, ApiError> {
    let current = state.queue.skip_current(&bar_id).await?;
    Ok(Json(NowPlayingResponse { current }))
}

/// Admin override: start the given item next, skipping the current track.
pub(crate) async fn play_now(
    State(state): State<AppState>,
    Path((bar_id, item_id)): Path<(String, String)>,
) -> Result<Json<NowPlayingResponse>, ApiError> {
    let current = state.queue.play_now(&bar_id, &item_id).await?;
    Ok(Json(NowPlayingResponse { current }))
}
