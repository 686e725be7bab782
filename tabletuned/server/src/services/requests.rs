use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use libtabletune_queue::tabletune_queue::{QueueItem, QueueSnapshot, SongRequest};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::server::AppState;
use crate::services::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitBody {
    table_id: String,
    track_id: String,
    #[serde(default)]
    is_priority: bool,
    #[serde(default)]
    requested_by: Option<String>,
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<QueueItem>), ApiError> {
    let request = SongRequest {
        bar_id,
        table_id: body.table_id,
        track_id: body.track_id,
        is_priority: body.is_priority,
        requested_by: body.requested_by,
    };
    let item = state.queue.submit_request(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub(crate) async fn snapshot(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
) -> Result<Json<QueueSnapshot>, ApiError> {
    Ok(Json(state.queue.snapshot(&bar_id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModerateBody {
    approve: bool,
}

pub(crate) async fn moderate(
    State(state): State<AppState>,
    Path((bar_id, item_id)): Path<(String, String)>,
    Json(body): Json<ModerateBody>,
) -> Result<Json<QueueItem>, ApiError> {
    let item = state
        .queue
        .moderate(&bar_id, &item_id, body.approve)
        .await?;
    Ok(Json(item))
}

pub(crate) async fn remove(
    State(state): State<AppState>,
    Path((bar_id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.queue.remove_item(&bar_id, &item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BalanceResponse {
    table_id: String,
    balance: u64,
}

pub(crate) async fn balance(
    State(state): State<AppState>,
    Path((bar_id, table_id)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.queue.balance(&bar_id, &table_id).await?;
    Ok(Json(BalanceResponse { table_id, balance }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreditBody {
    amount: u64,
}

pub(crate) async fn credit(
    State(state): State<AppState>,
    Path((bar_id, table_id)): Path<(String, String)>,
    Json(body): Json<CreditBody>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .queue
        .credit_points(&bar_id, &table_id, body.amount)
        .await?;
    Ok(Json(BalanceResponse { table_id, balance }))
}

/// Server-sent stream of `queue-updated`, `now-playing` and
/// `points-updated` events for one bar. A subscriber that falls behind
/// skips ahead; reconnecting clients reconcile via the snapshot route
/// instead of event replay.
pub(crate) async fn events(
    State(state): State<AppState>,
    Path(bar_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.queue.subscribe(&bar_id);
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => match Event::default().event(event.to_string()).json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!("error serializing event: {e:?}");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("subscriber lagged behind, skipped {skipped} events");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
