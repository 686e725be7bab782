use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use eyre::{Result, WrapErr};
use libtabletune_queue::tabletune_queue::TabletuneQueue;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::services::{player, requests};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) queue: Arc<TabletuneQueue>,
}

pub(crate) fn router(queue: Arc<TabletuneQueue>) -> Router {
    Router::new()
        .route("/bars/{bar_id}/requests", post(requests::submit))
        .route("/bars/{bar_id}/queue", get(requests::snapshot))
        .route("/bars/{bar_id}/events", get(requests::events))
        .route(
            "/bars/{bar_id}/items/{item_id}/moderate",
            post(requests::moderate),
        )
        .route(
            "/bars/{bar_id}/items/{item_id}/play-now",
            post(player::play_now),
        )
        .route("/bars/{bar_id}/items/{item_id}", delete(requests::remove))
        .route(
            "/bars/{bar_id}/tables/{table_id}/points",
            get(requests::balance),
        )
        .route(
            "/bars/{bar_id}/tables/{table_id}/points/credit",
            post(requests::credit),
        )
        .route("/bars/{bar_id}/player/ready", post(player::ready))
        .route("/bars/{bar_id}/player/completed", post(player::completed))
        .route("/bars/{bar_id}/player/skipped", post(player::skipped))
        .route("/bars/{bar_id}/player/skip", post(player::skip))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { queue })
}

pub(crate) async fn run(addr: SocketAddr, queue: Arc<TabletuneQueue>) -> Result<()> {
    let app = router(queue.clone());
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("error binding {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("error running server")?;

    queue.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
}
