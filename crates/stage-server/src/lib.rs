pub mod hub;
pub mod session;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use hub::{Hub, HubConfig};

pub fn app(hub: Arc<Hub>) -> Router {
    let asset_dir = hub.config().asset_dir.clone();
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket))
        .nest_service("/assets", ServeDir::new(asset_dir))
        .layer(cors_layer())
        .with_state(hub)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn websocket(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<Hub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, hub))
}
