//! HTTP entry: three WebSocket upgrade endpoints and a liveness string.

pub mod connection;
pub mod racing;

use crate::config::Config;
use crate::ocean::Ocean;
use crate::racing::RacingWorld;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    ocean: Arc<Ocean>,
    racing: Arc<RacingWorld>,
}

/// Run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let (ocean, input_rx) = Ocean::new(config.clone());
    ocean.start(input_rx);

    let racing = RacingWorld::new(config.clone());

    let state = AppState {
        config: config.clone(),
        ocean,
        racing,
    };

    let app = Router::new()
        .route("/ws", get(ocean_handler))
        .route("/ws/meta", get(meta_handler))
        .route("/ws/racing", get(racing_handler))
        .route("/", get(liveness))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Ocean WebSocket endpoint: ws://{}/ws", addr);
    info!("Racing WebSocket endpoint: ws://{}/ws/racing", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn liveness() -> &'static str {
    "Fishy Business Server Running"
}

async fn ocean_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_ocean_socket(socket, state.ocean))
}

#[derive(Debug, Deserialize)]
struct MetaParams {
    id: String,
}

async fn meta_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<MetaParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_meta_socket(socket, state.ocean, params.id))
}

async fn racing_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        racing::handle_racing_socket(socket, state.racing, state.config)
    })
}
