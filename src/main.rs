//! Thin demo binary exposing the playback engine's control surface over
//! HTTP. Grounded on the teacher's axum bootstrap (`main.rs`): tracing
//! init, CORS layer, a shared `AppState`, plain-HTTP listener — the
//! TLS/TURN/rustls bootstrap the teacher's gateway needed doesn't apply
//! here, since this binary never terminates a real peer connection
//! (SPEC_FULL.md §1).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use liverelay_playout::auth;
use liverelay_playout::config::Config;
use liverelay_playout::control::{PlayArgs, ReturnCode, SessionTable};
use liverelay_playout::demo_gateway::{DemoGateway, DemoPeer};
use liverelay_playout::error::ApiError;
use liverelay_playout::events::EventBus;
use liverelay_playout::session::Session;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

struct AppState {
    sessions: SessionTable<DemoGateway>,
    config: Config,
}

fn require_auth(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    auth::require_api_key(headers, &state.config.api_key)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    recorder: bool,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    require_auth(&headers, &state)?;

    let id = Uuid::new_v4().to_string();
    let peer = DemoPeer::new();
    let session: Session<DemoGateway> = Session::new(id.clone(), peer, req.recorder);
    state.sessions.insert(Arc::new(session));

    Ok(Json(CreateSessionResponse { session_id: id }))
}

#[derive(Deserialize)]
struct PlayRequest {
    transaction: String,
    audio_file: Option<String>,
    video_file: Option<String>,
}

#[derive(Serialize)]
struct PlayResponse {
    code: i32,
}

async fn play_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, ApiError> {
    require_auth(&headers, &state)?;

    let rc = state.sessions.start_playing(PlayArgs {
        session_id: &session_id,
        transaction: &req.transaction,
        recordings_dir: &state.config.recordings_dir,
        audio_file: req.audio_file.as_deref(),
        video_file: req.video_file.as_deref(),
    });

    match rc {
        ReturnCode::Ok => Ok(Json(PlayResponse { code: rc.as_i32() })),
        other => Err(ApiError::from_return_code(other, &session_id)),
    }
}

#[derive(Deserialize)]
struct StopRequest {
    #[serde(default)]
    transaction: String,
}

async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(_req): Json<StopRequest>,
) -> Result<Json<PlayResponse>, ApiError> {
    require_auth(&headers, &state)?;

    let rc = state.sessions.stop_playing(&session_id);
    match rc {
        ReturnCode::Ok => Ok(Json(PlayResponse { code: rc.as_i32() })),
        other => Err(ApiError::from_return_code(other, &session_id)),
    }
}

fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins == "*" {
        tracing::warn!("CORS: permissive mode (allow all origins) — not suitable for production");
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<HeaderValue>().expect("invalid origin header value"))
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                HeaderName::from_static("content-type"),
                HeaderName::from_static("authorization"),
            ])
    }
}

#[tokio::main]
async fn main() {
    let cfg = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();

    let gateway = Arc::new(DemoGateway::new(EventBus::new()));
    let idle_sleep = Duration::from_millis(cfg.idle_sleep_ms);
    let bind_addr = cfg.bind_addr.clone();
    let allowed_origins = cfg.allowed_origins.clone();

    let state = Arc::new(AppState {
        sessions: SessionTable::new(gateway, idle_sleep),
        config: cfg,
    });

    let cors = build_cors_layer(&allowed_origins);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id/play", post(play_handler))
        .route("/v1/sessions/:id/stop", post(stop_handler))
        .layer(cors)
        .with_state(state);

    info!("liverelay-playout demo listening on http://{bind_addr}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
