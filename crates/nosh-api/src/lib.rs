//! # nosh-api
//!
//! HTTP surface for NOsh. Handlers validate input, resolve the caller's
//! session from cookies, and delegate persistence, auth and file storage
//! to the [`nosh_core::Platform`] held in [`AppState`].

pub mod config;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod session;
pub mod state;
pub mod telemetry;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;

use handlers::{auth, files, notes, rooms};

/// Time-ordered UUIDv7 request IDs for log correlation.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Full application router with middleware.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.config.cors_origins()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/login/google", get(auth::login_google))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/store-token", post(auth::store_token))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Room files
        .route("/files/upload", post(files::upload_room_file))
        // Rooms and notes
        .route("/notes/rooms/create", post(rooms::create_room))
        .route("/notes/rooms/list", get(rooms::list_rooms))
        .route("/notes/notes/upload", post(notes::upload_note))
        .route("/notes/by-room/:room_id", get(notes::notes_by_room))
        .route("/notes/notes/file-url", get(notes::file_url_query))
        .route("/notes/notes/file-url/:note_id", get(notes::file_url))
        .route(
            "/notes/notes/:note_id",
            get(notes::get_note).put(notes::update_note),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
