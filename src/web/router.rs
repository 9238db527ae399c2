use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use crate::web::{AppState, admin, auth, messages, public, walls};

/// Uploads carry a photo; everything else is small JSON.
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // OAuth / JWT
        .route("/api/auth/sso-callback", post(auth::sso_callback))
        // Owner wall management
        .route("/api/walls", post(walls::create_wall))
        .route("/api/users/:user_id/walls", get(walls::list_walls))
        .route("/api/users/:user_id/walls/:wall_id", get(walls::get_wall))
        .route(
            "/api/users/:user_id/walls/:wall_id/settings",
            put(walls::update_wall_settings),
        )
        // Owner message moderation
        .route(
            "/api/users/:user_id/walls/:wall_id/messages",
            get(messages::list_wall_messages),
        )
        .route(
            "/api/users/:user_id/walls/:wall_id/messages/count",
            get(messages::count_wall_messages),
        )
        .route(
            "/api/users/:user_id/walls/:wall_id/messages/:message_id",
            delete(messages::delete_message),
        )
        .route(
            "/api/users/:user_id/walls/:wall_id/messages/:message_id/approve",
            post(messages::approve_message),
        )
        .route(
            "/api/users/:user_id/walls/:wall_id/messages/:message_id/reject",
            post(messages::reject_message),
        )
        // Public wall + guest submissions
        .route("/api/wall/:wall_id", get(public::get_public_wall))
        .route(
            "/api/wall/:wall_id/messages",
            get(public::get_public_wall_messages).post(public::submit_wall_message),
        )
        .route("/api/wall/:wall_id/unlock", post(public::unlock_wall))
        .route("/api/image/:name", get(public::get_image))
        // Legacy global wall
        .route("/api/upload", post(admin::upload_message))
        .route("/api/messages", get(admin::list_messages))
        .route("/api/admin/messages", get(admin::admin_messages))
        .route("/api/admin/approve", post(admin::approve_message))
        .route(
            "/api/admin/settings",
            get(admin::get_settings).post(admin::save_settings),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    if state.store().health_check().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
