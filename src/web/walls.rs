use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use rand_core::OsRng;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    models::{Wall, WallSettingsPatch, now_millis},
    store::keys,
    web::{
        ApiError, ApiResult, AppState,
        auth::{AuthUser, require_user},
        json_error, store_error,
    },
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWallRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Optional; when present it must match the caller.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub settings: Option<WallSettingsPatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWallRequest {
    pub name: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub settings: Option<WallSettingsPatch>,
    /// Plaintext wall password; hashed before storage.
    #[serde(default)]
    pub password: Option<String>,
}

pub async fn create_wall(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(request): Json<CreateWallRequest>,
) -> ApiResult<Wall> {
    let user = require_user(&state, &headers, &jar)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Wall name is required"));
    }
    if let Some(ref requested_owner) = request.user_id {
        if *requested_owner != user.id {
            return Err(json_error(
                StatusCode::FORBIDDEN,
                "Cannot create wall for another user",
            ));
        }
    }

    let mut wall = Wall::new(
        &user.id,
        name,
        &request.description,
        request.is_public.unwrap_or(true),
    );
    if let Some(ref patch) = request.settings {
        patch.apply_to(&mut wall.settings);
    }

    let key = keys::wall_metadata(&user.id, &wall.id);
    state.store().put_json(&key, &wall).await.map_err(|err| {
        error!(%err, wall_id = %wall.id, "failed to store new wall");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create wall")
    })?;

    info!(wall_id = %wall.id, user_id = %user.id, "wall created");
    Ok(Json(wall.sanitized()))
}

pub async fn list_walls(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Wall>> {
    let user = require_owner(&state, &headers, &jar, &user_id)?;

    let prefix = keys::user_walls_prefix(&user.id);
    let mut walls: Vec<Wall> = state
        .store()
        .collect_json(&prefix, keys::is_wall_metadata)
        .await
        .map_err(|err| {
            error!(%err, user_id = %user.id, "failed to list walls");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch user walls")
        })?;

    for wall in &mut walls {
        wall.message_count = count_messages(&state, &user.id, &wall.id).await;
    }

    walls.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(walls.into_iter().map(Wall::sanitized).collect()))
}

pub async fn get_wall(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id)): Path<(String, String)>,
) -> ApiResult<Wall> {
    let user = require_owner(&state, &headers, &jar, &user_id)?;

    let key = keys::wall_metadata(&user.id, &wall_id);
    let mut wall: Wall = state
        .store()
        .get_json(&key)
        .await
        .map_err(|err| store_error(&err, "Wall not found", "Failed to fetch wall"))?;

    wall.message_count = count_messages(&state, &user.id, &wall.id).await;

    Ok(Json(wall.sanitized()))
}

pub async fn update_wall_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id)): Path<(String, String)>,
    Json(request): Json<UpdateWallRequest>,
) -> ApiResult<Wall> {
    let user = require_owner(&state, &headers, &jar, &user_id)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Wall name is required"));
    }

    let key = keys::wall_metadata(&user.id, &wall_id);
    let mut wall: Wall = state
        .store()
        .get_json(&key)
        .await
        .map_err(|err| store_error(&err, "Wall not found", "Failed to fetch wall"))?;

    wall.name = name.to_string();
    if let Some(is_active) = request.is_active {
        wall.is_active = is_active;
    }
    if let Some(ref patch) = request.settings {
        patch.apply_to(&mut wall.settings);
    }
    if let Some(ref password) = request.password {
        if password.is_empty() {
            wall.settings.password_hash = None;
            wall.settings.require_password = false;
        } else {
            wall.settings.password_hash = Some(hash_wall_password(password)?);
            wall.settings.require_password = true;
        }
    }
    wall.updated_at = now_millis();

    state.store().put_json(&key, &wall).await.map_err(|err| {
        error!(%err, %wall_id, "failed to store wall settings");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update wall settings",
        )
    })?;

    info!(%wall_id, user_id = %user.id, "wall settings updated");
    Ok(Json(wall.sanitized()))
}

/// 401 without a valid token, 403 when the path user is someone else.
fn require_owner(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
    user_id: &str,
) -> Result<AuthUser, ApiError> {
    let user = require_user(state, headers, jar)?;
    if user.id != user_id {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }
    Ok(user)
}

/// Derived message count; a listing failure degrades to zero rather
/// than failing the wall response.
pub(crate) async fn count_messages(state: &AppState, user_id: &str, wall_id: &str) -> u64 {
    let prefix = keys::wall_messages_prefix(user_id, wall_id);
    match state.store().list_keys(&prefix).await {
        Ok(message_keys) => message_keys
            .iter()
            .filter(|key| keys::is_message_document(key))
            .count() as u64,
        Err(err) => {
            warn!(%err, %wall_id, "failed to count wall messages");
            0
        }
    }
}

pub(crate) fn hash_wall_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            error!(%err, "failed to hash wall password");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update wall settings",
            )
        })
}
