use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordVerifier};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    models::{ApprovalStatus, Message, Wall},
    moderation::{self, ModerationRules},
    store::keys,
    web::{
        ApiError, ApiResult, AppState, json_error,
        messages::{MessageView, load_wall_messages},
        uploads,
    },
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicWallResponse {
    #[serde(flatten)]
    pub wall: Wall,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMessagesResponse {
    pub messages: Vec<MessageView>,
    pub wall_id: String,
    pub user_id: String,
    pub wall_name: String,
    pub total_count: usize,
    pub total_raw_count: usize,
}

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct UnlockResponse {
    pub success: bool,
}

/// Public wall metadata, located by scanning user prefixes for the wall
/// id. 404 for unknown walls, 403 for private ones.
pub async fn get_public_wall(
    State(state): State<AppState>,
    Path(wall_id): Path<String>,
) -> ApiResult<PublicWallResponse> {
    let (wall, _) = find_public_wall(&state, &wall_id).await?;
    Ok(Json(PublicWallResponse {
        wall: wall.sanitized(),
    }))
}

/// Approved messages of a public wall, oldest first.
pub async fn get_public_wall_messages(
    State(state): State<AppState>,
    Path(wall_id): Path<String>,
) -> ApiResult<PublicMessagesResponse> {
    let (wall, owner_id) = find_public_wall(&state, &wall_id).await?;

    let mut messages = load_wall_messages(&state, &owner_id, &wall_id).await?;
    let raw_count = messages.len();

    messages.retain(|message| message.approved == ApprovalStatus::Approved);
    messages.sort_by_key(|message| message.created_at);

    let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
    let total = views.len();

    Ok(Json(PublicMessagesResponse {
        messages: views,
        wall_id,
        user_id: owner_id,
        wall_name: wall.name,
        total_count: total,
        total_raw_count: raw_count,
    }))
}

/// Guest submission to a public wall: multipart `name`, `text`, and an
/// optional `photo`. The moderation decision runs once, here, against
/// the wall's settings.
pub async fn submit_wall_message(
    State(state): State<AppState>,
    Path(wall_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<MessageView> {
    let (wall, owner_id) = find_public_wall(&state, &wall_id).await?;
    if !wall.is_active {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "This wall is not accepting messages",
        ));
    }

    let submission = uploads::read_guest_form(multipart)
        .await
        .map_err(|err| json_error(StatusCode::BAD_REQUEST, err.message()))?;

    if submission.text.is_empty() && submission.photo.is_none() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "A message needs text or a photo",
        ));
    }

    let image_key = match submission.photo {
        Some(photo) => {
            let blob_key = keys::image(&photo.stored_name);
            state
                .store()
                .put_blob(&blob_key, photo.bytes, photo.content_type)
                .await
                .map_err(|err| {
                    error!(%err, %blob_key, "failed to store uploaded photo");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store photo")
                })?;
            Some(photo.stored_name)
        }
        None => None,
    };

    let rules = ModerationRules::from_wall(&wall.settings);
    let status = moderation::decide(&submission.text, &rules);

    let message = Message::new(
        Some(&wall_id),
        &submission.name,
        &submission.text,
        image_key,
        status,
    );

    let key = keys::wall_message(&owner_id, &wall_id, &message.id);
    state.store().put_json(&key, &message).await.map_err(|err| {
        error!(%err, %wall_id, "failed to store guest message");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store message")
    })?;

    info!(
        message_id = %message.id,
        %wall_id,
        status = status.as_str(),
        has_photo = message.image_key.is_some(),
        "guest message submitted"
    );
    Ok(Json(MessageView::from(message)))
}

/// Verifies the wall password for `require_password` walls. Throttled
/// per client IP like the original login endpoint.
pub async fn unlock_wall(
    State(state): State<AppState>,
    Path(wall_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UnlockRequest>,
) -> ApiResult<UnlockResponse> {
    let client_ip = client_ip(&headers);

    if state.unlock_throttled(&client_ip).await {
        return Err(json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts, try again in 15 minutes",
        ));
    }

    let (wall, _) = find_public_wall(&state, &wall_id).await?;

    if !wall.settings.require_password {
        return Ok(Json(UnlockResponse { success: true }));
    }

    let Some(ref hash) = wall.settings.password_hash else {
        warn!(%wall_id, "wall requires a password but has no stored hash");
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Wall password is not configured",
        ));
    };

    if verify_wall_password(&request.password, hash) {
        state.clear_unlock_failures(&client_ip).await;
        Ok(Json(UnlockResponse { success: true }))
    } else {
        state.record_unlock_failure(&client_ip).await;
        Err(json_error(StatusCode::UNAUTHORIZED, "Wrong password"))
    }
}

/// Streams a stored photo blob with its content type.
pub async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if name.contains('/') || name.contains("..") {
        return Err(json_error(StatusCode::BAD_REQUEST, "Invalid image name"));
    }

    let key = keys::image(&name);
    let (bytes, content_type) = state.store().get_blob(&key).await.map_err(|err| {
        if err.is_not_found() {
            json_error(StatusCode::NOT_FOUND, "Image not found")
        } else {
            error!(%err, %key, "failed to read image blob");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read image")
        }
    })?;

    let content_type =
        content_type.unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Scans `users/` for the wall, enforcing public visibility. Returns the
/// wall and its owner's id.
async fn find_public_wall(state: &AppState, wall_id: &str) -> Result<(Wall, String), ApiError> {
    let all_keys = state
        .store()
        .list_keys(keys::USERS_PREFIX)
        .await
        .map_err(|err| {
            error!(%err, %wall_id, "failed to scan for wall");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch wall")
        })?;

    let Some((metadata_key, owner_id)) = all_keys.iter().find_map(|key| {
        keys::owner_of_wall_metadata(key, wall_id).map(|owner| (key.clone(), owner.to_string()))
    }) else {
        return Err(json_error(StatusCode::NOT_FOUND, "Wall not found"));
    };

    let wall: Wall = state.store().get_json(&metadata_key).await.map_err(|err| {
        error!(%err, %metadata_key, "failed to read wall metadata");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch wall")
    })?;

    if !wall.is_public {
        return Err(json_error(StatusCode::FORBIDDEN, "This wall is private"));
    }

    Ok((wall, owner_id))
}

fn verify_wall_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Client address for throttling, taken from the usual proxy headers.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::walls::hash_wall_password;

    #[test]
    fn wall_password_round_trips_through_argon2() {
        let hash = hash_wall_password("our-big-day").unwrap();
        assert!(verify_wall_password("our-big-day", &hash));
        assert!(!verify_wall_password("guess", &hash));
    }

    #[test]
    fn invalid_hash_never_verifies() {
        assert!(!verify_wall_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "203.0.113.7");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_ip(&headers), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
