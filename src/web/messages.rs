use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    models::{ApprovalStatus, Message, Wall, now_millis},
    store::keys,
    web::{
        ApiResult, AppState,
        auth::require_user,
        json_error, store_error,
    },
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallMessagesResponse {
    pub messages: Vec<MessageView>,
    pub wall_id: String,
    pub user_id: String,
    pub wall_name: String,
    pub total_count: usize,
    /// Count before visibility filtering.
    pub total_raw_count: usize,
}

/// Message as returned to clients: the stored document plus the derived
/// photo URL.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        let photo = message.photo_url();
        Self { message, photo }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCountResponse {
    pub count: usize,
    pub wall_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOutcome {
    pub message_id: String,
    pub approved: ApprovalStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    pub deleted_id: String,
}

/// Owner view of a wall's messages. The owner sees every message; an
/// authenticated visitor may read a public wall, filtered by its
/// `show_unmoderated` setting (off means approved only).
pub async fn list_wall_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id)): Path<(String, String)>,
) -> ApiResult<WallMessagesResponse> {
    let user = require_user(&state, &headers, &jar)?;

    let wall: Wall = state
        .store()
        .get_json(&keys::wall_metadata(&user_id, &wall_id))
        .await
        .map_err(|err| store_error(&err, "Wall not found", "Failed to fetch wall messages"))?;

    let is_owner = user.id == user_id;
    if !is_owner && !wall.is_public {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }

    let mut messages = load_wall_messages(&state, &user_id, &wall_id).await?;
    let raw_count = messages.len();

    if !is_owner && !wall.settings.show_unmoderated {
        messages.retain(|message| message.approved == ApprovalStatus::Approved);
    }

    // Oldest first: the slideshow plays messages in arrival order.
    messages.sort_by_key(|message| message.created_at);

    let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
    let total = views.len();

    Ok(Json(WallMessagesResponse {
        messages: views,
        wall_id,
        user_id,
        wall_name: wall.name,
        total_count: total,
        total_raw_count: raw_count,
    }))
}

pub async fn count_wall_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id)): Path<(String, String)>,
) -> ApiResult<MessageCountResponse> {
    let user = require_user(&state, &headers, &jar)?;
    if user.id != user_id {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }

    let count = super::walls::count_messages(&state, &user_id, &wall_id).await;
    Ok(Json(MessageCountResponse {
        count: count as usize,
        wall_id,
    }))
}

pub async fn approve_message(
    state: State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    path: Path<(String, String, String)>,
) -> ApiResult<ModerationOutcome> {
    set_message_status(state, headers, jar, path, ApprovalStatus::Approved).await
}

pub async fn reject_message(
    state: State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    path: Path<(String, String, String)>,
) -> ApiResult<ModerationOutcome> {
    set_message_status(state, headers, jar, path, ApprovalStatus::Rejected).await
}

async fn set_message_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id, message_id)): Path<(String, String, String)>,
    status: ApprovalStatus,
) -> ApiResult<ModerationOutcome> {
    let user = require_user(&state, &headers, &jar)?;
    if user.id != user_id {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }

    let key = keys::wall_message(&user_id, &wall_id, &message_id);
    let mut message: Message = state
        .store()
        .get_json(&key)
        .await
        .map_err(|err| store_error(&err, "Message not found", "Failed to update message"))?;

    message.approved = status;
    message.reviewed_at = Some(now_millis());
    message.reviewed_by = Some(user.id.clone());

    state.store().put_json(&key, &message).await.map_err(|err| {
        error!(%err, %message_id, "failed to store moderated message");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update message")
    })?;

    info!(%message_id, %wall_id, status = status.as_str(), "message moderated");
    Ok(Json(ModerationOutcome {
        message_id,
        approved: status,
    }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((user_id, wall_id, message_id)): Path<(String, String, String)>,
) -> ApiResult<DeletionOutcome> {
    let user = require_user(&state, &headers, &jar)?;
    if user.id != user_id {
        return Err(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }

    let key = keys::wall_message(&user_id, &wall_id, &message_id);
    let message: Message = state
        .store()
        .get_json(&key)
        .await
        .map_err(|err| store_error(&err, "Message not found", "Failed to delete message"))?;

    // Best effort on the photo blob: an orphaned image is preferable to
    // a message that cannot be removed.
    if let Some(ref image_key) = message.image_key {
        let blob_key = keys::image(image_key);
        if let Err(err) = state.store().delete(&blob_key).await {
            warn!(%err, %blob_key, "failed to delete message photo");
        }
    }

    state.store().delete(&key).await.map_err(|err| {
        error!(%err, %message_id, "failed to delete message document");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete message")
    })?;

    info!(%message_id, %wall_id, "message deleted");
    Ok(Json(DeletionOutcome {
        deleted_id: message_id,
    }))
}

/// Loads every message document under the wall, skipping unreadable
/// entries.
pub(crate) async fn load_wall_messages(
    state: &AppState,
    user_id: &str,
    wall_id: &str,
) -> Result<Vec<Message>, super::ApiError> {
    let prefix = keys::wall_messages_prefix(user_id, wall_id);
    state
        .store()
        .collect_json(&prefix, keys::is_message_document)
        .await
        .map_err(|err| {
            error!(%err, %wall_id, "failed to list wall messages");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch wall messages",
            )
        })
}
