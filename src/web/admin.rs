//! Legacy single-wall mode: a global message board moderated via
//! `AdminSettings`, predating per-user walls. Message documents live
//! under `metadata/` and the settings document at `admin-settings.json`.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    models::{AdminSettings, ApprovalStatus, Message, now_millis},
    moderation::{self, ModerationRules},
    store::keys,
    web::{
        ApiResult, AppState, json_error,
        messages::MessageView,
        uploads,
    },
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMessagesResponse {
    pub messages: Vec<MessageView>,
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMessagesResponse {
    pub messages: Vec<MessageView>,
    pub total: usize,
    pub stats: MessageStats,
}

/// Per-status tallies shown on the moderation dashboard.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    pub with_photo: usize,
}

impl MessageStats {
    pub fn tally(messages: &[Message]) -> Self {
        let mut stats = Self {
            total: messages.len(),
            ..Self::default()
        };
        for message in messages {
            match message.approved {
                ApprovalStatus::Approved => stats.approved += 1,
                ApprovalStatus::Pending => stats.pending += 1,
                ApprovalStatus::Rejected => stats.rejected += 1,
            }
            if message.image_key.is_some() {
                stats.with_photo += 1;
            }
        }
        stats
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    /// Submission timestamp identifying the message, as the legacy
    /// documents have no stable id the dashboard knows about.
    pub created_at: i64,
    pub approved: ApprovalStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    pub approved: ApprovalStatus,
    pub created_at: i64,
}

#[derive(Deserialize)]
pub struct SaveSettingsRequest {
    pub settings: AdminSettings,
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub settings: AdminSettings,
}

/// Guest upload to the global wall.
pub async fn upload_message(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<MessageView> {
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

    let settings = load_settings(&state).await;
    let rules = ModerationRules::from_admin(&settings);
    let status = moderation::decide(&submission.text, &rules);

    let message = Message::new(None, &submission.name, &submission.text, image_key, status);
    let key = keys::legacy_message(message.created_at, &message.id);

    state.store().put_json(&key, &message).await.map_err(|err| {
        error!(%err, "failed to store global-wall message");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store message")
    })?;

    info!(message_id = %message.id, status = status.as_str(), "global-wall message submitted");
    Ok(Json(MessageView::from(message)))
}

/// All global-wall messages, newest first.
pub async fn list_messages(State(state): State<AppState>) -> ApiResult<GlobalMessagesResponse> {
    let messages = load_global_messages(&state).await?;
    let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
    let total = views.len();

    Ok(Json(GlobalMessagesResponse {
        messages: views,
        total,
    }))
}

/// Moderation view: every message plus per-status tallies.
pub async fn admin_messages(State(state): State<AppState>) -> ApiResult<AdminMessagesResponse> {
    let messages = load_global_messages(&state).await?;
    let stats = MessageStats::tally(&messages);
    let views: Vec<MessageView> = messages.into_iter().map(MessageView::from).collect();
    let total = views.len();

    Ok(Json(AdminMessagesResponse {
        messages: views,
        total,
        stats,
    }))
}

/// Updates the approval state of the global-wall message submitted at
/// the given timestamp.
pub async fn approve_message(
    State(state): State<AppState>,
    Json(request): Json<ApproveRequest>,
) -> ApiResult<ApproveResponse> {
    let message_keys = state
        .store()
        .list_keys(keys::LEGACY_MESSAGE_PREFIX)
        .await
        .map_err(|err| {
            error!(%err, "failed to list global-wall messages");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update message")
        })?;

    for key in message_keys.iter().filter(|key| keys::is_message_document(key)) {
        let mut message: Message = match state.store().get_json(key).await {
            Ok(message) => message,
            Err(err) => {
                warn!(%key, %err, "skipping unreadable message during moderation");
                continue;
            }
        };

        if message.created_at != request.created_at {
            continue;
        }

        message.approved = request.approved;
        message.reviewed_at = Some(now_millis());

        state.store().put_json(key, &message).await.map_err(|err| {
            error!(%err, %key, "failed to store moderated message");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update message")
        })?;

        info!(%key, status = request.approved.as_str(), "global-wall message moderated");
        return Ok(Json(ApproveResponse {
            approved: request.approved,
            created_at: request.created_at,
        }));
    }

    Err(json_error(StatusCode::NOT_FOUND, "Message not found"))
}

/// Global settings; a missing or unreadable document yields defaults,
/// never an error.
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<SettingsResponse> {
    Ok(Json(SettingsResponse {
        settings: load_settings(&state).await,
    }))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(request): Json<SaveSettingsRequest>,
) -> ApiResult<SettingsResponse> {
    let mut settings = request.settings;
    settings.last_updated = chrono::Utc::now().to_rfc3339();

    state
        .store()
        .put_json(keys::ADMIN_SETTINGS, &settings)
        .await
        .map_err(|err| {
            error!(%err, "failed to store admin settings");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save settings")
        })?;

    info!("admin settings updated");
    Ok(Json(SettingsResponse { settings }))
}

pub(crate) async fn load_settings(state: &AppState) -> AdminSettings {
    match state.store().get_json(keys::ADMIN_SETTINGS).await {
        Ok(settings) => settings,
        Err(err) => {
            if !err.is_not_found() {
                warn!(%err, "falling back to default admin settings");
            }
            AdminSettings::default()
        }
    }
}

async fn load_global_messages(
    state: &AppState,
) -> Result<Vec<Message>, super::ApiError> {
    let mut messages: Vec<Message> = state
        .store()
        .collect_json(keys::LEGACY_MESSAGE_PREFIX, keys::is_message_document)
        .await
        .map_err(|err| {
            error!(%err, "failed to list global-wall messages");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load messages")
        })?;

    // Newest first on the global wall; the dashboard shows recent
    // submissions at the top.
    messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(status: ApprovalStatus, with_photo: bool) -> Message {
        Message::new(
            None,
            "guest",
            "text",
            with_photo.then(|| "photo.png".to_string()),
            status,
        )
    }

    #[test]
    fn stats_tally_counts_each_status() {
        let messages = vec![
            message(ApprovalStatus::Approved, true),
            message(ApprovalStatus::Approved, false),
            message(ApprovalStatus::Pending, true),
            message(ApprovalStatus::Rejected, false),
        ];

        let stats = MessageStats::tally(&messages);
        assert_eq!(
            stats,
            MessageStats {
                total: 4,
                approved: 2,
                pending: 1,
                rejected: 1,
                with_photo: 2,
            }
        );
    }

    #[test]
    fn stats_of_empty_wall_are_zero() {
        assert_eq!(MessageStats::tally(&[]), MessageStats::default());
    }

    #[test]
    fn approve_request_accepts_only_known_statuses() {
        let ok: Result<ApproveRequest, _> =
            serde_json::from_str(r#"{"createdAt":1,"approved":"rejected"}"#);
        assert!(ok.is_ok());

        let bad: Result<ApproveRequest, _> =
            serde_json::from_str(r#"{"createdAt":1,"approved":"maybe"}"#);
        assert!(bad.is_err());
    }
}
