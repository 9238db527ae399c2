use chrono::Utc;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters escaped when an image key is placed in a URL path
/// segment. Covers the query and fragment delimiters along with
/// anything a browser would mangle.
const IMAGE_NAME_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Moderation state of a guest submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// Slideshow layout selected for a wall.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Grid,
    Polaroid,
    Magazine,
    Stories,
    Enhanced,
}

/// Per-wall configuration stored inside the wall metadata document.
///
/// Wall passwords are only ever persisted as an argon2 hash; the hash is
/// stripped before a wall is returned to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WallSettings {
    pub display_mode: DisplayMode,
    pub theme: String,
    pub background_color: String,
    pub text_color: String,
    pub font_family: String,
    pub font_size: u32,
    pub auto_approve: bool,
    pub show_unmoderated: bool,
    pub auto_approve_keywords: String,
    pub auto_reject_keywords: String,
    pub require_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub autoplay_delay: u32,
    pub image_extra_delay: u32,
    pub wall_title: String,
    pub wall_subtitle: String,
}

impl Default for WallSettings {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Grid,
            theme: "default".to_string(),
            background_color: "#ffffff".to_string(),
            text_color: "#333333".to_string(),
            font_family: "Inter, sans-serif".to_string(),
            font_size: 48,
            // New walls approve submissions automatically; owners opt in
            // to manual review.
            auto_approve: true,
            show_unmoderated: false,
            auto_approve_keywords: String::new(),
            auto_reject_keywords: String::new(),
            require_password: false,
            password_hash: None,
            autoplay_delay: 4,
            image_extra_delay: 1,
            wall_title: String::new(),
            wall_subtitle: String::new(),
        }
    }
}

/// Partial settings payload accepted on wall creation and updates.
///
/// Present fields overwrite the current value, absent fields keep it,
/// mirroring a shallow merge over the stored settings document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WallSettingsPatch {
    pub display_mode: Option<DisplayMode>,
    pub theme: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<u32>,
    pub auto_approve: Option<bool>,
    pub show_unmoderated: Option<bool>,
    pub auto_approve_keywords: Option<String>,
    pub auto_reject_keywords: Option<String>,
    pub require_password: Option<bool>,
    pub autoplay_delay: Option<u32>,
    pub image_extra_delay: Option<u32>,
    pub wall_title: Option<String>,
    pub wall_subtitle: Option<String>,
}

impl WallSettingsPatch {
    pub fn apply_to(&self, settings: &mut WallSettings) {
        if let Some(mode) = self.display_mode {
            settings.display_mode = mode;
        }
        if let Some(ref theme) = self.theme {
            settings.theme = theme.clone();
        }
        if let Some(ref color) = self.background_color {
            settings.background_color = color.clone();
        }
        if let Some(ref color) = self.text_color {
            settings.text_color = color.clone();
        }
        if let Some(ref family) = self.font_family {
            settings.font_family = family.clone();
        }
        if let Some(size) = self.font_size {
            settings.font_size = size;
        }
        if let Some(auto) = self.auto_approve {
            settings.auto_approve = auto;
        }
        if let Some(show) = self.show_unmoderated {
            settings.show_unmoderated = show;
        }
        if let Some(ref keywords) = self.auto_approve_keywords {
            settings.auto_approve_keywords = keywords.clone();
        }
        if let Some(ref keywords) = self.auto_reject_keywords {
            settings.auto_reject_keywords = keywords.clone();
        }
        if let Some(required) = self.require_password {
            settings.require_password = required;
        }
        if let Some(delay) = self.autoplay_delay {
            settings.autoplay_delay = delay;
        }
        if let Some(delay) = self.image_extra_delay {
            settings.image_extra_delay = delay;
        }
        if let Some(ref title) = self.wall_title {
            settings.wall_title = title.clone();
        }
        if let Some(ref subtitle) = self.wall_subtitle {
            settings.wall_subtitle = subtitle.clone();
        }
    }
}

/// A guest message board owned by a single user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wall {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    pub is_active: bool,
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub settings: WallSettings,
    /// Derived from the message keys under the wall at read time; any
    /// stored value is overwritten by list handlers.
    #[serde(default)]
    pub message_count: u64,
}

impl Wall {
    pub fn new(user_id: &str, name: &str, description: &str, is_public: bool) -> Self {
        let now = now_millis();
        Self {
            id: generate_wall_id(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            slug: generate_slug(name),
            is_active: true,
            is_public,
            created_at: now,
            updated_at: now,
            settings: WallSettings::default(),
            message_count: 0,
        }
    }

    /// Copy safe to return to clients: the password hash never leaves
    /// the store.
    pub fn sanitized(mut self) -> Self {
        self.settings.password_hash = None;
        self
    }
}

/// A guest submission with optional photo and approval state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Absent for messages on the legacy global wall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_id: Option<String>,
    pub name: String,
    /// Documents written by the original deployment call this field
    /// `message`.
    #[serde(alias = "message")]
    pub text: String,
    #[serde(default, alias = "imagePath", skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(default)]
    pub approved: ApprovalStatus,
    #[serde(alias = "timestamp")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl Message {
    pub fn new(
        wall_id: Option<&str>,
        name: &str,
        text: &str,
        image_key: Option<String>,
        approved: ApprovalStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            wall_id: wall_id.map(str::to_string),
            name: name.to_string(),
            text: text.to_string(),
            image_key,
            approved,
            created_at: now_millis(),
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    /// Public URL guests use to fetch the attached photo, if any.
    /// Uploaded file names may contain spaces or non-ASCII characters,
    /// so the key is percent-encoded into the path segment.
    pub fn photo_url(&self) -> Option<String> {
        self.image_key.as_deref().map(|key| {
            let encoded = utf8_percent_encode(key, IMAGE_NAME_ENCODE_SET);
            format!("/api/image/{encoded}")
        })
    }
}

/// Account document for a wall owner, keyed by the SSO subject id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub provider: String,
    pub created_at: i64,
    pub last_login: i64,
}

/// Global moderation and display knobs for the legacy single-wall mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminSettings {
    pub auto_approve: bool,
    pub show_unmoderated: bool,
    pub auto_approve_keywords: String,
    pub auto_reject_keywords: String,
    pub wall_title: String,
    pub wall_subtitle: String,
    pub title_color: String,
    pub font_family: String,
    pub font_size: u32,
    pub autoplay_delay: u32,
    pub image_delay: u32,
    pub last_updated: String,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            // The global wall pre-dates per-wall settings and keeps the
            // stricter default of manual review.
            auto_approve: false,
            show_unmoderated: false,
            auto_approve_keywords: String::new(),
            auto_reject_keywords: String::new(),
            wall_title: "Wedding Wall".to_string(),
            wall_subtitle: String::new(),
            title_color: "#2c3e50".to_string(),
            font_family: "system-ui, -apple-system, sans-serif".to_string(),
            font_size: 48,
            autoplay_delay: 3,
            image_delay: 1,
            last_updated: String::new(),
        }
    }
}

/// Current time as unix milliseconds, the timestamp unit used across
/// all stored documents.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// URL-friendly identifier derived from a wall name: lowercased, special
/// characters stripped, runs of spaces/underscores/hyphens collapsed to
/// a single hyphen.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_separator = true;
        }
    }

    slug
}

/// Wall ids embed the creation time so keys sort roughly by age.
pub fn generate_wall_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("wall_{}_{}", now_millis(), &suffix[..9])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_special_characters() {
        assert_eq!(generate_slug("Anna & Ben's Wedding!"), "anna-bens-wedding");
    }

    #[test]
    fn slug_collapses_separator_runs() {
        assert_eq!(generate_slug("  big -- day__2024  "), "big-day-2024");
    }

    #[test]
    fn slug_of_only_separators_is_empty() {
        assert_eq!(generate_slug(" -- __ "), "");
    }

    #[test]
    fn wall_id_has_expected_shape() {
        let id = generate_wall_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "wall");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn missing_approval_status_defaults_to_pending() {
        let json = r#"{"id":"m1","name":"guest","text":"hi","createdAt":1}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.approved, ApprovalStatus::Pending);
    }

    #[test]
    fn reads_documents_with_legacy_field_names() {
        let json = r#"{
            "id": "m1",
            "name": "guest",
            "message": "hi",
            "imagePath": "x.png",
            "wallId": "w1",
            "timestamp": 1,
            "approved": "approved"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.text, "hi");
        assert_eq!(message.image_key.as_deref(), Some("x.png"));
        assert_eq!(message.created_at, 1);
        assert_eq!(message.approved, ApprovalStatus::Approved);
    }

    #[test]
    fn password_hash_never_serialized_after_sanitize() {
        let mut wall = Wall::new("user-1", "Test Wall", "", true);
        wall.settings.password_hash = Some("$argon2id$fake".to_string());

        let raw = serde_json::to_string(&wall).unwrap();
        assert!(raw.contains("passwordHash"));

        let clean = serde_json::to_string(&wall.sanitized()).unwrap();
        assert!(!clean.contains("passwordHash"));
    }

    #[test]
    fn settings_patch_merges_over_current() {
        let mut settings = WallSettings::default();
        let patch = WallSettingsPatch {
            display_mode: Some(DisplayMode::Polaroid),
            auto_approve: Some(false),
            auto_reject_keywords: Some("spam".to_string()),
            ..WallSettingsPatch::default()
        };

        patch.apply_to(&mut settings);

        assert_eq!(settings.display_mode, DisplayMode::Polaroid);
        assert!(!settings.auto_approve);
        assert_eq!(settings.auto_reject_keywords, "spam");
        // Untouched fields keep their defaults.
        assert_eq!(settings.font_size, 48);
        assert_eq!(settings.autoplay_delay, 4);
    }

    #[test]
    fn wall_serializes_camel_case() {
        let wall = Wall::new("user-1", "Big Day", "", true);
        let value = serde_json::to_value(&wall).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("isPublic").is_some());
        assert!(value.get("messageCount").is_some());
    }

    #[test]
    fn legacy_message_omits_wall_id() {
        let message = Message::new(None, "guest", "hello", None, ApprovalStatus::Approved);
        let raw = serde_json::to_string(&message).unwrap();
        assert!(!raw.contains("wallId"));
        assert_eq!(message.photo_url(), None);
    }

    #[test]
    fn photo_url_escapes_awkward_file_names() {
        let key = Some("1700000000000-fête photo #1.png".to_string());
        let message = Message {
            image_key: key,
            ..Message::new(Some("w1"), "guest", "hi", None, ApprovalStatus::Approved)
        };
        assert_eq!(
            message.photo_url().as_deref(),
            Some("/api/image/1700000000000-f%C3%AAte%20photo%20%231.png")
        );
    }
}
