//! Object key layout for the wedding-wall bucket.
//!
//! Everything lives in one bucket as JSON documents and photo blobs:
//!
//! ```text
//! users/{user_id}/profile.json
//! users/{user_id}/walls/{wall_id}/metadata.json
//! users/{user_id}/walls/{wall_id}/messages/{message_id}.json
//! images/{stored name}
//! metadata/{created_at}-{uuid}.json      (legacy global wall)
//! admin-settings.json
//! ```

pub const ADMIN_SETTINGS: &str = "admin-settings.json";
pub const LEGACY_MESSAGE_PREFIX: &str = "metadata/";
pub const IMAGE_PREFIX: &str = "images/";
pub const USERS_PREFIX: &str = "users/";

pub fn user_profile(user_id: &str) -> String {
    format!("users/{user_id}/profile.json")
}

pub fn user_walls_prefix(user_id: &str) -> String {
    format!("users/{user_id}/walls/")
}

pub fn wall_metadata(user_id: &str, wall_id: &str) -> String {
    format!("users/{user_id}/walls/{wall_id}/metadata.json")
}

pub fn wall_messages_prefix(user_id: &str, wall_id: &str) -> String {
    format!("users/{user_id}/walls/{wall_id}/messages/")
}

pub fn wall_message(user_id: &str, wall_id: &str, message_id: &str) -> String {
    format!("users/{user_id}/walls/{wall_id}/messages/{message_id}.json")
}

pub fn image(stored_name: &str) -> String {
    format!("{IMAGE_PREFIX}{stored_name}")
}

pub fn legacy_message(created_at: i64, id: &str) -> String {
    format!("{LEGACY_MESSAGE_PREFIX}{created_at}-{id}.json")
}

/// True for keys that hold a message document (as opposed to the
/// `.keep` placeholder some older walls carry).
pub fn is_message_document(key: &str) -> bool {
    key.ends_with(".json") && !key.ends_with("/.keep")
}

pub fn is_wall_metadata(key: &str) -> bool {
    key.ends_with("/metadata.json")
}

/// Extracts the owner id from a wall metadata key matching
/// `users/{user_id}/walls/{wall_id}/metadata.json`, verifying the wall
/// id segment.
pub fn owner_of_wall_metadata<'a>(key: &'a str, wall_id: &str) -> Option<&'a str> {
    let rest = key.strip_prefix(USERS_PREFIX)?;
    let (user_id, rest) = rest.split_once('/')?;
    let rest = rest.strip_prefix("walls/")?;
    let (found_wall, rest) = rest.split_once('/')?;
    if found_wall == wall_id && rest == "metadata.json" {
        Some(user_id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_keys_round_trip() {
        let key = wall_metadata("u1", "wall_1_abc");
        assert_eq!(key, "users/u1/walls/wall_1_abc/metadata.json");
        assert!(is_wall_metadata(&key));
        assert_eq!(owner_of_wall_metadata(&key, "wall_1_abc"), Some("u1"));
        assert_eq!(owner_of_wall_metadata(&key, "wall_2_xyz"), None);
    }

    #[test]
    fn message_document_filter_skips_keep_files() {
        assert!(is_message_document("users/u1/walls/w1/messages/m1.json"));
        assert!(!is_message_document("users/u1/walls/w1/messages/.keep"));
        assert!(!is_message_document("users/u1/walls/w1/messages/photo.png"));
    }

    #[test]
    fn owner_borrow_is_tied_to_the_key() {
        let key = wall_metadata("u9", "wall_7_zzz");
        let owner = {
            // The owner id must stay valid after the lookup id is gone.
            let lookup_id = String::from("wall_7_zzz");
            owner_of_wall_metadata(&key, &lookup_id)
        };
        assert_eq!(owner, Some("u9"));
    }

    #[test]
    fn owner_extraction_rejects_foreign_keys() {
        assert_eq!(owner_of_wall_metadata("images/a.png", "w1"), None);
        assert_eq!(
            owner_of_wall_metadata("users/u1/profile.json", "w1"),
            None
        );
        assert_eq!(
            owner_of_wall_metadata("users/u1/walls/w1/messages/m.json", "w1"),
            None
        );
    }
}
