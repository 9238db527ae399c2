use axum::extract::Multipart;
use bytes::Bytes;

use crate::models::now_millis;

/// Result type used by the guest upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or reading an uploaded form.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

const ALLOWED_PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// A photo read from the form, held in memory until it is written to
/// the object store.
#[derive(Clone, Debug)]
pub struct UploadedPhoto {
    pub stored_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// Parsed guest submission: author name, message text, optional photo.
#[derive(Debug, Default)]
pub struct GuestSubmission {
    pub name: String,
    pub text: String,
    pub photo: Option<UploadedPhoto>,
}

/// Reads the multipart guest form. Text fields `name` and `text` are
/// optional (anonymous, empty); at most one `photo` file is accepted.
pub async fn read_guest_form(mut multipart: Multipart) -> UploadResult<GuestSubmission> {
    let mut submission = GuestSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(|err| {
                UploadError::new(format!("failed to read field `{field_name}`: {err}"))
            })?;
            match field_name.as_str() {
                "name" => submission.name = value.trim().to_string(),
                "text" | "message" => submission.text = value.trim().to_string(),
                // Unknown text fields are ignored, matching
                // forgiving form handling elsewhere.
                _ => {}
            }
            continue;
        }

        if field_name != "photo" && field_name != "file" {
            return Err(UploadError::new(format!(
                "unsupported file field: `{field_name}`"
            )));
        }
        if submission.photo.is_some() {
            return Err(UploadError::new("only one photo per submission"));
        }

        let original_name = field.file_name().unwrap_or("upload.bin").to_string();
        let extension = extension_of(&original_name);

        let Some(content_type) = photo_content_type(&extension) else {
            return Err(UploadError::new(format!(
                "unsupported photo type `{extension}`"
            )));
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|err| UploadError::new(format!("failed to read photo data: {err}")))?;
        if bytes.is_empty() {
            return Err(UploadError::new("uploaded photo is empty"));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(UploadError::new("uploaded photo exceeds the 10 MB limit"));
        }

        submission.photo = Some(UploadedPhoto {
            stored_name: stored_photo_name(&original_name),
            content_type,
            bytes,
        });
    }

    if submission.name.is_empty() {
        submission.name = "Anonymous".to_string();
    }

    Ok(submission)
}

/// Stored names are prefixed with the upload time so blobs sort by age
/// and collisions across guests are practically impossible.
fn stored_photo_name(original: &str) -> String {
    let sanitized = sanitize_filename::sanitize(original);
    // Sanitizing strips path separators but can leave runs of dots
    // behind, and the image route refuses names containing `..`.
    let mut collapsed = String::with_capacity(sanitized.len());
    for ch in sanitized.chars() {
        if ch == '.' && collapsed.ends_with('.') {
            continue;
        }
        collapsed.push(ch);
    }
    if collapsed.is_empty() {
        collapsed = "photo".to_string();
    }
    format!("{}-{}", now_millis(), collapsed)
}

fn extension_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn photo_content_type(extension: &str) -> Option<&'static str> {
    if !ALLOWED_PHOTO_EXTENSIONS.contains(&extension) {
        return None;
    }
    Some(match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/webp",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_extensions_map_to_content_types() {
        assert_eq!(photo_content_type("jpg"), Some("image/jpeg"));
        assert_eq!(photo_content_type("jpeg"), Some("image/jpeg"));
        assert_eq!(photo_content_type("png"), Some("image/png"));
        assert_eq!(photo_content_type("gif"), Some("image/gif"));
        assert_eq!(photo_content_type("webp"), Some("image/webp"));
    }

    #[test]
    fn disallowed_extensions_are_rejected() {
        assert_eq!(photo_content_type("pdf"), None);
        assert_eq!(photo_content_type("exe"), None);
        assert_eq!(photo_content_type(""), None);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("IMG_0001.JPG"), "jpg");
        assert_eq!(extension_of("no-extension"), "");
    }

    #[test]
    fn stored_name_keeps_sanitized_original() {
        let name = stored_photo_name("../../etc/passwd.png");
        assert!(!name.contains(".."));
        assert!(!name.contains('/'));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn stored_name_falls_back_for_empty_sanitization() {
        let name = stored_photo_name("...");
        assert!(name.ends_with("-photo"));
    }
}
