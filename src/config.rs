use std::env;

use anyhow::{Context, Result};

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub port: u16,
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

/// JWT signing and Google OAuth settings.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    /// Base URL of the deployed app; the OAuth redirect URI is derived
    /// from it.
    pub app_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let store = StoreConfig::from_env()?;
        let auth = AuthConfig::from_env()?;

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Ok(Self { store, auth, port })
    }
}

impl StoreConfig {
    fn from_env() -> Result<Self> {
        let endpoint = match env::var("MINIO_ENDPOINT_URL") {
            Ok(url) => url,
            // Assemble the URL from the individual MinIO variables the
            // deployment compose files export.
            Err(_) => {
                let host = env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "localhost".to_string());
                let port = env::var("MINIO_PORT").unwrap_or_else(|_| "9000".to_string());
                let scheme = if env::var("MINIO_USE_SSL").as_deref() == Ok("true") {
                    "https"
                } else {
                    "http"
                };
                format!("{scheme}://{host}:{port}")
            }
        };

        Ok(Self {
            endpoint,
            access_key: env::var("MINIO_ACCESS_KEY")
                .context("MINIO_ACCESS_KEY env var is missing")?,
            secret_key: env::var("MINIO_SECRET_KEY")
                .context("MINIO_SECRET_KEY env var is missing")?,
            bucket: env::var("MINIO_BUCKET_NAME").unwrap_or_else(|_| "wedding-wall".to_string()),
        })
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET env var is missing")?,
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.app_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_handles_trailing_slash() {
        let auth = AuthConfig {
            jwt_secret: "secret".to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            app_url: "https://wall.example.com/".to_string(),
        };
        assert_eq!(
            auth.oauth_redirect_uri(),
            "https://wall.example.com/auth/callback"
        );
    }
}
