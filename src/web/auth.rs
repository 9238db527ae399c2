use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    models::{User, now_millis},
    store::keys,
    web::{ApiError, ApiResult, AppState, json_error},
};

pub const TOKEN_COOKIE: &str = "auth-token";
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Claims carried by access tokens. Refresh tokens carry only `sub`,
/// `iat`, and `exp`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller extracted from the request token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

pub fn issue_access_token(
    user: &User,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_millis() / 1000;
    let claims = Claims {
        sub: user.id.clone(),
        email: Some(user.email.clone()),
        name: Some(user.name.clone()),
        picture: user.picture.clone(),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn issue_refresh_token(
    user: &User,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_millis() / 1000;
    let claims = Claims {
        sub: user.id.clone(),
        email: None,
        name: None,
        picture: None,
        iat: now,
        exp: now + REFRESH_TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Pulls the token from `Authorization: Bearer` or the `auth-token`
/// cookie. The header wins when both are present because it is never
/// URL-encoded by proxies.
pub fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    header_token.or_else(|| jar.get(TOKEN_COOKIE).map(|cookie| cookie.value().to_string()))
}

/// Resolves the caller or fails with 401. Used at the top of every
/// owner-facing handler.
pub fn require_user(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<AuthUser, ApiError> {
    let token = extract_token(headers, jar)
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "Authentication required"))?;

    let claims = verify_token(&token, &state.config().auth.jwt_secret)
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

    Ok(AuthUser {
        id: claims.sub,
        email: claims.email,
    })
}

#[derive(Deserialize)]
pub struct SsoCallbackRequest {
    pub code: String,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "google".to_string()
}

#[derive(Serialize)]
pub struct SsoCallbackResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: Option<String>,
}

/// Exchanges an OAuth authorization code for tokens, upserts the user
/// profile document, and returns freshly signed JWTs.
pub async fn sso_callback(
    State(state): State<AppState>,
    Json(request): Json<SsoCallbackRequest>,
) -> ApiResult<SsoCallbackResponse> {
    if request.provider != "google" {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown SSO provider: {}", request.provider),
        ));
    }

    let profile = exchange_google_code(&state, &request.code)
        .await
        .map_err(|err| {
            warn!(%err, "OAuth code exchange failed");
            json_error(StatusCode::UNAUTHORIZED, "Authentication failed")
        })?;

    let user = upsert_user(&state, profile, &request.provider)
        .await
        .map_err(|err| {
            error!(%err, "failed to persist user profile");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
        })?;

    let secret = &state.config().auth.jwt_secret;
    let access_token = issue_access_token(&user, secret).map_err(|err| {
        error!(%err, "failed to sign access token");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
    })?;
    let refresh_token = issue_refresh_token(&user, secret).map_err(|err| {
        error!(%err, "failed to sign refresh token");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
    })?;

    info!(user_id = %user.id, "SSO login");

    Ok(Json(SsoCallbackResponse {
        user,
        access_token,
        refresh_token,
        expires_in: ACCESS_TOKEN_TTL_SECS,
    }))
}

async fn exchange_google_code(state: &AppState, code: &str) -> anyhow::Result<GoogleUserInfo> {
    let auth = &state.config().auth;

    let token: GoogleTokenResponse = state
        .http()
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", code),
            ("client_id", auth.google_client_id.as_str()),
            ("client_secret", auth.google_client_secret.as_str()),
            ("redirect_uri", &auth.oauth_redirect_uri()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let profile: GoogleUserInfo = state
        .http()
        .get("https://www.googleapis.com/oauth2/v3/userinfo")
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(profile)
}

/// Creates the profile document on first login, otherwise bumps
/// `last_login` on the stored record.
async fn upsert_user(
    state: &AppState,
    profile: GoogleUserInfo,
    provider: &str,
) -> anyhow::Result<User> {
    let key = keys::user_profile(&profile.sub);
    let now = now_millis();

    let mut user = match state.store().get_json::<User>(&key).await {
        Ok(existing) => existing,
        Err(err) if err.is_not_found() => User {
            id: profile.sub.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            picture: profile.picture.clone(),
            provider: provider.to_string(),
            created_at: now,
            last_login: now,
        },
        Err(err) => return Err(err.into()),
    };

    user.last_login = now;
    state.store().put_json(&key, &user).await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: "google-123".to_string(),
            email: "couple@example.com".to_string(),
            name: "Anna".to_string(),
            picture: None,
            provider: "google".to_string(),
            created_at: 0,
            last_login: 0,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let token = issue_access_token(&test_user(), "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "google-123");
        assert_eq!(claims.email.as_deref(), Some("couple@example.com"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access_token(&test_user(), "test-secret").unwrap();
        assert!(verify_token(&token, "other-secret").is_none());
    }

    #[test]
    fn refresh_token_carries_only_subject() {
        let token = issue_refresh_token(&test_user(), "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "google-123");
        assert!(claims.email.is_none());
        assert!(claims.name.is_none());
        assert_eq!(claims.exp - claims.iat, REFRESH_TOKEN_TTL_SECS);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("not-a-jwt", "test-secret").is_none());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        let jar = CookieJar::new().add(axum_extra::extract::cookie::Cookie::new(
            TOKEN_COOKIE,
            "from-cookie",
        ));

        assert_eq!(
            extract_token(&headers, &jar).as_deref(),
            Some("from-header")
        );

        let empty_headers = HeaderMap::new();
        assert_eq!(
            extract_token(&empty_headers, &jar).as_deref(),
            Some("from-cookie")
        );
    }
}
