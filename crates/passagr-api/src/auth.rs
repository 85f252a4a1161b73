//! Request guards: HTTP Basic for editors, a shared secret for cron jobs.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

/// Header carrying the cron secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Credentials accepted by this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// Job endpoints reject every request when unset.
  #[serde(default)]
  pub cron_secret:   Option<String>,
}

/// An authenticated editor.
#[derive(Debug, Clone)]
pub struct Admin {
  pub username: String,
}

/// Zero-size marker: the request carried the cron secret.
pub struct Cron;

/// Verify Basic credentials against `config`, returning the username.
pub fn verify_basic(headers: &HeaderMap, config: &AuthConfig) -> Result<String, ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  if username != config.username {
    return Err(ApiError::Unauthorized);
  }

  let parsed_hash =
    PasswordHash::new(&config.password_hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(username.to_owned())
}

fn verify_cron(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let expected = config.cron_secret.as_deref().ok_or(ApiError::Unauthorized)?;
  let given = headers
    .get(CRON_SECRET_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  // compare every byte regardless of where the first mismatch is
  let same = given.len() == expected.len()
    && given.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0;
  if same { Ok(()) } else { Err(ApiError::Unauthorized) }
}

impl<S, M, P> FromRequestParts<AppState<S, M, P>> for Admin
where
  S: Send + Sync,
  M: Send + Sync,
  P: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, M, P>,
  ) -> Result<Self, Self::Rejection> {
    let username = verify_basic(&parts.headers, &state.auth)?;
    Ok(Admin { username })
  }
}

impl<S, M, P> FromRequestParts<AppState<S, M, P>> for Cron
where
  S: Send + Sync,
  M: Send + Sync,
  P: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, M, P>,
  ) -> Result<Self, Self::Rejection> {
    verify_cron(&parts.headers, &state.auth)?;
    Ok(Cron)
  }
}
