// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (numeric athlete ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub athlete_id: u64,
}

/// Session cookie carrying the JWT.
pub const TOKEN_COOKIE: &str = "workout_token";

/// Middleware that requires valid JWT authentication.
///
/// The token is read from the session cookie, falling back to an
/// `Authorization: Bearer` header.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match jar.get(TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
            .ok_or(AppError::Unauthorized)?,
    };

    let athlete_id = verify_jwt(&token, &state.config.jwt_signing_key)?;
    request.extensions_mut().insert(AuthUser { athlete_id });

    Ok(next.run(request).await)
}

/// Validate a token and return the athlete it names.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<u64, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected JWT");
        AppError::Unauthorized
    })?;

    token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized)
}

/// Create a JWT for a user session.
pub fn create_jwt(athlete_id: u64, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: athlete_id.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
