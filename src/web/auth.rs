use crate::error::{auth_error, other_error, DashResult, Error};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::AppState;

/// Name of the session cookie
pub const AUTH_COOKIE: &str = "auth_token";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Display name
    pub name: Option<String>,
    pub email: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT secret for signing/verifying tokens
    pub jwt_secret: String,
    /// Token expiration time in minutes
    pub token_expiration_minutes: i64,
}

/// Authenticated caller, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| auth_error("Not authenticated"))
    }
}

/// Pull the session token from the cookie, falling back to a Bearer header
pub fn extract_token(parts: &Parts) -> DashResult<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        return Ok(cookie.value().to_string());
    }

    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| auth_error("Missing token"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| auth_error("Invalid token"))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| auth_error("Invalid token"))
}

/// Hash a password for storage
pub async fn hash_password(password: &str) -> DashResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| other_error(&format!("Password hashing task failed: {}", e)))?
        .map_err(|e| other_error(&format!("Failed to hash password: {}", e)))
}

/// Check a password against its stored hash
pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(result) => result.unwrap_or(false),
        Err(e) => {
            error!("Password check task failed: {}", e);
            false
        }
    }
}

/// Auth service for token operations
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: &str, name: Option<String>, email: &str) -> DashResult<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.config.token_expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            name,
            email: email.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| other_error(&format!("Failed to generate token: {}", e)))
    }

    /// Validate a JWT token
    pub fn validate_token(&self, token: &str) -> DashResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|token_data| token_data.claims)
        .map_err(|e| {
            error!("JWT validation error: {:?}", e);
            auth_error("Invalid or expired session")
        })
    }

    /// Session cookie carrying the token
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::minutes(self.config.token_expiration_minutes))
            .build()
    }

    /// Cookie that clears the session
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, "")).path("/").build()
    }
}

/// Reject requests without a valid session
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Error> {
    let (parts, body) = req.into_parts();

    let token = extract_token(&parts)?;
    let claims = state.auth.validate_token(&token)?;

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(AuthUser { claims });

    Ok(next.run(req).await)
}
