use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile};
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies the HS256 access tokens handed out at login.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.leeway = 0;

        TokenIssuer {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::hours(config.ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// The caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        const REJECTED: ApiError = ApiError::Unauthorized("Invalid or missing token");

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(REJECTED)?;

        let claims = state.tokens.verify(token.trim()).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            REJECTED
        })?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| REJECTED)?;

        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }
}

/// Create an account and log it in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = req.email.trim().to_string();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters",
        ));
    }

    if state.users.email_exists(&email).await? {
        return Err(ApiError::Conflict("Email already registered"));
    }

    let cost = state.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))??;

    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash,
        created_at: Utc::now(),
    };

    match state.users.create_user(&user).await {
        Ok(()) => {}
        // Lost a race with a concurrent registration of the same address.
        Err(e) if crate::db::is_constraint_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, "User registered");

    let token = state.tokens.issue(&user)?;
    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            token,
            email: user.email,
        }),
    ))
}

/// Exchange credentials for an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    const INVALID: ApiError = ApiError::Unauthorized("Invalid credentials");

    let Some(user) = state.users.get_user_by_email(req.email.trim()).await? else {
        return Err(INVALID);
    };

    let hash = user.password_hash.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))??;

    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(INVALID);
    }

    let token = state.tokens.issue(&user)?;
    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            token,
            email: user.email,
        }),
    ))
}

/// Profile of the logged-in user.
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let user = state
        .users
        .get_user_by_id(user.id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok((
        StatusCode::OK,
        Json(UserProfile {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }),
    ))
}
