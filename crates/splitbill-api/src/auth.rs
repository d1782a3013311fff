use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;

use splitbill_db::Database;
use splitbill_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::password::{hash_password, verify_password};
use crate::run_blocking;
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: Arc<dyn SessionManager>,
    /// Deadline budget handed to the batch engine.
    pub request_timeout: Duration,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    if !(3..=32).contains(&username.chars().count()) {
        return Err(ApiError::validation("username must be 3 to 32 characters"));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }

    let id = run_blocking(move || {
        // Hash with Argon2id
        let password_hash = hash_password(&req.password)?;
        state
            .db
            .create_user(
                &username,
                &password_hash,
                req.full_name.as_deref().unwrap_or_default(),
                req.photo_url.as_deref().unwrap_or_default(),
            )
            .map_err(ApiError::conflict_as("Username already exists"))
    })
    .await?;

    info!("registered user {}", id);
    Ok((StatusCode::CREATED, Json(RegisterResponse { id })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = run_blocking(move || {
        // Unknown user and wrong password answer identically.
        let user = state
            .db
            .get_user_by_username(req.username.trim())?
            .ok_or(ApiError::NotFound("user"))?;
        if !verify_password(&req.password, &user.password)? {
            return Err(ApiError::NotFound("user"));
        }
        state.sessions.create_session(user.id)
    })
    .await?;

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
    }))
}
