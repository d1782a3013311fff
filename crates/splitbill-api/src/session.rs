//! Session issuing and resolution.
//!
//! A session is a row in `auth_sessions` plus an HS256 token naming it. The
//! row is authoritative: a correctly signed token whose row is gone or past
//! its expiry does not authenticate.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use splitbill_db::Database;

use crate::config::SessionConfig;
use crate::error::ApiError;

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub session_id: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Both calls touch the store and block; run them off the async runtime.
pub trait SessionManager: Send + Sync {
    fn create_session(&self, user_id: i64) -> Result<IssuedSession, ApiError>;

    /// `credential` is the raw `Authorization` header value, if any.
    fn resolve(&self, credential: Option<&str>) -> Result<Principal, ApiError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    sid: i64,
    jti: String,
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct DbSessionManager {
    db: Arc<Database>,
    config: SessionConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl DbSessionManager {
    pub fn new(db: Arc<Database>, config: SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is decided against the stored row, not with slack.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            db,
            config,
            validation,
        }
    }

    fn mint(
        &self,
        session_id: i64,
        user_id: i64,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id,
            jti: Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    fn resolve_at(&self, credential: Option<&str>, now: i64) -> Result<Principal, ApiError> {
        let token = credential
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| reject("missing or malformed authorization header"))?;

        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!("token rejected: {}", e);
                ApiError::Unauthenticated
            })?
            .claims;

        let row = self
            .db
            .find_session_by_token(token)?
            .ok_or_else(|| reject("no session for token"))?;

        if row.id != claims.sid || row.user_id.to_string() != claims.sub {
            return Err(reject("token claims do not match session"));
        }
        if row.is_expired_at(now) {
            return Err(reject("session expired"));
        }

        Ok(Principal {
            user_id: row.user_id,
            session_id: row.id,
        })
    }
}

impl SessionManager for DbSessionManager {
    fn create_session(&self, user_id: i64) -> Result<IssuedSession, ApiError> {
        let created_at = Utc::now();
        let ttl = TimeDelta::from_std(self.config.ttl)
            .map_err(|e| ApiError::Internal(format!("session ttl out of range: {e}")))?;
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| ApiError::Internal("session expiry out of range".into()))?;

        let row = self.db.insert_session(
            user_id,
            created_at.timestamp(),
            expires_at.timestamp(),
            |session_id| self.mint(session_id, user_id, created_at, expires_at),
        )?;
        let token = row
            .token
            .ok_or_else(|| ApiError::Internal("session stored without a token".into()))?;

        debug!("session {} issued for user {}", row.id, user_id);
        Ok(IssuedSession {
            session_id: row.id,
            user_id,
            token,
            created_at,
            expires_at,
        })
    }

    fn resolve(&self, credential: Option<&str>) -> Result<Principal, ApiError> {
        self.resolve_at(credential, Utc::now().timestamp())
    }
}

fn reject(reason: &'static str) -> ApiError {
    debug!("authentication rejected: {}", reason);
    ApiError::Unauthenticated
}
