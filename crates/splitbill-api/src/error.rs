use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use splitbill_db::DbError;
use splitbill_types::api::ErrorBody;

/// Every failure a handler can report. The rendered body only ever carries
/// the stable message below; details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Unauthorized".into(),
            Self::Forbidden => "Forbidden".into(),
            Self::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Like `From<DbError>`, but a uniqueness violation reports `msg`.
    pub fn conflict_as(msg: &'static str) -> impl FnOnce(DbError) -> Self {
        move |err| match err {
            DbError::Conflict(detail) => {
                debug!("conflict: {}", detail);
                Self::Conflict(msg)
            }
            other => other.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::NotFound(what),
            DbError::Forbidden(_) => Self::Forbidden,
            DbError::Validation(msg) => Self::Validation(msg),
            DbError::Conflict(detail) => {
                debug!("conflict: {}", detail);
                Self::Conflict("resource already exists")
            }
            DbError::InvalidReference(detail) => {
                debug!("dangling reference: {}", detail);
                Self::NotFound("referenced resource")
            }
            DbError::DeadlineExceeded
            | DbError::Corrupt(_)
            | DbError::Poisoned(_)
            | DbError::Sqlite(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("rejected body: {}", rejection.body_text());
        Self::Validation("malformed or missing fields in body".into())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("rejected query: {}", rejection.body_text());
        Self::Validation("malformed query string".into())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("rejected path: {}", rejection.body_text());
        Self::Validation("malformed path parameter".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!("internal error: {}", detail);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn store_errors_map_to_their_http_kind() {
        let cases = [
            (DbError::NotFound("room"), StatusCode::NOT_FOUND),
            (DbError::Forbidden("room"), StatusCode::FORBIDDEN),
            (DbError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DbError::Conflict("x".into()), StatusCode::CONFLICT),
            (DbError::InvalidReference("x".into()), StatusCode::NOT_FOUND),
            (DbError::DeadlineExceeded, StatusCode::INTERNAL_SERVER_ERROR),
            (DbError::Poisoned("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (db_err, status) in cases {
            assert_eq!(ApiError::from(db_err).status(), status);
        }
    }

    #[tokio::test]
    async fn internal_details_are_not_echoed() {
        let (status, body) =
            body_of(ApiError::Internal("disk I/O error at /var/lib/x".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Internal server error"}"#);
    }

    #[tokio::test]
    async fn conflicts_hide_the_constraint_text() {
        let err = ApiError::from(DbError::Conflict(
            "UNIQUE constraint failed: products.name, products.room_id".into(),
        ));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!body.contains("UNIQUE"), "{body}");
    }

    #[test]
    fn conflict_as_only_rewrites_conflicts() {
        let err = ApiError::conflict_as("Username already exists")(DbError::Conflict("x".into()));
        assert!(matches!(err, ApiError::Conflict("Username already exists")));

        let err = ApiError::conflict_as("Username already exists")(DbError::NotFound("user"));
        assert!(matches!(err, ApiError::NotFound("user")));
    }
}
