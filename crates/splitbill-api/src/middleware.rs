use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;

/// Resolve the `Authorization` header into a `Principal` extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let sessions = state.sessions.clone();
    let principal = run_blocking(move || sessions.resolve(credential.as_deref())).await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
