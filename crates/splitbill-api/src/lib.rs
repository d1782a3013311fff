pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod password;
pub mod products;
pub mod rooms;
pub mod routes;
pub mod session;
pub mod user_products;

pub use error::ApiError;
pub use routes::router;

/// Runs store work on the blocking pool. The store holds a synchronous
/// connection, so handlers never touch it on a runtime thread.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
