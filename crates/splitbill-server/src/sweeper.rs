use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use splitbill_db::Database;

/// Background task that deletes expired session rows.
///
/// Resolution already refuses expired sessions; this only keeps the table
/// from growing without bound.
pub async fn run_session_sweeper(db: Arc<Database>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let db = db.clone();
        let now = chrono::Utc::now().timestamp();
        match tokio::task::spawn_blocking(move || db.delete_expired_sessions(now)).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweeper: removed {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Sweeper error: {}", e),
            Err(e) => warn!("Sweeper task failed: {}", e),
        }
    }
}
