//! Background pruning task.
//!
//! Periodically sweeps expired token records and dangling ticket entries out
//! of the store. A failed sweep is logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::store::SessionStore;

/// Default pruning interval in seconds.
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 300; // 5 minutes

/// Spawn a background task that periodically prunes expired entries.
///
/// Returns a `JoinHandle` that can be used to abort the task.
pub fn spawn_prune_task(
    store: Arc<SessionStore>,
    prune_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(prune_interval_secs));

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match store.prune_expired_entries() {
                Ok(stats) => {
                    if stats.total() > 0 {
                        info!(
                            expired_tokens = stats.expired_tokens,
                            dangling_tickets = stats.dangling_tickets,
                            "session pruning completed"
                        );
                    } else {
                        debug!("session pruning: nothing expired");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "session pruning failed");
                }
            }

            match store.token_count() {
                Ok(count) => {
                    debug!(active_tokens = count, "session store status");
                }
                Err(e) => {
                    debug!(error = %e, "failed to count stored tokens");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::SessionToken;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prune_task_removes_expired_entries() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path().join("sessions")));
        store.prepare_for_work().unwrap();

        let live = SessionToken::new("J-live", Utc::now() + chrono::Duration::hours(1));
        let expired = SessionToken::new("J-old", Utc::now() - chrono::Duration::minutes(1));
        store.store("ST-live", &live).unwrap();
        store.store("ST-old", &expired).unwrap();
        assert_eq!(store.token_count().unwrap(), 2);

        // short interval so at least one sweep runs
        let handle = spawn_prune_task(Arc::clone(&store), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.abort();

        assert_eq!(store.token_count().unwrap(), 1);
        assert!(store.get_token_by_id(&expired).unwrap().is_null());
        assert_eq!(store.get_token_by_id(&live).unwrap(), live);
    }
}
