use std::sync::Arc;
use std::time::Duration;

use seshat_db::RecordStore;
use seshat_util_error::{FmtCompact as _, FmtCompactResultExt as _};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::manager::SessionManager;

const LOG_TARGET: &str = "seshat::sweeper";

/// Spawn a task calling [`SessionManager::sweep`] every `every`
///
/// The task runs until aborted through the returned handle. A failed sweep
/// is logged and retried on the next tick.
pub fn spawn_sweep_task<S>(manager: Arc<SessionManager<S>>, every: Duration) -> JoinHandle<()>
where
    S: RecordStore + 'static,
{
    // `interval` rejects a zero period
    let every = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = interval(every);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match manager.sweep().await {
                Ok(outcome) if 0 < outcome.removed => {
                    info!(
                        target: LOG_TARGET,
                        scanned = outcome.scanned,
                        removed = outcome.removed,
                        "Expired sessions swept"
                    );
                }
                Ok(_) => {
                    debug!(target: LOG_TARGET, "No expired sessions");
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Session sweep failed");
                }
            }

            let count = manager.count_sessions().await;
            debug!(
                target: LOG_TARGET,
                stored_sessions = %count.fmt_compact_result(),
                "Session store status"
            );
        }
    })
}
