// Periodic expiry sweep for idle sessions

use super::manager::SessionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// Background task that expires idle sessions on a fixed interval.
///
/// The sweep is the only mechanism that removes sessions that are never
/// validated again (an abandoned browser tab); the manager's lazy check
/// inside `validate_session` only fires on next use.
pub struct ExpirySweeper {
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Spawn the sweep loop on the current tokio runtime
    pub fn start(manager: Arc<SessionManager>, every: Duration) -> Self {
        info!("Starting session expiry sweeper (interval: {:?})", every);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            // the first tick completes immediately; consume it so runs are
            // one full interval apart
            ticker.tick().await;

            loop {
                ticker.tick().await;

                debug!("Running session expiry sweep");
                let expired = manager.cleanup_expired_sessions().await;

                if expired > 0 {
                    info!("Expiry sweep removed {} idle sessions", expired);
                }
            }
        });

        Self { handle }
    }

    /// Stop the sweep loop. This is the explicit lifecycle operation for
    /// service shutdown and test teardown.
    pub fn shutdown(self) {
        info!("Stopping session expiry sweeper");
        self.handle.abort();
    }
}

impl Drop for ExpirySweeper {
    // a dropped sweeper must not leak its timer task
    fn drop(&mut self) {
        self.handle.abort();
    }
}
