//! Background jobs. Call `spawn_all` once during startup.

use crate::services::VisitorSessions;
use std::sync::Arc;
use std::time::Duration;

/// Spawn all background tasks. Detached via `tokio::spawn`; does not block.
pub fn spawn_all(sessions: Arc<VisitorSessions>, sweep_every: Duration, idle_ttl: Duration) {
    // drop abandoned visitor sessions
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let removed = sessions.sweep_idle(idle_ttl).await;
            if removed > 0 {
                log::info!(
                    "Dropped {removed} idle draw sessions, {} remain",
                    sessions.len().await
                );
            }
        }
    });
}
