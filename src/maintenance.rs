use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Drops expired sessions and, when a retention period is configured,
/// attempt records that have gone idle.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> (usize, usize) {
    let sessions = state.sessions.lock().await.cleanup_expired(now);
    let attempts = match state.auth.attempt_retention {
        Some(retention) => state.login_throttle.lock().await.purge_stale(now, retention),
        None => 0,
    };
    (sessions, attempts)
}

pub fn spawn_sweeper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let (sessions, attempts) = sweep(&state, Utc::now()).await;
            let tracked = state.login_throttle.lock().await.len();
            let gates = state.login_gates.len();
            tracing::debug!(
                sessions,
                attempts,
                tracked,
                gates,
                "Swept expired sessions and stale login attempts"
            );
        }
    })
}
