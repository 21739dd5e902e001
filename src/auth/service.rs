use std::sync::LazyLock;

use chrono::Utc;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::state::AppState;
use crate::users::store::{Role, User};

/// Same message for a blocked IP and bad credentials, so a client cannot
/// tell the two apart.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Checked against when the email is unknown, so that path costs as much
/// as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("netpub-unknown-user").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginScope {
    AnyUser,
    AdminOnly,
}

async fn password_matches(password: &str, hash: String) -> Result<bool, AppError> {
    let password = password.to_string();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))??;
    Ok(ok)
}

/// Runs one login attempt from `ip` through the throttle.
///
/// The IP's gate is held from the block check until the outcome is
/// recorded, so parallel attempts from one address cannot slip past the
/// threshold. A blocked IP is turned away before any credential lookup
/// and its record is left alone.
pub async fn authenticate(
    state: &AppState,
    ip: &str,
    email: &str,
    password: &str,
    scope: LoginScope,
) -> Result<User, AppError> {
    let _gate = state.login_gates.acquire(ip).await;

    if state.login_throttle.lock().await.is_blocked(ip, Utc::now()) {
        tracing::warn!(target: "security", ip, email, "Login attempt from blocked IP");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    let candidate = state.users.read().await.find_by_email(email).cloned();
    let hash = match &candidate {
        Some(user) => Some(user.password_hash.clone()),
        None => {
            tracing::debug!(email, "Unknown user");
            DUMMY_HASH.clone()
        }
    };
    let matched = match hash {
        Some(hash) => password_matches(password, hash).await?,
        None => false,
    };

    let allowed = candidate
        .filter(|_| matched)
        .filter(|user| scope == LoginScope::AnyUser || user.is_admin());
    let mut throttle = state.login_throttle.lock().await;
    match allowed {
        Some(user) => {
            throttle.record_success(ip);
            tracing::info!(target: "security", ip, email, role = ?user.role, "Login succeeded");
            Ok(user)
        }
        None => {
            let now = Utc::now();
            let blocked_until = throttle.record_failure(ip, now);
            let failures = throttle.record(ip).map_or(0, |r| r.failure_count);
            tracing::info!(target: "security", ip, email, failures, "failed_login_attempt");
            if let Some(until) = blocked_until {
                tracing::warn!(
                    target: "security",
                    ip,
                    %until,
                    "IP blocked for {} hours after repeated failures",
                    throttle.policy().block_duration.num_hours()
                );
            }
            Err(AppError::Unauthorized(INVALID_CREDENTIALS))
        }
    }
}

/// Validates and stores a new regular user. Hashing runs on the blocking
/// pool with no store lock held.
pub async fn register(
    state: &AppState,
    email: &str,
    password: &str,
    name: Option<String>,
) -> Result<User, AppError> {
    state.users.read().await.validate_registration(email, password)?;

    let plain = password.to_string();
    let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))??;

    let user = state
        .users
        .write()
        .await
        .insert(email, hash, name, Role::User)?;
    tracing::info!(email = %user.email, "User registered");
    Ok(user)
}
