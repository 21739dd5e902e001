use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::admin::session::Session;
use crate::error::AppError;
use crate::state::AppState;

pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized("Missing Authorization header"))?;

        let value = header_value
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header value"))?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Expected Bearer token"))?;

        Ok(BearerToken(token.to_string()))
    }
}

/// Any live session, taken from the bearer token.
pub struct UserSession(pub Session);

impl FromRequestParts<Arc<AppState>> for UserSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let session = state
            .sessions
            .lock()
            .await
            .get(&token)
            .ok_or(AppError::Unauthorized("Invalid or expired session"))?;
        Ok(UserSession(session))
    }
}

/// A live session belonging to an admin.
pub struct AdminSession(pub Session);

impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let UserSession(session) = UserSession::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminSession(session))
    }
}
