use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::{AdminSession, UserSession};
use crate::auth::client_ip::client_ip;
use crate::auth::service::{self, LoginScope, authenticate};
use crate::auth::throttle::BlockedIp;
use crate::error::AppError;
use crate::state::AppState;
use crate::users::store::UserProfile;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthPayload>, AppError> {
    let ip = client_ip(&headers, addr, state.auth.trust_proxy);
    let user = authenticate(&state, &ip, &req.email, &req.password, LoginScope::AnyUser).await?;
    let session = state.sessions.lock().await.create(&user);
    Ok(Json(AuthPayload {
        token: session.token,
        user: user.profile(),
    }))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthPayload>, AppError> {
    let user = service::register(&state, &req.email, &req.password, req.name).await?;
    let session = state.sessions.lock().await.create(&user);
    Ok(Json(AuthPayload {
        token: session.token,
        user: user.profile(),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    UserSession(session): UserSession,
) -> Result<Json<UserProfile>, AppError> {
    let users = state.users.read().await;
    let user = users
        .find_by_email(&session.email)
        .filter(|u| u.id == session.user_id)
        .ok_or(AppError::Unauthorized("Invalid or expired session"))?;
    Ok(Json(user.profile()))
}

pub async fn blocked_ips(
    State(state): State<Arc<AppState>>,
    AdminSession(session): AdminSession,
) -> Json<Vec<BlockedIp>> {
    tracing::debug!(admin = %session.email, admin_id = %session.user_id, "Listing blocked IPs");
    Json(state.login_throttle.lock().await.list_blocked(Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::users::store::{Role, UserStore};
    use axum::body::{Body, to_bytes};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use std::path::PathBuf;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    fn temp_path() -> PathBuf {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        path
    }

    fn test_app(path: &PathBuf, peer: &str) -> (axum::Router, Arc<AppState>) {
        let mut users = UserStore::load_or_create(path).unwrap();
        users.ensure_admin("admin@netpub.agency", "admin-pass").unwrap();
        let state = Arc::new(AppState::new(users, AuthConfig::default()));
        let addr: SocketAddr = peer.parse().unwrap();
        let app = crate::build_router(state.clone()).layer(MockConnectInfo(addr));
        (app, state)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_login_returns_token_and_profile() {
        let path = temp_path();
        let (app, _) = test_app(&path, "192.0.2.1:4000");

        let resp = app
            .oneshot(json_post(
                "/api/login",
                serde_json::json!({"email": "admin@netpub.agency", "password": "admin-pass"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let payload: AuthPayload = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(payload.user.role, Role::Admin);
        assert_eq!(payload.token.len(), 64);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_blocked_ip_gets_same_error_as_bad_password() {
        let path = temp_path();
        let (app, state) = test_app(&path, "192.0.2.2:4000");
        let bad = serde_json::json!({"email": "admin@netpub.agency", "password": "wrong"});
        let good = serde_json::json!({"email": "admin@netpub.agency", "password": "admin-pass"});

        let first = app.clone().oneshot(json_post("/api/login", bad.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        let bad_password_body = body_string(first).await;

        for _ in 0..2 {
            app.clone().oneshot(json_post("/api/login", bad.clone())).await.unwrap();
        }
        assert!(state.login_throttle.lock().await.is_blocked("192.0.2.2", Utc::now()));

        let blocked = app.oneshot(json_post("/api/login", good)).await.unwrap();
        assert_eq!(blocked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(blocked).await, bad_password_body);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_register_then_duplicate() {
        let path = temp_path();
        let (app, _) = test_app(&path, "192.0.2.3:4000");
        let body = serde_json::json!({"email": "lead@example.com", "password": "longenough", "name": "Lead"});

        let resp = app.clone().oneshot(json_post("/api/register", body.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let payload: AuthPayload = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(payload.user.role, Role::User);

        let dup = app.clone().oneshot(json_post("/api/register", body)).await.unwrap();
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let short = serde_json::json!({"email": "x@example.com", "password": "123"});
        let resp = app.oneshot(json_post("/api/register", short)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_blocked_listing_requires_admin() {
        let path = temp_path();
        let (app, state) = test_app(&path, "192.0.2.4:4000");
        {
            let mut throttle = state.login_throttle.lock().await;
            for _ in 0..3 {
                throttle.record_failure("203.0.113.9", Utc::now());
            }
        }

        let anonymous = Request::builder()
            .uri("/api/admin/blocked")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let user_token = {
            let user = service::register(&state, "plain@example.com", "longenough", None)
                .await
                .unwrap();
            state.sessions.lock().await.create(&user).token
        };
        let forbidden = Request::builder()
            .uri("/api/admin/blocked")
            .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(forbidden).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let admin_token = {
            let admin = state
                .users
                .read()
                .await
                .find_by_email("admin@netpub.agency")
                .cloned()
                .unwrap();
            state.sessions.lock().await.create(&admin).token
        };
        let ok = Request::builder()
            .uri("/api/admin/blocked")
            .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(ok).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listing: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(listing[0]["ip"], "203.0.113.9");
        assert!(listing[0]["remaining_ms"].as_i64().unwrap() > 0);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_me_returns_profile_for_any_session() {
        let path = temp_path();
        let (app, _) = test_app(&path, "192.0.2.5:4000");
        let body = serde_json::json!({"email": "fan@example.com", "password": "longenough", "name": "Fan"});
        let resp = app.clone().oneshot(json_post("/api/register", body)).await.unwrap();
        let payload: AuthPayload = serde_json::from_str(&body_string(resp).await).unwrap();

        let req = Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", payload.token))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let profile: UserProfile = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(profile, payload.user);
        assert_eq!(profile.name.as_deref(), Some("Fan"));

        let anonymous = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let bogus = Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, "Bearer not-a-session")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(bogus).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let _ = std::fs::remove_file(&path);
    }
}
