use std::net::SocketAddr;
use std::sync::Arc;

use askama::Template;
use axum::Form;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::admin::session::Session;
use crate::auth::client_ip::client_ip;
use crate::auth::service::{INVALID_CREDENTIALS, LoginScope, authenticate};
use crate::auth::throttle::BlockedIp;
use crate::error::AppError;
use crate::state::AppState;

// Templates

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    admin_email: String,
    blocked: Vec<BlockedRow>,
    users: Vec<UserRow>,
    max_failures: u32,
    block_hours: i64,
}

struct BlockedRow {
    ip: String,
    blocked_until: String,
    remaining: String,
}

impl From<BlockedIp> for BlockedRow {
    fn from(b: BlockedIp) -> Self {
        let minutes = b.remaining_ms / 60_000;
        BlockedRow {
            ip: b.ip,
            blocked_until: b.blocked_until.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            remaining: format!("{}h {:02}m", minutes / 60, minutes % 60),
        }
    }
}

struct UserRow {
    email: String,
    name: String,
    role: &'static str,
    created_at: String,
}

// Form structs

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

// Cookie helpers

fn get_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=").map(|v| v.to_string())
        })
}

fn set_session_cookie(token: &str) -> String {
    format!("session={}; HttpOnly; SameSite=Strict; Path=/admin", token)
}

fn clear_session_cookie() -> String {
    "session=; HttpOnly; SameSite=Strict; Path=/admin; Max-Age=0".to_string()
}

async fn admin_session(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let token = get_session_token(headers)?;
    state
        .sessions
        .lock()
        .await
        .get(&token)
        .filter(Session::is_admin)
}

fn render_login(status: StatusCode, error: Option<String>) -> Response {
    let html = LoginTemplate { error }.render().unwrap_or_default();
    (status, Html(html)).into_response()
}

// Handlers

pub async fn admin_login_page() -> Response {
    render_login(StatusCode::OK, None)
}

pub async fn admin_login_submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let ip = client_ip(&headers, addr, state.auth.trust_proxy);

    match authenticate(&state, &ip, &form.email, &form.password, LoginScope::AdminOnly).await {
        Ok(user) => {
            let session = state.sessions.lock().await.create(&user);
            let cookie = set_session_cookie(&session.token);
            (
                [(axum::http::header::SET_COOKIE, cookie)],
                Redirect::to("/admin"),
            )
                .into_response()
        }
        Err(AppError::Unauthorized(_)) => {
            render_login(StatusCode::UNAUTHORIZED, Some(INVALID_CREDENTIALS.into()))
        }
        Err(e) => e.into_response(),
    }
}

pub async fn admin_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = admin_session(&state, &headers).await else {
        return Redirect::to("/admin/login").into_response();
    };

    let (blocked, policy) = {
        let throttle = state.login_throttle.lock().await;
        (throttle.list_blocked(Utc::now()), throttle.policy())
    };
    let users = state
        .users
        .read()
        .await
        .list()
        .iter()
        .map(|u| UserRow {
            email: u.email.clone(),
            name: u.name.clone().unwrap_or_default(),
            role: u.role.as_str(),
            created_at: u.created_at.format("%Y-%m-%d").to_string(),
        })
        .collect();

    let html = DashboardTemplate {
        admin_email: session.email,
        blocked: blocked.into_iter().map(BlockedRow::from).collect(),
        users,
        max_failures: policy.max_failures,
        block_hours: policy.block_duration.num_hours(),
    }
    .render()
    .unwrap_or_default();
    Html(html).into_response()
}

pub async fn admin_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = get_session_token(&headers) {
        state.sessions.lock().await.remove(&token);
    }
    let cookie = clear_session_cookie();
    (
        [(axum::http::header::SET_COOKIE, cookie)],
        Redirect::to("/admin/login"),
    )
        .into_response()
}
