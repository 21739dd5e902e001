use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod admin;
mod api;
mod auth;
mod config;
mod error;
mod maintenance;
mod state;
mod users;

use config::Config;
use state::AppState;
use users::store::UserStore;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // JSON API
        .route("/api/login", post(api::login::login))
        .route("/api/register", post(api::login::register))
        .route("/api/me", get(api::login::me))
        .route("/api/admin/blocked", get(api::login::blocked_ips))
        // Admin routes
        .route("/admin", get(admin::routes::admin_dashboard))
        .route(
            "/admin/login",
            get(admin::routes::admin_login_page).post(admin::routes::admin_login_submit),
        )
        .route("/admin/logout", post(admin::routes::admin_logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let mut users = UserStore::load_or_create(&config.users_path)?;
    if users.ensure_admin(&config.admin.email, &config.admin.password)? {
        tracing::info!("Admin user {} created", config.admin.email);
    } else {
        tracing::info!("Admin user already exists");
    }

    let state = Arc::new(AppState::new(users, config.auth.clone()));
    maintenance::spawn_sweeper(state.clone());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("NetPub auth server listening on {}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
