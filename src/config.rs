use std::path::PathBuf;

use chrono::TimeDelta;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub users_path: PathBuf,
    pub admin: AdminConfig,
    pub auth: AuthConfig,
}

#[derive(Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub trust_proxy: bool,
    pub session_ttl: TimeDelta,
    /// When set, idle attempt records older than this are swept.
    pub attempt_retention: Option<TimeDelta>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            trust_proxy: false,
            session_ttl: TimeDelta::hours(7 * 24),
            attempt_retention: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_email = std::env::var("NETPUB_ADMIN_EMAIL")
            .map_err(|_| anyhow::anyhow!("NETPUB_ADMIN_EMAIL environment variable is required"))?;
        let admin_password = std::env::var("NETPUB_ADMIN_PASSWORD").map_err(|_| {
            anyhow::anyhow!("NETPUB_ADMIN_PASSWORD environment variable is required")
        })?;

        let defaults = AuthConfig::default();
        let session_ttl = match std::env::var("NETPUB_SESSION_TTL_HOURS") {
            Ok(v) => TimeDelta::hours(parse_hours("NETPUB_SESSION_TTL_HOURS", &v)?),
            Err(_) => defaults.session_ttl,
        };
        let attempt_retention = match std::env::var("NETPUB_ATTEMPT_RETENTION_HOURS") {
            Ok(v) => Some(TimeDelta::hours(parse_hours(
                "NETPUB_ATTEMPT_RETENTION_HOURS",
                &v,
            )?)),
            Err(_) => None,
        };

        Ok(Config {
            bind_addr: {
                let port = std::env::var("NETPUB_PORT").unwrap_or_else(|_| "4000".to_string());
                std::env::var("NETPUB_BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", port))
            },
            users_path: PathBuf::from(
                std::env::var("NETPUB_USERS_PATH").unwrap_or_else(|_| "./users.json".to_string()),
            ),
            admin: AdminConfig {
                email: admin_email,
                password: admin_password,
            },
            auth: AuthConfig {
                trust_proxy: std::env::var("NETPUB_TRUST_PROXY")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(false),
                session_ttl,
                attempt_retention,
            },
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_hours(name: &str, value: &str) -> anyhow::Result<i64> {
    let hours: i64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a whole number of hours, got {:?}", name, value))?;
    if hours <= 0 {
        anyhow::bail!("{} must be positive, got {}", name, hours);
    }
    Ok(hours)
}
