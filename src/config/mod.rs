//! Configuration module for the content backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::Collection;

/// Which identity provider guards the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Admin accounts stored in the content database
    Accounts,
    /// A single configured credential pair
    Static,
    /// No authentication at all
    Open,
}

impl AuthMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounts" => Some(AuthMode::Accounts),
            "static" => Some(AuthMode::Static),
            "open" => Some(AuthMode::Open),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory holding uploaded media
    pub media_dir: PathBuf,
    /// Public URL prefix under which media is served
    pub public_media_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub auth_mode: AuthMode,
    /// Bootstrap account (accounts mode) or the credential pair (static mode)
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub session_ttl: Duration,
    /// Collections whose seed data is persisted when found empty
    pub seed_write_back: HashSet<Collection>,
    /// Chat assistant API key; the assistant is disabled without it
    pub assistant_api_key: Option<String>,
    pub assistant_model: String,
    pub assistant_endpoint: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("CMS_DB_PATH")
            .unwrap_or_else(|_| "./data/content.sqlite".to_string())
            .into();

        let media_dir = env::var("CMS_MEDIA_DIR")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();

        let bind_addr: SocketAddr = env::var("CMS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid CMS_BIND_ADDR format: {}", e)))?;

        let public_media_url = env::var("CMS_PUBLIC_MEDIA_URL")
            .unwrap_or_else(|_| format!("http://{}/media", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let log_level = env::var("CMS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let auth_mode = match env::var("CMS_AUTH_MODE") {
            Ok(raw) => AuthMode::parse(&raw).ok_or_else(|| {
                AppError::Config(format!(
                    "Invalid CMS_AUTH_MODE '{}': expected accounts, static or open",
                    raw
                ))
            })?,
            Err(_) => AuthMode::Accounts,
        };

        let admin_email = non_empty_var("CMS_ADMIN_EMAIL");
        let admin_password = non_empty_var("CMS_ADMIN_PASSWORD");

        let session_ttl = match env::var("CMS_SESSION_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    AppError::Config(format!("Invalid CMS_SESSION_TTL_SECS '{}'", raw))
                })?,
            Err(_) => Duration::from_secs(8 * 60 * 60),
        };

        let seed_write_back = match env::var("CMS_SEED_WRITE_BACK") {
            Ok(raw) => parse_collection_list(&raw)?,
            Err(_) => HashSet::new(),
        };

        if auth_mode == AuthMode::Static && (admin_email.is_none() || admin_password.is_none()) {
            return Err(AppError::Config(
                "CMS_AUTH_MODE=static requires CMS_ADMIN_EMAIL and CMS_ADMIN_PASSWORD".to_string(),
            ));
        }

        Ok(Self {
            db_path,
            media_dir,
            public_media_url,
            bind_addr,
            log_level,
            auth_mode,
            admin_email,
            admin_password,
            session_ttl,
            seed_write_back,
            assistant_api_key: non_empty_var("CMS_ASSISTANT_API_KEY"),
            assistant_model: env::var("CMS_ASSISTANT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            assistant_endpoint: env::var("CMS_ASSISTANT_ENDPOINT")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Config rooted in `data_dir`, bound to an ephemeral port, open auth.
    pub(crate) fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            db_path: data_dir.join("test.sqlite"),
            media_dir: data_dir.join("media"),
            public_media_url: "http://127.0.0.1:0/media".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            auth_mode: AuthMode::Open,
            admin_email: None,
            admin_password: None,
            session_ttl: Duration::from_secs(60),
            seed_write_back: HashSet::new(),
            assistant_api_key: None,
            assistant_model: "gemini-2.5-flash".to_string(),
            assistant_endpoint: "http://127.0.0.1:1".to_string(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a comma separated list of collection names (store names or URL slugs).
fn parse_collection_list(raw: &str) -> Result<HashSet<Collection>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            Collection::from_name(name)
                .or_else(|| Collection::from_slug(name))
                .ok_or_else(|| {
                    AppError::Config(format!("Unknown collection '{}' in CMS_SEED_WRITE_BACK", name))
                })
        })
        .collect()
}
