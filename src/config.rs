//! Runtime configuration, read from the environment once at startup.

use anyhow::{bail, Context, Result};

use crate::calendar::GoogleConfig;
use crate::llm::GroqConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://kitchen_os.db?mode=rwc";
const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_SESSION_EXPIRE_DAYS: u64 = 7;
const MAX_SESSION_EXPIRE_DAYS: u64 = 3650;

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) database_url: String,
    pub(crate) redis_url: String,
    pub(crate) addr: String,
    pub(crate) session_expire_days: u64,
    pub(crate) admin_bootstrap_token: Option<String>,
    /// `None` means any origin.
    pub(crate) allowed_origins: Option<Vec<String>>,
    pub(crate) groq: Option<GroqConfig>,
    pub(crate) google: Option<GoogleConfig>,
    pub(crate) frontend_url: Option<String>,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        let session_expire_days = match non_empty_var("SESSION_EXPIRE_DAYS") {
            Some(days) => parse_session_days(&days)?,
            None => DEFAULT_SESSION_EXPIRE_DAYS,
        };

        let groq = match non_empty_var("GROQ_API_KEY") {
            Some(api_key) => {
                let mut groq = GroqConfig::new(api_key);
                if let Some(model) = non_empty_var("GROQ_MODEL") {
                    groq.model = model;
                }
                if let Some(api_base) = non_empty_var("GROQ_API_BASE") {
                    groq.api_base = api_base;
                }
                Some(groq)
            }
            None => {
                tracing::warn!("GROQ_API_KEY is not set, AI endpoints will be unavailable");
                None
            }
        };

        let google = match (
            non_empty_var("GOOGLE_CLIENT_ID"),
            non_empty_var("GOOGLE_CLIENT_SECRET"),
            non_empty_var("GOOGLE_REDIRECT_URI"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => {
                Some(GoogleConfig::new(client_id, client_secret, redirect_uri))
            }
            _ => None,
        };

        Ok(Config {
            database_url: non_empty_var("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            redis_url: std::env::var("REDIS_URL").context("REDIS_URL is not set in env")?,
            addr: non_empty_var("ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            session_expire_days,
            admin_bootstrap_token: non_empty_var("ADMIN_BOOTSTRAP_TOKEN"),
            allowed_origins: parse_origins(
                &std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),
            groq,
            google,
            frontend_url: non_empty_var("FRONTEND_URL"),
        })
    }

    pub(crate) fn session_duration_secs(&self) -> u64 {
        self.session_expire_days * 24 * 60 * 60
    }
}

fn parse_session_days(raw: &str) -> Result<u64> {
    let days: u64 = raw
        .parse()
        .context("SESSION_EXPIRE_DAYS must be a whole number of days")?;
    if days == 0 || days > MAX_SESSION_EXPIRE_DAYS {
        bail!(
            "SESSION_EXPIRE_DAYS must be between 1 and {}",
            MAX_SESSION_EXPIRE_DAYS
        );
    }
    Ok(days)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        None
    } else {
        Some(origins)
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for tests: in-memory database, nothing external configured.
    pub(crate) fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            addr: DEFAULT_ADDR.to_string(),
            session_expire_days: DEFAULT_SESSION_EXPIRE_DAYS,
            admin_bootstrap_token: None,
            allowed_origins: None,
            groq: None,
            google: None,
            frontend_url: None,
        }
    }
}
