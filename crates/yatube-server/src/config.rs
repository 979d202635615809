use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// How long the rendered global feed is reused, unless overridden.
const DEFAULT_FEED_CACHE_TTL_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub media_dir: PathBuf,
    pub feed_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("YATUBE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("YATUBE_JWT_SECRET is unset or still a placeholder; set it in your environment or .env file");
        }

        let port = match get("YATUBE_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid YATUBE_PORT '{}'", raw))?,
            None => 8000,
        };

        let feed_cache_ttl_secs = match get("YATUBE_FEED_CACHE_TTL_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid YATUBE_FEED_CACHE_TTL_SECS '{}'", raw))?,
            None => DEFAULT_FEED_CACHE_TTL_SECS,
        };

        Ok(Self {
            jwt_secret,
            db_path: get("YATUBE_DB_PATH").unwrap_or_else(|| "yatube.db".into()).into(),
            host: get("YATUBE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            media_dir: get("YATUBE_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into(),
            feed_cache_ttl: Duration::from_secs(feed_cache_ttl_secs),
        })
    }
}
