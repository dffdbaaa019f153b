use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Base URL under which this server serves `/uploads`.
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub login_token_ttl: Duration,
    pub share_token_ttl: Duration,
    pub session_ttl: Duration,
    /// Set only when all three Cloudinary variables are present.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("TIDINGS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TIDINGS_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("TIDINGS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("TIDINGS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("TIDINGS_PORT is not a valid port")?;

        let public_url = var("TIDINGS_PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{}", port));

        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            db_path: var("TIDINGS_DB_PATH").unwrap_or_else(|| "tidings.db".into()).into(),
            host,
            port,
            frontend_url: var("TIDINGS_FRONTEND_URL").unwrap_or_default(),
            public_url,
            upload_dir: var("TIDINGS_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            login_token_ttl: Duration::minutes(number(&var, "TIDINGS_LOGIN_TTL_MINUTES", 15)?),
            share_token_ttl: Duration::hours(number(&var, "TIDINGS_SHARE_TTL_HOURS", 24)?),
            session_ttl: Duration::days(number(&var, "TIDINGS_SESSION_TTL_DAYS", 7)?),
            cloudinary,
        })
    }
}

fn number(var: &impl Fn(&str) -> Option<String>, key: &str, default: i64) -> Result<i64> {
    match var(key) {
        None => Ok(default),
        Some(raw) => {
            let n: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} is not a number: '{}'", key, raw))?;
            if n <= 0 {
                bail!("{} must be positive, got {}", key, n);
            }
            Ok(n)
        }
    }
}
