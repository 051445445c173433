use std::net::SocketAddr;
use std::path::PathBuf;

use kblog_core::AuthConfig;
use serde::Deserialize;

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
    "access-secret",
    "refresh-secret",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_body_kb")]
    pub max_body_kb: usize,
    /// Take the client address from the first `X-Forwarded-For` entry.
    /// Only enable behind a reverse proxy that overwrites the header;
    /// otherwise clients can pick their own rate-limit key.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Bootstrap administrator, created at startup when a password hash is set.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
    #[serde(default)]
    pub password_hash: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            email: default_admin_email(),
            password_hash: String::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_kb: default_max_body_kb(),
            trust_forwarded_for: false,
            auth: AuthConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
fn default_max_body_kb() -> usize { 64 }
fn default_admin_username() -> String { "admin".to_string() }
fn default_admin_email() -> String { "admin@localhost".to_string() }

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("KBLOG_CONFIG").map(PathBuf::from).ok();

        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            ServerConfig::default()
        };

        if let Ok(secret) = std::env::var("KBLOG_ACCESS_SECRET") {
            config.auth.jwt.access_secret = secret;
        }
        if let Ok(secret) = std::env::var("KBLOG_REFRESH_SECRET") {
            config.auth.jwt.refresh_secret = secret;
        }
        if let Ok(addr) = std::env::var("KBLOG_BIND_ADDR") {
            config.bind_addr = addr.parse()?;
        }
        if let Ok(trust) = std::env::var("KBLOG_TRUST_FORWARDED_FOR") {
            config.trust_forwarded_for = trust.parse()?;
        }
        if let Ok(hash) = std::env::var("KBLOG_ADMIN_PASSWORD_HASH") {
            config.admin.password_hash = hash;
        }

        config.finalize()
    }

    /// Fills in missing secrets and rejects placeholder ones.
    pub fn finalize(mut self) -> anyhow::Result<Self> {
        let jwt = &mut self.auth.jwt;
        if jwt.access_secret.is_empty() {
            jwt.access_secret = uuid::Uuid::new_v4().to_string();
            tracing::warn!("No access token secret configured. Generated random secret (will change on restart).");
        }
        if jwt.refresh_secret.is_empty() {
            jwt.refresh_secret = uuid::Uuid::new_v4().to_string();
            tracing::warn!("No refresh token secret configured. Generated random secret (will change on restart).");
        }

        for (name, secret) in [
            ("KBLOG_ACCESS_SECRET", &jwt.access_secret),
            ("KBLOG_REFRESH_SECRET", &jwt.refresh_secret),
        ] {
            if WEAK_SECRETS.iter().any(|&w| secret == w) {
                anyhow::bail!(
                    "{name} matches a known weak/placeholder value. Set a strong random secret."
                );
            }
            if secret.len() < 32 {
                tracing::warn!("{name} is shorter than 32 characters. Consider a stronger secret.");
            }
        }
        if jwt.access_secret == jwt.refresh_secret {
            anyhow::bail!("access and refresh token secrets must differ");
        }

        Ok(self)
    }
}
