//! Tunables for the access-control components.
//!
//! Every field has a default, so an empty TOML table is a valid config.
//! Durations are written as whole seconds (or milliseconds where noted).

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub rbac: RbacConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub login: LoginLimitConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AuthConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if the TOML is malformed.
    pub fn parse(toml_src: &str) -> AuthResult<Self> {
        toml::from_str(toml_src).map_err(|e| AuthError::Config(e.to_string()))
    }
}

/// Token signing secrets and lifetimes.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub access_secret: String,
    #[serde(default)]
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
        }
    }
}

/// Permission cache key prefix and lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    #[serde(default = "default_rbac_prefix")]
    pub cache_prefix: String,
    #[serde(default = "default_rbac_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl RbacConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_rbac_prefix(),
            cache_ttl_secs: default_rbac_ttl_secs(),
        }
    }
}

/// Fixed-window limits per route tier.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_public_limit")]
    pub public_limit: u32,
    #[serde(default = "default_private_limit")]
    pub private_limit: u32,
    #[serde(default = "default_auth_limit")]
    pub auth_limit: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_rate_prefix(),
            window_secs: default_window_secs(),
            public_limit: default_public_limit(),
            private_limit: default_private_limit(),
            auth_limit: default_auth_limit(),
        }
    }
}

/// Failed-login lockout policy.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginLimitConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Sliding window over which failures are counted.
    #[serde(default = "default_lockout_secs")]
    pub attempt_window_secs: u64,
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
}

impl LoginLimitConfig {
    pub fn attempt_window(&self) -> Duration {
        Duration::from_secs(self.attempt_window_secs)
    }

    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }
}

impl Default for LoginLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_window_secs: default_lockout_secs(),
            lockout_secs: default_lockout_secs(),
        }
    }
}

/// Ephemeral store client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout_ms(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_access_ttl_secs() -> u64 { 15 * 60 }
fn default_refresh_ttl_secs() -> u64 { 7 * 24 * 3600 }
fn default_rbac_prefix() -> String { "rbac:".to_string() }
fn default_rbac_ttl_secs() -> u64 { 3600 }
fn default_rate_prefix() -> String { "rate:".to_string() }
fn default_window_secs() -> u64 { 60 }
fn default_public_limit() -> u32 { 100 }
fn default_private_limit() -> u32 { 60 }
fn default_auth_limit() -> u32 { 5 }
fn default_max_attempts() -> u32 { 5 }
fn default_lockout_secs() -> u64 { 15 * 60 }
fn default_store_timeout_ms() -> u64 { 500 }
fn default_purge_interval_secs() -> u64 { 60 }
