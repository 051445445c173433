//! Fixed-window request counting per `(route, client)`.
//!
//! The first request in a window writes the counter at 1 with TTL = window;
//! later requests increment it until it reaches the limit. The window resets
//! wholesale when the counter expires.
//!
//! Two simultaneous first requests can both see no counter and both write 1,
//! undercounting by one for that window. That is acceptable for abuse
//! mitigation; do not reuse this for metering.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::error::{AuthError, AuthResult};
use crate::model::UserId;
use crate::store::{EphemeralStore, StoreError};

/// Who a request is counted against. Authenticated users are counted by id
/// so that changing source address does not reset their budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    User(UserId),
    Address(IpAddr),
    Unknown,
}

impl ClientIdentity {
    pub fn resolve(user_id: Option<UserId>, addr: Option<IpAddr>) -> Self {
        match (user_id, addr) {
            (Some(id), _) => ClientIdentity::User(id),
            (None, Some(ip)) => ClientIdentity::Address(ip),
            (None, None) => ClientIdentity::Unknown,
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::User(id) => write!(f, "user:{id}"),
            ClientIdentity::Address(ip) => write!(f, "ip:{ip}"),
            ClientIdentity::Unknown => f.write_str("ip:unknown"),
        }
    }
}

/// Route classes with independent limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    /// Unauthenticated reads.
    Public,
    /// Authenticated API.
    Private,
    /// Login, registration and token refresh.
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { count: i64 },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    store: Arc<dyn EphemeralStore>,
    prefix: String,
    window: Duration,
    public_limit: u32,
    private_limit: u32,
    auth_limit: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn EphemeralStore>) -> Self {
        Self {
            store,
            prefix: config.key_prefix.clone(),
            window: config.window(),
            public_limit: config.public_limit,
            private_limit: config.private_limit,
            auth_limit: config.auth_limit,
        }
    }

    pub fn limit_for(&self, tier: RateTier) -> u32 {
        match tier {
            RateTier::Public => self.public_limit,
            RateTier::Private => self.private_limit,
            RateTier::Auth => self.auth_limit,
        }
    }

    pub fn key(&self, route: &str, client: &ClientIdentity) -> String {
        format!("{}{}:{}", self.prefix, route, client)
    }

    /// Counts one request against `key`.
    pub async fn allow(&self, key: &str, limit: u32, window: Duration) -> AuthResult<RateDecision> {
        let current = match self.store.get(key).await? {
            None => {
                self.store.set(key, "1", window).await?;
                return Ok(RateDecision::Allowed { count: 1 });
            }
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::Corrupt(key.to_string()))?,
        };

        if current >= i64::from(limit) {
            return Ok(RateDecision::Limited {
                retry_after: window,
            });
        }

        let count = self.store.incr(key).await?;
        if count == 1 {
            // The counter expired between the read and the increment.
            self.store.expire(key, window).await?;
        }
        Ok(RateDecision::Allowed { count })
    }

    /// Applies the tier's limit to `(route, client)`.
    ///
    /// # Errors
    ///
    /// [`AuthError::RateLimited`] when over the limit; store failures propagate.
    pub async fn check(&self, tier: RateTier, route: &str, client: &ClientIdentity) -> AuthResult<()> {
        let key = self.key(route, client);
        match self.allow(&key, self.limit_for(tier), self.window).await? {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after } => {
                tracing::warn!(route, client = %client, ?tier, "rate limit exceeded");
                Err(AuthError::RateLimited { retry_after })
            }
        }
    }
}
