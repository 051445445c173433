//! Failed-login counting and temporary lockout.
//!
//! Two keys per login identifier:
//! - `login_attempts:<id>` counts failures; its TTL is pushed back on every
//!   failure, so it only expires after a quiet `attempt_window`.
//! - `login_lock:<id>` is written when the count reaches `max_attempts` and
//!   lives for exactly `lockout`; while it exists, logins are refused before
//!   the password is looked at.

use std::sync::Arc;
use std::time::Duration;

use crate::config::LoginLimitConfig;
use crate::error::{AuthError, AuthResult};
use crate::store::{EphemeralStore, KeyTtl};

const ATTEMPTS_PREFIX: &str = "login_attempts:";
const LOCK_PREFIX: &str = "login_lock:";
const LOCK_SENTINEL: &str = "locked";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    /// Residual lockout time; zero when not locked.
    pub remaining: Duration,
}

/// Where an identifier stands after an attempt is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Clear,
    Warned { failures: u32 },
    Locked,
}

pub struct LoginGovernor {
    store: Arc<dyn EphemeralStore>,
    max_attempts: u32,
    attempt_window: Duration,
    lockout: Duration,
}

impl LoginGovernor {
    pub fn new(config: &LoginLimitConfig, store: Arc<dyn EphemeralStore>) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts.max(1),
            attempt_window: config.attempt_window(),
            lockout: config.lockout(),
        }
    }

    /// Reports whether `identifier` is locked and for how much longer.
    ///
    /// A store failure is returned as an error; callers must refuse the login.
    pub async fn check_locked(&self, identifier: &str) -> AuthResult<LockStatus> {
        let status = match self.store.ttl(&lock_key(identifier)).await? {
            KeyTtl::Missing => LockStatus {
                locked: false,
                remaining: Duration::ZERO,
            },
            KeyTtl::Persistent => LockStatus {
                locked: true,
                remaining: self.lockout,
            },
            KeyTtl::Expires(left) => LockStatus {
                locked: true,
                remaining: left.min(self.lockout),
            },
        };
        Ok(status)
    }

    /// Like [`check_locked`](Self::check_locked) but turns a lock into [`AuthError::Locked`].
    pub async fn ensure_unlocked(&self, identifier: &str) -> AuthResult<()> {
        let status = self.check_locked(identifier).await?;
        if status.locked {
            tracing::warn!(
                identifier,
                remaining_secs = status.remaining.as_secs(),
                "login refused: identifier locked"
            );
            return Err(AuthError::Locked {
                remaining: status.remaining,
            });
        }
        Ok(())
    }

    pub async fn record_attempt(&self, identifier: &str, success: bool) -> AuthResult<AttemptState> {
        let counter = attempts_key(identifier);

        if success {
            self.store.delete(&counter).await?;
            return Ok(AttemptState::Clear);
        }

        let failures = self.store.incr(&counter).await?;
        self.store.expire(&counter, self.attempt_window).await?;

        if failures >= i64::from(self.max_attempts) {
            self.store
                .set(&lock_key(identifier), LOCK_SENTINEL, self.lockout)
                .await?;
            tracing::warn!(identifier, failures, "identifier locked after repeated failures");
            return Ok(AttemptState::Locked);
        }

        tracing::debug!(identifier, failures, "failed login recorded");
        Ok(AttemptState::Warned {
            failures: failures as u32,
        })
    }
}

fn attempts_key(identifier: &str) -> String {
    format!("{ATTEMPTS_PREFIX}{identifier}")
}

fn lock_key(identifier: &str) -> String {
    format!("{LOCK_PREFIX}{identifier}")
}
