//! Role-based authorization: effective permission sets and route matching.
//!
//! A user's permissions are the union of their roles' permissions, cached in
//! the ephemeral store under `<prefix><user_id>` (cache-aside). Writes that
//! change roles or role permissions must call [`PermissionResolver::invalidate_user`]
//! for every affected user; the cache TTL bounds staleness when they don't.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RbacConfig;
use crate::credentials::CredentialStore;
use crate::error::{AuthError, AuthResult};
use crate::model::{Permission, UserId};
use crate::store::EphemeralStore;

const PARAM_MARKER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A tokenized permission path such as `/post/:id/comments`.
///
/// Matching is segment-wise: a `:name` segment matches exactly one path
/// segment, literals must be equal, and the segment counts must agree.
/// Leading and trailing slashes are ignored; nothing else is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|s| match s.strip_prefix(PARAM_MARKER) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = split_segments(path);
        for segment in &self.segments {
            let Some(part) = parts.next() else {
                return false;
            };
            if let Segment::Literal(lit) = segment {
                if lit != part {
                    return false;
                }
            }
        }
        parts.next().is_none()
    }
}

fn split_segments(path: &str) -> std::str::Split<'_, char> {
    path.trim_matches('/').split('/')
}

/// True iff some permission allows `method` on `path`. Stops at the first match.
pub fn authorize(permissions: &[Permission], method: &str, path: &str) -> bool {
    permissions
        .iter()
        .any(|p| p.method == method && PathPattern::parse(&p.path).matches(path))
}

pub struct PermissionResolver {
    store: Arc<dyn EphemeralStore>,
    credentials: Arc<dyn CredentialStore>,
    prefix: String,
    ttl: Duration,
}

impl PermissionResolver {
    pub fn new(
        config: &RbacConfig,
        store: Arc<dyn EphemeralStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            store,
            credentials,
            prefix: config.cache_prefix.clone(),
            ttl: config.cache_ttl(),
        }
    }

    fn cache_key(&self, user_id: UserId) -> String {
        format!("{}{}", self.prefix, user_id)
    }

    /// Returns the user's effective permissions, from cache when possible.
    ///
    /// A failed or unreadable cache read falls through to the credential
    /// store; a failed cache write is logged and ignored.
    pub async fn effective_permissions(&self, user_id: UserId) -> AuthResult<Vec<Permission>> {
        let key = self.cache_key(user_id);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Permission>>(&raw) {
                Ok(permissions) => {
                    tracing::debug!(user_id, "permission cache hit");
                    return Ok(permissions);
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "discarding unreadable permission cache entry");
                }
            },
            Ok(None) => tracing::debug!(user_id, "permission cache miss"),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "permission cache read failed, querying credential store");
            }
        }

        let permissions = self.credentials.permissions_for_user(user_id).await?;

        match serde_json::to_string(&permissions) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&key, &raw, self.ttl).await {
                    tracing::warn!(user_id, error = %e, "failed to cache permissions");
                }
            }
            Err(e) => tracing::warn!(user_id, error = %e, "failed to serialize permissions"),
        }

        Ok(permissions)
    }

    /// Resolves the user's permissions and checks one route.
    ///
    /// # Errors
    ///
    /// [`AuthError::Forbidden`] when no permission matches.
    pub async fn check(&self, user_id: UserId, method: &str, path: &str) -> AuthResult<()> {
        let permissions = self.effective_permissions(user_id).await?;
        if authorize(&permissions, method, path) {
            return Ok(());
        }
        tracing::warn!(user_id, method, path, "permission denied");
        Err(AuthError::Forbidden {
            method: method.to_string(),
            path: path.to_string(),
        })
    }

    pub async fn invalidate_user(&self, user_id: UserId) -> AuthResult<()> {
        self.store.delete(&self.cache_key(user_id)).await?;
        tracing::debug!(user_id, "permission cache invalidated");
        Ok(())
    }

    /// Invalidates each user independently. Returns how many invalidations failed;
    /// each failure is logged and does not stop the rest.
    pub async fn invalidate_users(&self, user_ids: &[UserId]) -> usize {
        let mut failures = 0;
        for &user_id in user_ids {
            if let Err(e) = self.invalidate_user(user_id).await {
                failures += 1;
                tracing::warn!(user_id, error = %e, "failed to invalidate permission cache");
            }
        }
        failures
    }
}
