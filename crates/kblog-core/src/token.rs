//! Paired access/refresh tokens with revocation.
//!
//! Tokens are HS256 JWTs. Access and refresh tokens are signed with distinct
//! secrets and carry a `token_type` claim, so neither can stand in for the
//! other. A token is revoked by writing `blacklist:<token_id>` to the
//! ephemeral store with a TTL equal to the token's remaining validity; the
//! entry then disappears on its own once the token would have expired anyway.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult, TokenError};
use crate::model::UserId;
use crate::store::EphemeralStore;

const BLACKLIST_PREFIX: &str = "blacklist:";
const REVOKED_SENTINEL: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn other(self) -> Self {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub username: String,
    pub token_id: String,
    pub token_type: TokenKind,
    /// Absolute expiry, seconds since the Unix epoch.
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKeys {
    fn from_secret(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
    store: Arc<dyn EphemeralStore>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Builds the service, rejecting unusable key material.
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] if a secret is empty, both kinds share a secret,
    /// a TTL is zero, or the access TTL is not shorter than the refresh TTL.
    pub fn new(
        config: &JwtConfig,
        store: Arc<dyn EphemeralStore>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".to_string()));
        }
        if config.access_secret == config.refresh_secret {
            return Err(AuthError::Config(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }
        if config.access_ttl_secs == 0 || config.refresh_ttl_secs == 0 {
            return Err(AuthError::Config("token TTLs must be positive".to_string()));
        }
        if config.access_ttl_secs >= config.refresh_ttl_secs {
            return Err(AuthError::Config(
                "access token TTL must be shorter than refresh token TTL".to_string(),
            ));
        }

        // Expiry is checked against `clock` in `decode_verified`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Ok(Self {
            access: SigningKeys::from_secret(&config.access_secret, config.access_ttl()),
            refresh: SigningKeys::from_secret(&config.refresh_secret, config.refresh_ttl()),
            validation,
            store,
            clock,
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign(&self, user_id: UserId, username: &str, kind: TokenKind) -> AuthResult<String> {
        let keys = self.keys(kind);
        let claims = Claims {
            user_id,
            username: username.to_string(),
            token_id: uuid::Uuid::new_v4().to_string(),
            token_type: kind,
            exp: self.clock.now_secs() + keys.ttl.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Issues a fresh access/refresh pair. Touches no store.
    pub fn issue_pair(&self, user_id: UserId, username: &str) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(user_id, username, TokenKind::Access)?,
            refresh_token: self.sign(user_id, username, TokenKind::Refresh)?,
        })
    }

    /// Signature, kind and expiry checks only; the revocation list is not consulted.
    pub fn decode_verified(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let claims = match decode::<Claims>(token, &self.keys(expected).decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(_) => {
                let other = self.keys(expected.other());
                return match decode::<Claims>(token, &other.decoding, &self.validation) {
                    Ok(_) => Err(TokenError::WrongKind),
                    Err(_) => Err(TokenError::Malformed),
                };
            }
        };

        if claims.token_type != expected {
            return Err(TokenError::WrongKind);
        }
        if claims.exp <= self.clock.now_secs() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Full validation: signature, kind, expiry and revocation.
    ///
    /// A store failure during the revocation lookup is returned as an error,
    /// never treated as "not revoked".
    pub async fn validate(&self, token: &str, expected: TokenKind) -> AuthResult<Claims> {
        let claims = self.decode_verified(token, expected)?;
        if self.is_revoked(&claims.token_id).await? {
            tracing::warn!(
                token_id = %claims.token_id,
                user_id = claims.user_id,
                "revoked token presented"
            );
            return Err(TokenError::Revoked.into());
        }
        Ok(claims)
    }

    /// Validates a refresh token, consumes it, and issues a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.consume_refresh(refresh_token).await?;
        tracing::debug!(user_id = claims.user_id, "refresh token rotated");
        self.issue_pair(claims.user_id, &claims.username)
    }

    /// Validates a refresh token and marks it used, returning its claims.
    ///
    /// Consumption is an atomic increment on the token's revocation key, so
    /// of several concurrent callers presenting the same refresh token only
    /// the first one succeeds. Every presentation (re)applies the key's TTL,
    /// so a key left without expiry by a failed call is repaired on replay.
    pub async fn consume_refresh(&self, refresh_token: &str) -> AuthResult<Claims> {
        let claims = self.decode_verified(refresh_token, TokenKind::Refresh)?;
        let key = blacklist_key(&claims.token_id);

        let uses = self.store.incr(&key).await?;
        if let Err(e) = self.store.expire(&key, self.remaining(&claims)).await {
            tracing::error!(key = %key, error = %e, "revocation key left without expiry");
            return Err(e.into());
        }
        if uses > 1 {
            tracing::warn!(
                token_id = %claims.token_id,
                user_id = claims.user_id,
                "refresh token replayed after rotation"
            );
            return Err(TokenError::Revoked.into());
        }
        Ok(claims)
    }

    /// Writes (or refreshes) a revocation entry. A zero TTL is a no-op:
    /// the token it would shadow has already expired.
    pub async fn revoke(&self, token_id: &str, ttl: Duration) -> AuthResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.store
            .set(&blacklist_key(token_id), REVOKED_SENTINEL, ttl)
            .await?;
        Ok(())
    }

    /// Revokes the token described by `claims` for the rest of its validity.
    pub async fn revoke_claims(&self, claims: &Claims) -> AuthResult<()> {
        self.revoke(&claims.token_id, self.remaining(claims)).await
    }

    pub async fn is_revoked(&self, token_id: &str) -> AuthResult<bool> {
        Ok(self.store.exists(&blacklist_key(token_id)).await?)
    }

    /// Time until `claims` expires, zero if already expired.
    pub fn remaining(&self, claims: &Claims) -> Duration {
        Duration::from_secs(claims.exp.saturating_sub(self.clock.now_secs()))
    }
}

fn blacklist_key(token_id: &str) -> String {
    format!("{BLACKLIST_PREFIX}{token_id}")
}
