//! Account operations that tie the credential store to tokens, lockout and
//! the permission cache.
//!
//! Relational writes go to the [`CredentialStore`] first; cache invalidation
//! runs only after the write has committed. An invalidation failure is logged
//! and does not undo or fail the write: the stale entry ages out with the
//! cache TTL.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::credentials::{CredentialError, CredentialStore, RolePermissionsUpdate};
use crate::error::{AuthError, AuthResult, TokenError};
use crate::login_guard::{AttemptState, LoginGovernor};
use crate::model::{NewUser, PermissionId, RoleId, User, UserId};
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::rbac::PermissionResolver;
use crate::token::{Claims, TokenKind, TokenPair, TokenService};

/// How a user names themselves at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Username(String),
    Email(String),
}

impl LoginIdentifier {
    /// Anything containing `@` is treated as an email address.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains('@') {
            LoginIdentifier::Email(raw.to_string())
        } else {
            LoginIdentifier::Username(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LoginIdentifier::Username(s) | LoginIdentifier::Email(s) => s,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct AccountService {
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    resolver: Arc<PermissionResolver>,
    governor: Arc<LoginGovernor>,
}

impl AccountService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        resolver: Arc<PermissionResolver>,
        governor: Arc<LoginGovernor>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            resolver,
            governor,
        }
    }

    /// Self-service sign-up. The new user gets the default role.
    pub async fn register(&self, registration: Registration) -> AuthResult<User> {
        let role = self.credentials.default_role().await?;
        self.insert_user(registration, role.id).await
    }

    /// Administrative creation with an explicit role.
    pub async fn create_user(&self, registration: Registration, role_id: RoleId) -> AuthResult<User> {
        self.credentials.find_role_by_id(role_id).await?;
        self.insert_user(registration, role_id).await
    }

    async fn insert_user(&self, registration: Registration, role_id: RoleId) -> AuthResult<User> {
        let password_hash = hash_password_blocking(registration.password).await?;
        let user = self
            .credentials
            .create_user(
                NewUser {
                    username: registration.username,
                    email: registration.email,
                    password_hash,
                },
                &[role_id],
            )
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, role_id, "user created");
        Ok(user)
    }

    /// Authenticates and issues a token pair.
    ///
    /// Locked identifiers are refused before any password work. Unknown
    /// users and wrong passwords both count as a failed attempt and both
    /// surface as [`AuthError::InvalidCredentials`].
    pub async fn login(&self, identifier: &LoginIdentifier, password: &str) -> AuthResult<LoginSuccess> {
        let key = identifier.as_str();
        self.governor.ensure_unlocked(key).await?;

        let lookup = match identifier {
            LoginIdentifier::Username(name) => self.credentials.find_user_by_username(name).await,
            LoginIdentifier::Email(email) => self.credentials.find_user_by_email(email).await,
        };
        let user = match lookup {
            Ok(user) => Some(user),
            Err(CredentialError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let verified = match &user {
            Some(u) => verify_password_blocking(u.password_hash.clone(), password.to_string()).await?,
            None => false,
        };

        let user = match user {
            Some(user) if verified => user,
            _ => {
                tracing::warn!(identifier = key, "failed login");
                if self.governor.record_attempt(key, false).await? == AttemptState::Locked {
                    let status = self.governor.check_locked(key).await?;
                    return Err(AuthError::Locked {
                        remaining: status.remaining,
                    });
                }
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.governor.record_attempt(key, true).await?;
        let tokens = self.tokens.issue_pair(user.id, &user.username)?;
        tracing::info!(user_id = user.id, "login succeeded");
        Ok(LoginSuccess { user, tokens })
    }

    /// Revokes the caller's access token and, if it is valid and belongs to
    /// the same user, the refresh token presented alongside it.
    pub async fn logout(&self, access: &Claims, refresh_token: Option<&str>) -> AuthResult<()> {
        self.tokens.revoke_claims(access).await?;

        if let Some(raw) = refresh_token.filter(|t| !t.is_empty()) {
            match self.tokens.decode_verified(raw, TokenKind::Refresh) {
                Ok(refresh) if refresh.user_id == access.user_id => {
                    self.tokens.revoke_claims(&refresh).await?;
                }
                Ok(_) => {
                    tracing::warn!(user_id = access.user_id, "logout with another user's refresh token ignored");
                }
                Err(e) => tracing::debug!(user_id = access.user_id, error = %e, "unusable refresh token on logout"),
            }
        }

        tracing::info!(user_id = access.user_id, "logged out");
        Ok(())
    }

    /// Rotates a refresh token. The token is consumed first, so a token whose
    /// subject has since been deleted is spent and refused.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.tokens.consume_refresh(refresh_token).await?;
        let user = match self.credentials.find_user_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(CredentialError::NotFound(_)) => {
                tracing::warn!(user_id = claims.user_id, "refresh for deleted user refused");
                return Err(TokenError::Revoked.into());
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(user_id = user.id, "refresh token rotated");
        self.tokens.issue_pair(user.id, &user.username)
    }

    pub async fn update_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AuthResult<User> {
        let role_ids = dedup(role_ids.iter().copied());
        let user = self.credentials.replace_user_roles(user_id, &role_ids).await?;
        self.resolver.invalidate_users(&[user_id]).await;
        Ok(user)
    }

    /// Replaces a role's permission set. Default permissions are always kept
    /// and duplicate ids collapse. Every holder of the role has their cached
    /// permissions dropped after the write commits.
    pub async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AuthResult<RolePermissionsUpdate> {
        let defaults = self.credentials.default_permission_ids().await?;
        let ids = dedup(permission_ids.iter().chain(defaults.iter()).copied());

        let update = self.credentials.replace_role_permissions(role_id, &ids).await?;

        let failed = self.resolver.invalidate_users(&update.member_ids).await;
        tracing::info!(
            role_id,
            permissions = ids.len(),
            members = update.member_ids.len(),
            failed_invalidations = failed,
            "role permissions replaced"
        );
        Ok(update)
    }

    pub async fn delete_user(&self, user_id: UserId) -> AuthResult<()> {
        self.credentials.delete_user(user_id).await?;
        self.resolver.invalidate_users(&[user_id]).await;
        tracing::info!(user_id, "user deleted");
        Ok(())
    }
}

fn dedup(ids: impl Iterator<Item = u64>) -> Vec<u64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{JwtConfig, LoginLimitConfig, RbacConfig};
    use crate::credentials::MemoryCredentialStore;
    use crate::error::{ErrorKind, TokenError};
    use crate::model::{NewPermission, NewRole};
    use crate::store::{EphemeralStore, MemoryStore};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        creds: Arc<MemoryCredentialStore>,
        tokens: Arc<TokenService>,
        resolver: Arc<PermissionResolver>,
        accounts: AccountService,
        user_role: RoleId,
        admin_role: RoleId,
        default_perm: PermissionId,
        create_post: PermissionId,
        delete_post: PermissionId,
    }

    fn perm(code: &str, method: &str, path: &str, is_default: bool) -> NewPermission {
        NewPermission {
            name: code.to_string(),
            code: code.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            description: String::new(),
            is_default,
        }
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let creds = Arc::new(MemoryCredentialStore::new());

        let default_perm = creds
            .create_permission(perm("me:permissions", "GET", "/me/permissions", true))
            .await
            .unwrap()
            .id;
        let create_post = creds
            .create_permission(perm("post:create", "POST", "/post", false))
            .await
            .unwrap()
            .id;
        let delete_post = creds
            .create_permission(perm("post:delete", "DELETE", "/post/:id", false))
            .await
            .unwrap()
            .id;
        let user_role = creds
            .create_role(NewRole {
                name: "user".to_string(),
                code: "USER".to_string(),
                description: String::new(),
                is_default: true,
                permission_ids: vec![default_perm, create_post],
            })
            .await
            .unwrap()
            .id;
        let admin_role = creds
            .create_role(NewRole {
                name: "admin".to_string(),
                code: "ADMIN".to_string(),
                description: String::new(),
                is_default: false,
                permission_ids: vec![default_perm, create_post, delete_post],
            })
            .await
            .unwrap()
            .id;

        let jwt = JwtConfig {
            access_secret: "account-tests-access-secret".to_string(),
            refresh_secret: "account-tests-refresh-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 3600,
        };
        let tokens = Arc::new(TokenService::new(&jwt, store.clone(), clock.clone()).unwrap());
        let resolver = Arc::new(PermissionResolver::new(
            &RbacConfig::default(),
            store.clone(),
            creds.clone(),
        ));
        let governor = Arc::new(LoginGovernor::new(
            &LoginLimitConfig {
                max_attempts: 3,
                attempt_window_secs: 900,
                lockout_secs: 900,
            },
            store.clone(),
        ));
        let accounts = AccountService::new(creds.clone(), tokens.clone(), resolver.clone(), governor);

        Fixture {
            clock,
            store,
            creds,
            tokens,
            resolver,
            accounts,
            user_role,
            admin_role,
            default_perm,
            create_post,
            delete_post,
        }
    }

    fn registration(name: &str) -> Registration {
        Registration {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: "hunter22".to_string(),
        }
    }

    #[test]
    fn identifier_parsing() {
        assert_eq!(
            LoginIdentifier::parse("alice"),
            LoginIdentifier::Username("alice".to_string())
        );
        assert_eq!(
            LoginIdentifier::parse(" a@b.c "),
            LoginIdentifier::Email("a@b.c".to_string())
        );
    }

    #[tokio::test]
    async fn register_assigns_default_role_and_hashes() {
        let f = fixture().await;
        let user = f.accounts.register(registration("alice")).await.unwrap();
        assert_eq!(user.role_ids, vec![f.user_role]);
        assert_ne!(user.password_hash, "hunter22");
    }

    #[tokio::test]
    async fn register_conflict_names_the_field() {
        let f = fixture().await;
        f.accounts.register(registration("alice")).await.unwrap();

        let err = f.accounts.register(registration("alice")).await.unwrap_err();
        assert!(matches!(&err, AuthError::Conflict { field } if field == "username"));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let mut other = registration("alice2");
        other.email = "alice@example.com".to_string();
        let err = f.accounts.register(other).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict { field } if field == "email"));
    }

    #[tokio::test]
    async fn create_user_with_unknown_role_is_not_found() {
        let f = fixture().await;
        let err = f.accounts.create_user(registration("bob"), 9999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let user = f.accounts.create_user(registration("bob"), f.admin_role).await.unwrap();
        assert_eq!(user.role_ids, vec![f.admin_role]);
    }

    #[tokio::test]
    async fn login_by_username_or_email() {
        let f = fixture().await;
        let user = f.accounts.register(registration("alice")).await.unwrap();

        let ok = f
            .accounts
            .login(&LoginIdentifier::parse("alice"), "hunter22")
            .await
            .unwrap();
        let claims = f.tokens.validate(&ok.tokens.access_token, TokenKind::Access).await.unwrap();
        assert_eq!(claims.user_id, user.id);

        let ok = f
            .accounts
            .login(&LoginIdentifier::parse("alice@example.com"), "hunter22")
            .await
            .unwrap();
        assert_eq!(ok.user.id, user.id);
    }

    #[tokio::test]
    async fn unknown_user_and_bad_password_look_the_same() {
        let f = fixture().await;
        f.accounts.register(registration("alice")).await.unwrap();

        let wrong = f
            .accounts
            .login(&LoginIdentifier::parse("alice"), "nope")
            .await
            .unwrap_err();
        let missing = f
            .accounts
            .login(&LoginIdentifier::parse("mallory"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(missing, AuthError::InvalidCredentials));
        assert_eq!(
            f.store.get("login_attempts:mallory").await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn repeated_failures_lock_even_the_right_password() {
        let f = fixture().await;
        f.accounts.register(registration("alice")).await.unwrap();
        let id = LoginIdentifier::parse("alice");

        f.accounts.login(&id, "x").await.unwrap_err();
        f.accounts.login(&id, "x").await.unwrap_err();
        let third = f.accounts.login(&id, "x").await.unwrap_err();
        assert!(matches!(third, AuthError::Locked { remaining } if remaining > Duration::ZERO));

        let err = f.accounts.login(&id, "hunter22").await.unwrap_err();
        assert!(matches!(err, AuthError::Locked { .. }));

        f.clock.advance(Duration::from_secs(901));
        assert!(f.accounts.login(&id, "hunter22").await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_access_and_refresh() {
        let f = fixture().await;
        f.accounts.register(registration("alice")).await.unwrap();
        let session = f
            .accounts
            .login(&LoginIdentifier::parse("alice"), "hunter22")
            .await
            .unwrap();
        let access = f
            .tokens
            .validate(&session.tokens.access_token, TokenKind::Access)
            .await
            .unwrap();

        f.accounts
            .logout(&access, Some(&session.tokens.refresh_token))
            .await
            .unwrap();

        let err = f
            .tokens
            .validate(&session.tokens.access_token, TokenKind::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Revoked)));
        let err = f.accounts.refresh(&session.tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn logout_ignores_garbage_refresh_token() {
        let f = fixture().await;
        let pair = f.tokens.issue_pair(7, "x").unwrap();
        let access = f.tokens.decode_verified(&pair.access_token, TokenKind::Access).unwrap();
        f.accounts.logout(&access, Some("garbage")).await.unwrap();
        assert!(f.tokens.is_revoked(&access.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn refresh_rotates() {
        let f = fixture().await;
        let user = f.accounts.register(registration("alice")).await.unwrap();
        let pair = f.tokens.issue_pair(user.id, &user.username).unwrap();
        let next = f.accounts.refresh(&pair.refresh_token).await.unwrap();
        assert!(f.accounts.refresh(&pair.refresh_token).await.is_err());
        assert!(f.accounts.refresh(&next.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn role_change_invalidates_user_cache() {
        let f = fixture().await;
        let user = f.accounts.register(registration("alice")).await.unwrap();
        assert!(f.resolver.check(user.id, "DELETE", "/post/1").await.is_err());

        f.accounts
            .update_user_roles(user.id, &[f.admin_role, f.admin_role])
            .await
            .unwrap();
        assert!(f.resolver.check(user.id, "DELETE", "/post/1").await.is_ok());
        assert_eq!(
            f.creds.find_user_by_id(user.id).await.unwrap().role_ids,
            vec![f.admin_role]
        );
    }

    #[tokio::test]
    async fn role_permission_update_keeps_defaults_and_fans_out() {
        let f = fixture().await;
        let alice = f.accounts.register(registration("alice")).await.unwrap();
        let bob = f.accounts.register(registration("bob")).await.unwrap();
        for id in [alice.id, bob.id] {
            f.resolver.effective_permissions(id).await.unwrap();
            assert!(f.store.exists(&format!("rbac:{id}")).await.unwrap());
        }

        let update = f
            .accounts
            .update_role_permissions(f.user_role, &[f.delete_post, f.delete_post])
            .await
            .unwrap();
        assert_eq!(update.role.permission_ids, vec![f.default_perm, f.delete_post]);
        assert_eq!(update.member_ids.len(), 2);

        for id in [alice.id, bob.id] {
            assert!(!f.store.exists(&format!("rbac:{id}")).await.unwrap());
            assert!(f.resolver.check(id, "DELETE", "/post/3").await.is_ok());
            assert!(f.resolver.check(id, "POST", "/post").await.is_err());
        }
    }

    #[tokio::test]
    async fn role_permission_update_rejects_unknown_ids() {
        let f = fixture().await;
        let err = f
            .accounts
            .update_role_permissions(f.user_role, &[f.create_post, 4242])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let role = f.creds.find_role_by_id(f.user_role).await.unwrap();
        assert_eq!(role.permission_ids, vec![f.default_perm, f.create_post]);
    }

    #[tokio::test]
    async fn deleted_user_cannot_refresh() {
        let f = fixture().await;
        f.accounts.register(registration("alice")).await.unwrap();
        let session = f
            .accounts
            .login(&LoginIdentifier::parse("alice"), "hunter22")
            .await
            .unwrap();

        f.accounts.delete_user(session.user.id).await.unwrap();

        let err = f.accounts.refresh(&session.tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let claims = f
            .tokens
            .decode_verified(&session.tokens.refresh_token, TokenKind::Refresh)
            .unwrap();
        assert!(f.tokens.is_revoked(&claims.token_id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_user_drops_cache() {
        let f = fixture().await;
        let user = f.accounts.register(registration("alice")).await.unwrap();
        f.resolver.effective_permissions(user.id).await.unwrap();

        f.accounts.delete_user(user.id).await.unwrap();
        assert!(!f.store.exists(&format!("rbac:{}", user.id)).await.unwrap());
        assert_eq!(
            f.accounts.delete_user(user.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
