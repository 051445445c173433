use std::sync::Arc;

use kblog_core::{
    AccountService, Clock, CredentialStore, EphemeralStore, LoginGovernor, PermissionResolver,
    RateLimiter, TimedStore, TokenService,
};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub tokens: Arc<TokenService>,
    pub permissions: Arc<PermissionResolver>,
    pub rate_limiter: Arc<RateLimiter>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// Wires the core services around one ephemeral store and one credential store.
    /// Every ephemeral store call is bounded by the configured timeout.
    pub fn build(
        config: ServerConfig,
        store: Arc<dyn EphemeralStore>,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let auth = &config.auth;
        let store: Arc<dyn EphemeralStore> = Arc::new(TimedStore::new(store, auth.store.timeout()));

        let tokens = Arc::new(TokenService::new(&auth.jwt, store.clone(), clock)?);
        let permissions = Arc::new(PermissionResolver::new(
            &auth.rbac,
            store.clone(),
            credentials.clone(),
        ));
        let governor = Arc::new(LoginGovernor::new(&auth.login, store.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(&auth.rate_limit, store));
        let accounts = Arc::new(AccountService::new(
            credentials,
            tokens.clone(),
            permissions.clone(),
            governor,
        ));

        Ok(Self {
            config: Arc::new(config),
            tokens,
            permissions,
            rate_limiter,
            accounts,
        })
    }
}
