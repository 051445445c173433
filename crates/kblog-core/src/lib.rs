//! kblog core library: authentication and access control for the blog backend.
//!
//! `kblog-core` holds every access-control decision and is independent of the
//! HTTP layer. `kblog-web` wires it into axum middleware and handlers.
//!
//! # Modules
//!
//! - [`token`]: access/refresh JWT pairs, validation, rotation and revocation.
//! - [`rbac`]: route pattern matching and the cached per-user permission resolver.
//! - [`login_guard`]: failed-login counting and temporary lockout.
//! - [`rate_limit`]: fixed-window request limits per route and client.
//! - [`account`]: registration, login, logout and role/permission administration.
//! - [`store`]: the ephemeral key/value store trait, timeouts and an in-memory backend.
//! - [`credentials`]: the credential store trait and an in-memory backend.
//! - [`password`]: argon2 hashing.
//! - [`clock`]: injectable time source.
//! - [`config`]: TOML-backed tunables.
//! - [`error`]: unified error type ([`AuthError`]) and result alias ([`AuthResult`]).

pub mod account;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod login_guard;
pub mod model;
pub mod password;
pub mod rate_limit;
pub mod rbac;
pub mod store;
pub mod token;

pub use account::{AccountService, LoginIdentifier, LoginSuccess, Registration};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, JwtConfig, LoginLimitConfig, RateLimitConfig, RbacConfig, StoreConfig};
pub use credentials::{CredentialError, CredentialStore, MemoryCredentialStore, RolePermissionsUpdate};
pub use error::{AuthError, AuthResult, ErrorKind, TokenError};
pub use login_guard::{AttemptState, LockStatus, LoginGovernor};
pub use model::{NewPermission, NewRole, NewUser, Permission, PermissionId, Role, RoleId, User, UserId};
pub use rate_limit::{ClientIdentity, RateDecision, RateLimiter, RateTier};
pub use rbac::{authorize, PathPattern, PermissionResolver};
pub use store::{EphemeralStore, KeyTtl, MemoryStore, StoreError, TimedStore};
pub use token::{Claims, TokenKind, TokenPair, TokenService};
