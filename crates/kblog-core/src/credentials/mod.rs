//! The authoritative credential store: users, roles, permissions and their relations.
//!
//! The relational backend is an external collaborator; the core only needs
//! the lookups and relation rewrites in [`CredentialStore`]. Each rewrite is
//! one transaction on the backend, and [`RolePermissionsUpdate::member_ids`]
//! is read inside that same transaction so callers can invalidate caches
//! after the commit.

pub mod memory;

use async_trait::async_trait;

use crate::model::{NewUser, Permission, PermissionId, Role, RoleId, User, UserId};

pub use memory::MemoryCredentialStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// The referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A unique column collided. Carries the column name.
    #[error("{0} already exists")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Outcome of replacing a role's permission set.
#[derive(Debug, Clone)]
pub struct RolePermissionsUpdate {
    pub role: Role,
    /// Users holding the role at commit time.
    pub member_ids: Vec<UserId>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: UserId) -> CredentialResult<User>;

    async fn find_user_by_username(&self, username: &str) -> CredentialResult<User>;

    async fn find_user_by_email(&self, email: &str) -> CredentialResult<User>;

    async fn find_role_by_id(&self, id: RoleId) -> CredentialResult<Role>;

    /// The role flagged `is_default`, granted at registration.
    async fn default_role(&self) -> CredentialResult<Role>;

    /// Ids of every permission flagged `is_default`.
    async fn default_permission_ids(&self) -> CredentialResult<Vec<PermissionId>>;

    /// Distinct permissions across all of the user's roles, ordered by id.
    async fn permissions_for_user(&self, id: UserId) -> CredentialResult<Vec<Permission>>;

    /// Inserts a user holding `role_ids`. Fails with `Conflict("username" | "email")`.
    async fn create_user(&self, new_user: NewUser, role_ids: &[RoleId]) -> CredentialResult<User>;

    async fn replace_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> CredentialResult<User>;

    /// Replaces the role's permission set. Every id must exist.
    async fn replace_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> CredentialResult<RolePermissionsUpdate>;

    async fn delete_user(&self, id: UserId) -> CredentialResult<()>;
}
