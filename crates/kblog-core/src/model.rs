//! Entities the access-control core reads from the credential store.

use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type RoleId = u64;
pub type PermissionId = u64;

/// An `(HTTP method, path pattern)` capability.
///
/// Pattern segments starting with `:` are placeholders; see [`crate::rbac::PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub code: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub description: String,
    /// Granted automatically at registration.
    #[serde(default)]
    pub is_default: bool,
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_ids: Vec<RoleId>,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub code: String,
    pub method: String,
    pub path: String,
    pub description: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub code: String,
    pub description: String,
    pub is_default: bool,
    pub permission_ids: Vec<PermissionId>,
}
