//! In-memory [`CredentialStore`].
//!
//! All tables sit behind one `tokio::sync::RwLock`, so every rewrite holds
//! the write lock for its whole duration and behaves like a single
//! transaction: it either applies fully or not at all. State is lost on
//! restart; the web binary seeds it at startup.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialError, CredentialResult, CredentialStore, RolePermissionsUpdate};
use crate::model::{
    NewPermission, NewRole, NewUser, Permission, PermissionId, Role, RoleId, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_roles_exist(&self, role_ids: &[RoleId]) -> CredentialResult<()> {
        match role_ids.iter().find(|id| !self.roles.contains_key(id)) {
            Some(missing) => Err(CredentialError::NotFound(format!("role {missing}"))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_permission(&self, new: NewPermission) -> CredentialResult<Permission> {
        let mut t = self.tables.write().await;
        if t.permissions.values().any(|p| p.code == new.code) {
            return Err(CredentialError::Conflict("code".to_string()));
        }
        let permission = Permission {
            id: t.allocate_id(),
            name: new.name,
            code: new.code,
            method: new.method,
            path: new.path,
            description: new.description,
            is_default: new.is_default,
        };
        t.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    pub async fn create_role(&self, new: NewRole) -> CredentialResult<Role> {
        let mut t = self.tables.write().await;
        if t.roles.values().any(|r| r.name == new.name) {
            return Err(CredentialError::Conflict("name".to_string()));
        }
        if t.roles.values().any(|r| r.code == new.code) {
            return Err(CredentialError::Conflict("code".to_string()));
        }
        if let Some(missing) = new
            .permission_ids
            .iter()
            .find(|id| !t.permissions.contains_key(id))
        {
            return Err(CredentialError::NotFound(format!("permission {missing}")));
        }
        let role = Role {
            id: t.allocate_id(),
            name: new.name,
            code: new.code,
            description: new.description,
            is_default: new.is_default,
            permission_ids: new.permission_ids,
        };
        t.roles.insert(role.id, role.clone());
        Ok(role)
    }

    pub async fn all_permissions(&self) -> Vec<Permission> {
        self.tables.read().await.permissions.values().cloned().collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_id(&self, id: UserId) -> CredentialResult<User> {
        let t = self.tables.read().await;
        t.users
            .get(&id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(format!("user {id}")))
    }

    async fn find_user_by_username(&self, username: &str) -> CredentialResult<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound("user".to_string()))
    }

    async fn find_user_by_email(&self, email: &str) -> CredentialResult<User> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound("user".to_string()))
    }

    async fn find_role_by_id(&self, id: RoleId) -> CredentialResult<Role> {
        let t = self.tables.read().await;
        t.roles
            .get(&id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(format!("role {id}")))
    }

    async fn default_role(&self) -> CredentialResult<Role> {
        let t = self.tables.read().await;
        t.roles
            .values()
            .find(|r| r.is_default)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound("default role".to_string()))
    }

    async fn default_permission_ids(&self) -> CredentialResult<Vec<PermissionId>> {
        let t = self.tables.read().await;
        Ok(t.permissions
            .values()
            .filter(|p| p.is_default)
            .map(|p| p.id)
            .collect())
    }

    async fn permissions_for_user(&self, id: UserId) -> CredentialResult<Vec<Permission>> {
        let t = self.tables.read().await;
        let user = t
            .users
            .get(&id)
            .ok_or_else(|| CredentialError::NotFound(format!("user {id}")))?;

        let ids: BTreeSet<PermissionId> = user
            .role_ids
            .iter()
            .filter_map(|rid| t.roles.get(rid))
            .flat_map(|role| role.permission_ids.iter().copied())
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|pid| t.permissions.get(&pid).cloned())
            .collect())
    }

    async fn create_user(&self, new_user: NewUser, role_ids: &[RoleId]) -> CredentialResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == new_user.username) {
            return Err(CredentialError::Conflict("username".to_string()));
        }
        if t.users.values().any(|u| u.email == new_user.email) {
            return Err(CredentialError::Conflict("email".to_string()));
        }
        t.ensure_roles_exist(role_ids)?;

        let user = User {
            id: t.allocate_id(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role_ids: role_ids.to_vec(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn replace_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> CredentialResult<User> {
        let mut t = self.tables.write().await;
        t.ensure_roles_exist(role_ids)?;
        let user = t
            .users
            .get_mut(&id)
            .ok_or_else(|| CredentialError::NotFound(format!("user {id}")))?;
        user.role_ids = role_ids.to_vec();
        Ok(user.clone())
    }

    async fn replace_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> CredentialResult<RolePermissionsUpdate> {
        let mut t = self.tables.write().await;
        if let Some(missing) = permission_ids
            .iter()
            .find(|id| !t.permissions.contains_key(id))
        {
            return Err(CredentialError::NotFound(format!("permission {missing}")));
        }
        let member_ids: Vec<UserId> = t
            .users
            .values()
            .filter(|u| u.role_ids.contains(&role_id))
            .map(|u| u.id)
            .collect();
        let role = t
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| CredentialError::NotFound(format!("role {role_id}")))?;
        role.permission_ids = permission_ids.to_vec();

        Ok(RolePermissionsUpdate {
            role: role.clone(),
            member_ids,
        })
    }

    async fn delete_user(&self, id: UserId) -> CredentialResult<()> {
        let mut t = self.tables.write().await;
        t.users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CredentialError::NotFound(format!("user {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(code: &str, method: &str, path: &str) -> NewPermission {
        NewPermission {
            name: code.to_string(),
            code: code.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            description: String::new(),
            is_default: false,
        }
    }

    fn role(code: &str, permission_ids: Vec<PermissionId>) -> NewRole {
        NewRole {
            name: code.to_string(),
            code: code.to_string(),
            description: String::new(),
            is_default: false,
            permission_ids,
        }
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn permissions_for_user_is_distinct_union() {
        let store = MemoryCredentialStore::new();
        let a = store.create_permission(perm("a", "GET", "/a")).await.unwrap();
        let b = store.create_permission(perm("b", "GET", "/b")).await.unwrap();
        let c = store.create_permission(perm("c", "GET", "/c")).await.unwrap();
        let r1 = store.create_role(role("R1", vec![a.id, b.id])).await.unwrap();
        let r2 = store.create_role(role("R2", vec![b.id, c.id])).await.unwrap();
        let user = store.create_user(new_user("u"), &[r1.id, r2.id]).await.unwrap();

        let perms = store.permissions_for_user(user.id).await.unwrap();
        let ids: Vec<_> = perms.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicates_by_field() {
        let store = MemoryCredentialStore::new();
        store.create_user(new_user("bob"), &[]).await.unwrap();

        let dup_name = store.create_user(new_user("bob"), &[]).await.unwrap_err();
        assert_eq!(dup_name, CredentialError::Conflict("username".to_string()));

        let mut other = new_user("robert");
        other.email = "bob@example.com".to_string();
        let dup_email = store.create_user(other, &[]).await.unwrap_err();
        assert_eq!(dup_email, CredentialError::Conflict("email".to_string()));
    }

    #[tokio::test]
    async fn create_user_with_unknown_role_is_not_found() {
        let store = MemoryCredentialStore::new();
        let err = store.create_user(new_user("x"), &[99]).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
    }

    #[tokio::test]
    async fn replace_role_permissions_reports_members() {
        let store = MemoryCredentialStore::new();
        let a = store.create_permission(perm("a", "GET", "/a")).await.unwrap();
        let r = store.create_role(role("R", vec![])).await.unwrap();
        let other = store.create_role(role("O", vec![])).await.unwrap();
        let u1 = store.create_user(new_user("u1"), &[r.id]).await.unwrap();
        let _u2 = store.create_user(new_user("u2"), &[other.id]).await.unwrap();

        let update = store.replace_role_permissions(r.id, &[a.id]).await.unwrap();
        assert_eq!(update.role.permission_ids, vec![a.id]);
        assert_eq!(update.member_ids, vec![u1.id]);
    }

    #[tokio::test]
    async fn replace_role_permissions_is_all_or_nothing() {
        let store = MemoryCredentialStore::new();
        let a = store.create_permission(perm("a", "GET", "/a")).await.unwrap();
        let r = store.create_role(role("R", vec![a.id])).await.unwrap();

        let err = store.replace_role_permissions(r.id, &[404]).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
        assert_eq!(store.find_role_by_id(r.id).await.unwrap().permission_ids, vec![a.id]);
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let store = MemoryCredentialStore::new();
        assert!(matches!(
            store.delete_user(5).await,
            Err(CredentialError::NotFound(_))
        ));
    }
}
