//! Startup data for the in-memory credential store.

use kblog_core::{CredentialStore, MemoryCredentialStore, NewPermission, NewRole, NewUser, Role};

use crate::config::AdminConfig;

pub const ADMIN_ROLE: &str = "ADMIN";
pub const USER_ROLE: &str = "USER";

/// `(code, name, method, path, is_default)`. Paths are relative to `/api`.
const CATALOGUE: &[(&str, &str, &str, &str, bool)] = &[
    ("auth:logout", "Log out", "POST", "/logout", true),
    ("me:permissions", "List own permissions", "GET", "/me/permissions", true),
    ("user:create", "Create user", "POST", "/user", false),
    ("user:roles", "Change user roles", "PUT", "/user/:id/role", false),
    ("user:delete", "Delete user", "DELETE", "/user/:id", false),
    ("role:permissions", "Change role permissions", "PUT", "/role/:id/permission", false),
];

pub struct Seeded {
    pub admin_role: Role,
    pub user_role: Role,
}

pub async fn seed(store: &MemoryCredentialStore, admin: &AdminConfig) -> anyhow::Result<Seeded> {
    let mut all = Vec::new();
    let mut defaults = Vec::new();
    for &(code, name, method, path, is_default) in CATALOGUE {
        let permission = store
            .create_permission(NewPermission {
                name: name.to_string(),
                code: code.to_string(),
                method: method.to_string(),
                path: path.to_string(),
                description: String::new(),
                is_default,
            })
            .await?;
        if permission.is_default {
            defaults.push(permission.id);
        }
        all.push(permission.id);
    }

    let admin_role = store
        .create_role(NewRole {
            name: "Administrator".to_string(),
            code: ADMIN_ROLE.to_string(),
            description: "Full access".to_string(),
            is_default: false,
            permission_ids: all,
        })
        .await?;
    let user_role = store
        .create_role(NewRole {
            name: "User".to_string(),
            code: USER_ROLE.to_string(),
            description: "Granted at registration".to_string(),
            is_default: true,
            permission_ids: defaults,
        })
        .await?;

    if admin.password_hash.is_empty() {
        tracing::info!("No admin password hash configured; skipping admin bootstrap");
    } else {
        let user = store
            .create_user(
                NewUser {
                    username: admin.username.clone(),
                    email: admin.email.clone(),
                    password_hash: admin.password_hash.clone(),
                },
                &[admin_role.id],
            )
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    }

    Ok(Seeded {
        admin_role,
        user_role,
    })
}
