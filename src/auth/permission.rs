//! Static role → permission matrix.
//!
//! Actions follow the `<domain>:<verb>` schema. The table is process
//! constant; there is no per-user grant storage.

use crate::models::{ROLE_ADMIN, ROLE_GUEST, ROLE_USER};

pub const PERM_USER_CREATE: &str = "user:create";
pub const PERM_USER_READ: &str = "user:read";
pub const PERM_USER_UPDATE: &str = "user:update";
pub const PERM_USER_DELETE: &str = "user:delete";
pub const PERM_USER_LIST: &str = "user:list";

pub const PERM_APIKEY_CREATE: &str = "apikey:create";
pub const PERM_APIKEY_READ: &str = "apikey:read";
pub const PERM_APIKEY_UPDATE: &str = "apikey:update";
pub const PERM_APIKEY_DELETE: &str = "apikey:delete";
pub const PERM_APIKEY_LIST: &str = "apikey:list";

pub const PERM_SERVICE_READ: &str = "service:read";
pub const PERM_SERVICE_LIST: &str = "service:list";
pub const PERM_SERVICE_USE: &str = "service:use";

pub const PERM_QUOTA_READ: &str = "quota:read";
pub const PERM_QUOTA_LIST: &str = "quota:list";

pub const PERM_CONFIG_READ: &str = "config:read";
pub const PERM_CONFIG_UPDATE: &str = "config:update";

pub const PERM_ACCESSLOG_READ: &str = "accesslog:read";
pub const PERM_ACCESSLOG_LIST: &str = "accesslog:list";

pub const PERM_SYSTEM_ADMIN: &str = "system:admin";

const ADMIN_PERMISSIONS: &[&str] = &[
    PERM_USER_CREATE,
    PERM_USER_READ,
    PERM_USER_UPDATE,
    PERM_USER_DELETE,
    PERM_USER_LIST,
    PERM_APIKEY_CREATE,
    PERM_APIKEY_READ,
    PERM_APIKEY_UPDATE,
    PERM_APIKEY_DELETE,
    PERM_APIKEY_LIST,
    PERM_SERVICE_READ,
    PERM_SERVICE_LIST,
    PERM_SERVICE_USE,
    PERM_QUOTA_READ,
    PERM_QUOTA_LIST,
    PERM_CONFIG_READ,
    PERM_CONFIG_UPDATE,
    PERM_ACCESSLOG_READ,
    PERM_ACCESSLOG_LIST,
    PERM_SYSTEM_ADMIN,
];

const USER_PERMISSIONS: &[&str] = &[
    PERM_USER_READ,
    PERM_USER_UPDATE,
    PERM_APIKEY_CREATE,
    PERM_APIKEY_READ,
    PERM_APIKEY_UPDATE,
    PERM_APIKEY_DELETE,
    PERM_APIKEY_LIST,
    PERM_SERVICE_READ,
    PERM_SERVICE_LIST,
    PERM_SERVICE_USE,
    PERM_QUOTA_READ,
    PERM_QUOTA_LIST,
    PERM_ACCESSLOG_READ,
    PERM_ACCESSLOG_LIST,
];

const GUEST_PERMISSIONS: &[&str] = &[PERM_SERVICE_READ, PERM_SERVICE_LIST];

pub fn permissions_for(role: &str) -> &'static [&'static str] {
    match role {
        ROLE_ADMIN => ADMIN_PERMISSIONS,
        ROLE_USER => USER_PERMISSIONS,
        ROLE_GUEST => GUEST_PERMISSIONS,
        _ => &[],
    }
}

pub fn can(role: &str, action: &str) -> bool {
    permissions_for(role).contains(&action)
}

pub fn can_any(role: &str, actions: &[&str]) -> bool {
    actions.iter().any(|action| can(role, action))
}

pub fn can_all(role: &str, actions: &[&str]) -> bool {
    actions.iter().all(|action| can(role, action))
}

/// Resource-ownership check: admins reach everything, everyone else
/// only resources they own, and only with the matching permission.
pub fn can_access_resource(role: &str, acting_id: i64, owning_id: i64, action: &str) -> bool {
    if role == ROLE_ADMIN {
        return true;
    }
    acting_id == owning_id && can(role, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_is_a_superset() {
        for perm in USER_PERMISSIONS.iter().chain(GUEST_PERMISSIONS) {
            assert!(can(ROLE_ADMIN, perm), "admin missing {perm}");
        }
        assert!(can(ROLE_ADMIN, PERM_SYSTEM_ADMIN));
    }

    #[test]
    fn user_cannot_manage_users() {
        assert!(!can(ROLE_USER, PERM_USER_CREATE));
        assert!(!can(ROLE_USER, PERM_USER_DELETE));
        assert!(can(ROLE_USER, PERM_SERVICE_USE));
    }

    #[test]
    fn guest_is_read_only() {
        assert!(can(ROLE_GUEST, PERM_SERVICE_LIST));
        assert!(!can(ROLE_GUEST, PERM_SERVICE_USE));
        assert!(!can_any(ROLE_GUEST, &[PERM_APIKEY_CREATE, PERM_USER_LIST]));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for("superuser").is_empty());
        assert!(!can("superuser", PERM_SERVICE_READ));
    }

    #[test]
    fn resource_ownership() {
        assert!(can_access_resource(ROLE_ADMIN, 2, 9, PERM_APIKEY_DELETE));
        assert!(can_access_resource(ROLE_USER, 5, 5, PERM_APIKEY_DELETE));
        assert!(!can_access_resource(ROLE_USER, 5, 9, PERM_APIKEY_DELETE));
        assert!(!can_access_resource(ROLE_GUEST, 5, 5, PERM_APIKEY_DELETE));
    }

    #[test]
    fn can_all_requires_every_action() {
        assert!(can_all(ROLE_USER, &[PERM_APIKEY_CREATE, PERM_SERVICE_USE]));
        assert!(!can_all(ROLE_USER, &[PERM_APIKEY_CREATE, PERM_USER_DELETE]));
    }
}
