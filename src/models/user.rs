use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
pub const ROLE_GUEST: &str = "guest";

pub const USER_STATUS_DISABLED: i64 = 0;
pub const USER_STATUS_ACTIVE: i64 = 1;

/// Operator id 1 is the immutable system admin: it cannot be deleted
/// and its role cannot be downgraded.
pub const SYSTEM_ADMIN_ID: i64 = 1;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    pub role: String,
    pub status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn is_active(&self) -> bool {
        self.status == USER_STATUS_ACTIVE
    }

    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            status: self.status,
        }
    }
}

/// Public view of an operator, safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    ROLE_USER.to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub user_id: i64,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserInfo>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub fn is_valid_role(role: &str) -> bool {
    matches!(role, ROLE_ADMIN | ROLE_USER | ROLE_GUEST)
}
