use serde::{Deserialize, Serialize};

use super::enums::UserRole;

/// The signed-in user as reported by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_role: UserRole,
}
