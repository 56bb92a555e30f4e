//! Session-related types.

use serde::{Deserialize, Serialize};

use wellspring_core::{Email, UserId, UserRole};

use crate::db::users::User;

/// Session-stored user identity.
///
/// The role is copied in at login; role changes take effect at the user's
/// next login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
