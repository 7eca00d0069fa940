//! Local user accounts as seen by the SSO flow.
//!
//! A `LocalUser` is linked to its external identity through `sso_id`.

use crate::role::Role;
use fedgate_core::UserId;
use serde::{Deserialize, Serialize};

/// A local account of the host service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    id: UserId,
    username: String,
    /// Placeholder for accounts that only ever log in through SSO.
    password: String,
    permission: i32,
    base_path: String,
    role: Role,
    disabled: bool,
    sso_id: String,
}

impl std::fmt::Debug for LocalUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUser")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("permission", &self.permission)
            .field("base_path", &self.base_path)
            .field("role", &self.role)
            .field("disabled", &self.disabled)
            .field("sso_id", &self.sso_id)
            .finish()
    }
}

impl LocalUser {
    /// Creates an enabled, general-role account linked to `sso_id`.
    #[must_use]
    pub fn new(
        username: String,
        password: String,
        permission: i32,
        base_path: String,
        sso_id: String,
    ) -> Self {
        Self {
            id: UserId::new(),
            username,
            password,
            permission,
            base_path,
            role: Role::General,
            disabled: false,
            sso_id,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        username: String,
        password: String,
        permission: i32,
        base_path: String,
        role: Role,
        disabled: bool,
        sso_id: String,
    ) -> Self {
        Self {
            id,
            username,
            password,
            permission,
            base_path,
            role,
            disabled,
            sso_id,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn permission(&self) -> i32 {
        self.permission
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the external identifier this account is linked to.
    #[must_use]
    pub fn sso_id(&self) -> &str {
        &self.sso_id
    }

    /// Replaces the username, e.g. to disambiguate a collision.
    pub fn set_username(&mut self, username: String) {
        self.username = username;
    }
}
