//! Local account roles.
//!
//! Roles are stored as small integers by the host service. SSO only ever
//! creates `General` accounts; the others exist so stored values round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Role {
    /// Ordinary, non-privileged account.
    #[default]
    General,
    /// Anonymous visitor account.
    Guest,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns the stored numeric value.
    #[must_use]
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::General => 0,
            Self::Guest => 1,
            Self::Admin => 2,
        }
    }

    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Error returned for a stored role value outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownRole(pub i32);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role value {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::General),
            1 => Ok(Self::Guest),
            2 => Ok(Self::Admin),
            other => Err(UnknownRole(other)),
        }
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_are_stable() {
        assert_eq!(Role::General.as_i32(), 0);
        assert_eq!(Role::Guest.as_i32(), 1);
        assert_eq!(Role::Admin.as_i32(), 2);
    }

    #[test]
    fn default_is_general() {
        assert_eq!(Role::default(), Role::General);
        assert!(!Role::default().is_admin());
    }

    #[test]
    fn rejects_unknown_values() {
        assert_eq!(Role::try_from(7), Err(UnknownRole(7)));
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&Role::Admin).expect("serialize");
        assert_eq!(json, "2");

        let parsed: Role = serde_json::from_str("1").expect("deserialize");
        assert_eq!(parsed, Role::Guest);
        assert!(serde_json::from_str::<Role>("9").is_err());
    }
}
