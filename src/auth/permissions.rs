//! Roles and permission levels
//!
//! A user's role decides which workflow steps they may drive. Checks are made
//! against the account behind the session token, never against client input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse permission levels, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// No session
    #[default]
    Public = 0,
    /// Students
    Authenticated = 1,
    /// Faculty and research/teaching assistants
    Staff = 2,
    /// Thesis office administrators
    Admin = 3,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "PUBLIC"),
            PermissionLevel::Authenticated => write!(f, "AUTHENTICATED"),
            PermissionLevel::Staff => write!(f, "STAFF"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Faculty,
    /// Research assistant
    Ra,
    /// Teaching assistant
    Ta,
    Admin,
}

impl Role {
    pub fn level(self) -> PermissionLevel {
        match self {
            Role::Student => PermissionLevel::Authenticated,
            Role::Faculty | Role::Ra | Role::Ta => PermissionLevel::Staff,
            Role::Admin => PermissionLevel::Admin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Faculty => "Faculty",
            Role::Ra => "Ra",
            Role::Ta => "Ta",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.level() >= PermissionLevel::Staff
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Whether the caller is `user_id` or an administrator
    pub fn is_self_or_admin(&self, user_id: &str) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_ordering() {
        assert!(PermissionLevel::Public < PermissionLevel::Authenticated);
        assert!(PermissionLevel::Authenticated < PermissionLevel::Staff);
        assert!(PermissionLevel::Staff < PermissionLevel::Admin);
    }

    #[test]
    fn test_role_levels() {
        assert_eq!(Role::Student.level(), PermissionLevel::Authenticated);
        assert_eq!(Role::Ta.level(), PermissionLevel::Staff);
        assert_eq!(Role::Faculty.level(), PermissionLevel::Staff);
        assert_eq!(Role::Admin.level(), PermissionLevel::Admin);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Faculty).unwrap(), "\"Faculty\"");
        let role: Role = serde_json::from_str("\"Ra\"").unwrap();
        assert_eq!(role, Role::Ra);
    }

    #[test]
    fn test_actor_checks() {
        let admin = Actor::new("a1", Role::Admin);
        let student = Actor::new("s1", Role::Student);
        let ta = Actor::new("t1", Role::Ta);

        assert!(admin.is_staff());
        assert!(ta.is_staff());
        assert!(!student.is_staff());
        assert!(student.is_self_or_admin("s1"));
        assert!(!student.is_self_or_admin("s2"));
        assert!(admin.is_self_or_admin("s2"));
    }
}
