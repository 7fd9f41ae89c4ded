// src/models/group.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Role of a user inside one study group.
///
/// Variants are declared from least to most privileged so that the derived
/// ordering doubles as the permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Manager,
    Admin,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Member => "member",
            GroupRole::Manager => "manager",
            GroupRole::Admin => "admin",
        }
    }

    /// True if this role grants at least the permissions of `required`.
    pub fn satisfies(self, required: GroupRole) -> bool {
        self >= required
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown group role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for GroupRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(GroupRole::Member),
            "manager" => Ok(GroupRole::Manager),
            "admin" => Ok(GroupRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for GroupRole {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'study_groups' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A member row joined with the member's username.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub user_id: i64,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: GroupRole,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// The caller's membership, resolved by the group-role middleware and
/// handed to handlers through request extensions.
#[derive(Debug, Clone, Copy)]
pub struct Membership {
    pub group_id: i64,
    pub user_id: i64,
    pub role: GroupRole,
}

/// DTO for creating a study group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// DTO for adding a user to a group.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: i64,
    #[serde(default = "default_role")]
    pub role: GroupRole,
}

fn default_role() -> GroupRole {
    GroupRole::Member
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_every_role() {
        assert!(GroupRole::Admin.satisfies(GroupRole::Admin));
        assert!(GroupRole::Admin.satisfies(GroupRole::Manager));
        assert!(GroupRole::Admin.satisfies(GroupRole::Member));
    }

    #[test]
    fn member_does_not_satisfy_admin() {
        assert!(!GroupRole::Member.satisfies(GroupRole::Admin));
        assert!(!GroupRole::Manager.satisfies(GroupRole::Admin));
        assert!(GroupRole::Manager.satisfies(GroupRole::Member));
    }

    #[test]
    fn parse_roundtrip_and_unknown() {
        for role in [GroupRole::Member, GroupRole::Manager, GroupRole::Admin] {
            assert_eq!(role.as_str().parse::<GroupRole>().unwrap(), role);
        }
        assert!("owner".parse::<GroupRole>().is_err());
    }
}
