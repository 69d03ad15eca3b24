//! Project role names.
//!
//! Roles are stored as plain strings in the `userroles` table; these
//! constants are the only recognized values.

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_MEMBER: &str = "member";

/// All project roles, in decreasing order of privilege.
pub const PROJECT_ROLES: &[&str] = &[ROLE_OWNER, ROLE_MANAGER, ROLE_MEMBER];

/// Check whether `role` names a known project role.
pub fn is_valid_role(role: &str) -> bool {
    PROJECT_ROLES.contains(&role)
}
