//! Current-user seam supplied by the authentication layer.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

/// Identity of the caller as resolved by the host.
///
/// `user_id` is matched against `Employee::user_id`.
pub trait UserContext {
    fn user_id(&self) -> &str;
    fn has_role(&self, role: Role) -> bool;
}

/// Plain [`UserContext`] for hosts without their own identity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user_id: String,
    roles: BTreeSet<Role>,
}

impl CurrentUser {
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().collect(),
        }
    }
}

impl UserContext for CurrentUser {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
