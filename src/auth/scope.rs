//! Role-based listing scope.
//!
//! Every listing endpoint applies the same policy through this one type
//! instead of repeating role branches: super_admin sees everything, other
//! roles are limited to their company (and branch where they have one), and
//! plain users additionally see only tickets they created.

use crate::auth::middleware::AuthUser;

pub mod roles {
    pub const SUPER_ADMIN: &str = "super_admin";
    pub const ADMIN: &str = "admin";
    pub const HELPDESK: &str = "helpdesk";
    pub const TECHNICIAN: &str = "technician";
    pub const USER: &str = "user";
}

#[derive(Debug, Clone)]
pub struct AccessScope {
    role: String,
    user_id: i64,
    company_id: String,
    branch_id: String,
}

impl AccessScope {
    pub fn new(role: &str, user_id: i64, company_id: &str, branch_id: &str) -> Self {
        Self {
            role: role.to_string(),
            user_id,
            company_id: company_id.to_string(),
            branch_id: branch_id.to_string(),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == roles::SUPER_ADMIN
    }

    /// Company restriction, None when unrestricted.
    pub fn company_filter(&self) -> Option<&str> {
        if self.is_super_admin() {
            None
        } else {
            Some(&self.company_id)
        }
    }

    /// Branch restriction, applied on top of the company restriction for
    /// users pinned to a branch.
    pub fn branch_filter(&self) -> Option<&str> {
        if self.is_super_admin() || self.branch_id.is_empty() {
            None
        } else {
            Some(&self.branch_id)
        }
    }

    /// Creator restriction: plain users only see their own tickets.
    pub fn creator_filter(&self) -> Option<i64> {
        if self.role == roles::USER {
            Some(self.user_id)
        } else {
            None
        }
    }
}

impl From<&AuthUser> for AccessScope {
    fn from(user: &AuthUser) -> Self {
        Self::new(&user.role, user.id, &user.company_id, &user.branch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_is_unrestricted() {
        let scope = AccessScope::new(roles::SUPER_ADMIN, 1, "C001", "B001");
        assert_eq!(scope.company_filter(), None);
        assert_eq!(scope.branch_filter(), None);
        assert_eq!(scope.creator_filter(), None);
    }

    #[test]
    fn admin_is_company_and_branch_scoped() {
        let scope = AccessScope::new(roles::ADMIN, 2, "C001", "B002");
        assert_eq!(scope.company_filter(), Some("C001"));
        assert_eq!(scope.branch_filter(), Some("B002"));
        assert_eq!(scope.creator_filter(), None);
    }

    #[test]
    fn plain_user_also_gets_creator_filter() {
        let scope = AccessScope::new(roles::USER, 3, "C001", "B001");
        assert_eq!(scope.company_filter(), Some("C001"));
        assert_eq!(scope.creator_filter(), Some(3));
    }

    #[test]
    fn empty_branch_means_company_wide() {
        let scope = AccessScope::new(roles::HELPDESK, 4, "C002", "");
        assert_eq!(scope.company_filter(), Some("C002"));
        assert_eq!(scope.branch_filter(), None);
    }
}
