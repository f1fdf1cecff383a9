//! Users, roles and the per-request authorization context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

string_enum! {
    /// Role carried in the bearer token
    pub enum Role {
        Admin => "admin",
        Manager => "manager",
        Technician => "technician",
    }
}

/// A staff member. Users are managed outside this system; the core only
/// reads them and maintains their push tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub branch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Device registration used for push notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushToken {
    pub token: String,
    pub device_type: Option<String>,
    pub platform: Option<String>,
}

/// Identity of the caller, passed explicitly into every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub branch_id: Option<Uuid>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role, branch_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            role,
            branch_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, allowed: &[Role]) -> DomainResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
            Err(DomainError::forbidden(format!(
                "Only {} can perform this action",
                names.join(" or ")
            )))
        }
    }

    /// The caller's branch, required for branch-bound operations
    pub fn require_branch(&self) -> DomainResult<Uuid> {
        self.branch_id
            .ok_or_else(|| DomainError::validation("Branch is required for this operation"))
    }

    /// Admins see every branch; everyone else only their own.
    pub fn ensure_branch(&self, branch_id: Uuid) -> DomainResult<()> {
        if self.is_admin() || self.branch_id == Some(branch_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden(
                "Not authorized to access records of another branch",
            ))
        }
    }

    /// Branch filter for list queries; `None` means unrestricted.
    pub fn branch_scope(&self) -> Option<Uuid> {
        if self.is_admin() {
            None
        } else {
            self.branch_id
        }
    }

    pub fn ensure_assigned_technician(&self, technician_id: Option<Uuid>) -> DomainResult<()> {
        if self.role == Role::Technician && technician_id == Some(self.user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden(
                "Only the assigned technician can perform this action",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role, branch: Option<Uuid>) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role, branch)
    }

    #[test]
    fn test_admin_bypasses_branch_scope() {
        let admin = ctx(Role::Admin, None);
        assert!(admin.ensure_branch(Uuid::new_v4()).is_ok());
        assert_eq!(admin.branch_scope(), None);
    }

    #[test]
    fn test_manager_is_branch_scoped() {
        let branch = Uuid::new_v4();
        let manager = ctx(Role::Manager, Some(branch));
        assert!(manager.ensure_branch(branch).is_ok());
        assert!(matches!(
            manager.ensure_branch(Uuid::new_v4()),
            Err(DomainError::Authorization(_))
        ));
    }

    #[test]
    fn test_require_role_message() {
        let technician = ctx(Role::Technician, None);
        let err = technician
            .require_role(&[Role::Admin, Role::Manager])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only admin or manager can perform this action"
        );
    }

    #[test]
    fn test_assigned_technician_check() {
        let technician = ctx(Role::Technician, None);
        assert!(technician
            .ensure_assigned_technician(Some(technician.user_id))
            .is_ok());
        assert!(technician
            .ensure_assigned_technician(Some(Uuid::new_v4()))
            .is_err());
        assert!(technician.ensure_assigned_technician(None).is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("owner".parse::<Role>().is_err());
    }
}
