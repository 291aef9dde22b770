use crate::errors::ServiceError;
use crate::types::{Permission, UserRole};

/// Represents the authentication context for the current operation
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The ID of the authenticated user
    pub user_id: String,

    /// Display name of the authenticated user
    pub full_name: String,

    /// The role of the authenticated user
    pub role: UserRole,
}

impl AuthContext {
    /// Create a new authentication context
    pub fn new(user_id: impl Into<String>, full_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            full_name: full_name.into(),
            role,
        }
    }

    /// Context for the given session user
    pub fn for_user(user: &crate::domains::user::types::User) -> Self {
        Self::new(user.id.clone(), user.full_name.clone(), user.role)
    }

    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Authorize a specific permission, returning an error if not allowed
    pub fn authorize(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "User does not have permission: {:?}",
                permission
            )))
        }
    }

    /// Verify user is an admin
    pub fn authorize_admin(&self) -> Result<(), ServiceError> {
        if matches!(self.role, UserRole::Admin) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "This action requires administrator privileges".to_string(),
            ))
        }
    }

    /// For operations restricted to the user's own records
    pub fn authorize_self_or_admin(&self, resource_owner_id: &str) -> Result<(), ServiceError> {
        if self.user_id == resource_owner_id || matches!(self.role, UserRole::Admin) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(
                "You do not have permission to access this resource".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_by_role() {
        let villager = AuthContext::new("v1", "Anita", UserRole::Villager);
        assert!(villager.authorize(Permission::SubmitReport).is_ok());
        assert!(villager.authorize(Permission::RespondToReport).is_err());
    }

    #[test]
    fn test_authorize_self_or_admin() {
        let villager = AuthContext::new("v1", "Anita", UserRole::Villager);
        assert!(villager.authorize_self_or_admin("v1").is_ok());
        assert!(villager.authorize_self_or_admin("v2").is_err());

        let admin = AuthContext::new("a1", "Admin", UserRole::Admin);
        assert!(admin.authorize_self_or_admin("v2").is_ok());
    }
}
