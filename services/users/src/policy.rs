//! Route authorization gates
//!
//! Each route group carries one [`AccessPolicy`]: an optional role
//! allow-list and an optional self-access gate. Both gates must pass.

use thiserror::Error;

use crate::error::ApiError;
use crate::jwt::Principal;
use crate::models::Role;

/// Why a request was refused by a policy
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Insufficient permissions")]
    InsufficientRole,
    #[error("Access denied: You can only access your own data")]
    NotOwner,
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => ApiError::Unauthorized(denied.to_string()),
            AccessDenied::InsufficientRole | AccessDenied::NotOwner => {
                ApiError::Forbidden(denied.to_string())
            }
        }
    }
}

/// Declarative gate composed of a role allow-list and a self-access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Roles admitted by the role gate; `None` admits every role
    pub roles: Option<&'static [Role]>,
    /// Require the target user id to be the principal's own, unless the
    /// principal is a psychiatrist
    pub self_access: bool,
}

impl AccessPolicy {
    /// Any verified principal
    pub const AUTHENTICATED: Self = Self {
        roles: None,
        self_access: false,
    };

    /// The owner of the target record, or any psychiatrist
    pub const SELF_OR_PSYCHIATRIST: Self = Self {
        roles: None,
        self_access: true,
    };

    pub const PSYCHIATRIST_ONLY: Self = Self {
        roles: Some(&[Role::Psychiatrist]),
        self_access: false,
    };

    pub const ADMIN_ONLY: Self = Self {
        roles: Some(&[Role::Admin]),
        self_access: false,
    };

    /// Evaluate the policy.
    ///
    /// `target` is the user id named by the route, or `None` when the route
    /// names none or it could not be parsed. A self-access policy treats an
    /// unusable target as somebody else's.
    pub fn evaluate(
        &self,
        principal: Option<&Principal>,
        target: Option<i32>,
    ) -> Result<(), AccessDenied> {
        let principal = principal.ok_or(AccessDenied::Unauthenticated)?;

        if let Some(roles) = self.roles {
            if !roles.contains(&principal.role) {
                return Err(AccessDenied::InsufficientRole);
            }
        }

        if self.self_access
            && principal.role != Role::Psychiatrist
            && target != Some(principal.subject)
        {
            return Err(AccessDenied::NotOwner);
        }

        Ok(())
    }
}
