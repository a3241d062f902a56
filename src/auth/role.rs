//! Account roles and the role gate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::{AuthError, Principal};

/// Role held by an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular subscriber (a lawyer or firm account)
    #[default]
    Standard,
    /// Platform operator; bypasses ownership, entitlement and quota checks
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Standard => write!(f, "STANDARD"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(Role::Standard),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Require the principal to hold exactly `required`.
pub fn require_role(principal: &Principal, required: Role) -> Result<(), AuthError> {
    if principal.role == required {
        Ok(())
    } else {
        Err(AuthError::Forbidden(format!("{required} role required")))
    }
}
