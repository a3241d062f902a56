//! Authorization failures and their HTTP rejection bodies
//!
//! Every gate in the pipeline fails with an [`AuthError`]. The boundary turns it
//! into a status code plus a [`Rejection`] body. The body field names are a
//! contract with the web client, which branches on `requiresUpgrade` and
//! `requiresSubscription` to decide between an upgrade prompt and a plain error.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::ResourceClass;
use crate::types::BailiffError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Terminal outcome of a rejected gate
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Authorization header missing or not `Bearer <token>`
    #[error("Authentication token missing or malformed")]
    MalformedHeader,

    #[error("Token expired")]
    Expired,

    /// Signature, algorithm, payload or token kind rejected
    #[error("Invalid token")]
    Invalid,

    #[error("Account not found or inactive")]
    PrincipalNotFound,

    #[error("Account not found or inactive")]
    PrincipalInactive,

    /// Role or ownership check failed
    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource id not provided")]
    MissingResourceId,

    /// A route names a resource class with no registered lookup. This is a wiring defect.
    #[error("No lookup registered for resource class '{0}'")]
    UnknownResourceClass(ResourceClass),

    #[error("An active subscription is required to access this resource")]
    SubscriptionRequired,

    /// Current plan lacks a capability the route needs
    #[error("Your current plan does not include '{0}'")]
    FeatureNotIncluded(String),

    #[error("{class} limit reached for your current plan")]
    QuotaExceeded {
        class: ResourceClass,
        current_count: u64,
        limit: u64,
    },

    /// Backing store failed; never reported as a credential problem
    #[error("Storage failure: {0}")]
    Storage(#[from] BailiffError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedHeader
            | Self::Expired
            | Self::Invalid
            | Self::PrincipalNotFound
            | Self::PrincipalInactive => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_)
            | Self::SubscriptionRequired
            | Self::FeatureNotIncluded(_)
            | Self::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            Self::MissingResourceId => StatusCode::BAD_REQUEST,
            Self::UnknownResourceClass(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this failure points at a server-side problem rather than the caller.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::UnknownResourceClass(_) | Self::Storage(_))
    }

    /// Build the JSON body sent to the caller.
    pub fn to_rejection(&self) -> Rejection {
        match self {
            Self::UnknownResourceClass(_) | Self::Storage(_) => Rejection::new(INTERNAL_MESSAGE),
            Self::SubscriptionRequired => Rejection {
                requires_subscription: Some(true),
                ..Rejection::new(self.to_string())
            },
            Self::FeatureNotIncluded(_) => Rejection {
                requires_upgrade: Some(true),
                ..Rejection::new(self.to_string())
            },
            Self::QuotaExceeded {
                current_count,
                limit,
                ..
            } => Rejection {
                requires_upgrade: Some(true),
                current_count: Some(*current_count),
                limit: Some(*limit),
                ..Rejection::new(self.to_string())
            },
            other => Rejection::new(other.to_string()),
        }
    }
}

/// JSON error body:
/// `{error: true, message, [requiresUpgrade], [requiresSubscription], [currentCount, limit]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_upgrade: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_subscription: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            requires_upgrade: None,
            requires_subscription: None,
            current_count: None,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(AuthError::MalformedHeader.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Invalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::PrincipalNotFound.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::PrincipalInactive.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::UnknownResourceClass(ResourceClass::Appointment).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::SubscriptionRequired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Storage(BailiffError::Database("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_quota_rejection_body() {
        let err = AuthError::QuotaExceeded {
            class: ResourceClass::Client,
            current_count: 10,
            limit: 10,
        };
        let body = serde_json::to_value(err.to_rejection()).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["requiresUpgrade"], true);
        assert_eq!(body["currentCount"], 10);
        assert_eq!(body["limit"], 10);
        assert!(body.get("requiresSubscription").is_none());
    }

    #[test]
    fn test_feature_rejection_asks_for_upgrade() {
        let err = AuthError::FeatureNotIncluded("AI_ANALYSIS".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let body = serde_json::to_value(err.to_rejection()).unwrap();
        assert_eq!(body["requiresUpgrade"], true);
        assert!(body["message"].as_str().unwrap().contains("AI_ANALYSIS"));
        assert!(body.get("currentCount").is_none());
    }

    #[test]
    fn test_subscription_rejection_body() {
        let body = serde_json::to_value(AuthError::SubscriptionRequired.to_rejection()).unwrap();
        assert_eq!(body["requiresSubscription"], true);
        assert!(body.get("requiresUpgrade").is_none());
        assert!(body.get("currentCount").is_none());
    }

    #[test]
    fn test_defects_do_not_leak_detail() {
        let err = AuthError::UnknownResourceClass(ResourceClass::Document);
        assert_eq!(err.to_rejection().message, INTERNAL_MESSAGE);

        let err = AuthError::Storage(BailiffError::Database("mongo at 10.1.2.3 down".into()));
        assert_eq!(err.to_rejection().message, INTERNAL_MESSAGE);
        assert!(err.is_server_fault());
    }

    #[test]
    fn test_missing_and_inactive_are_indistinguishable() {
        assert_eq!(
            AuthError::PrincipalNotFound.to_rejection(),
            AuthError::PrincipalInactive.to_rejection()
        );
    }
}
