//! Authentication and authorization
//!
//! Provides:
//! - Token codec for access and refresh credentials
//! - Principal resolution against live account state
//! - Role, ownership, entitlement, feature and quota gates
//! - The pipeline that composes them per route
//! - Password hashing with Argon2

pub mod context;
pub mod entitlement;
pub mod error;
pub mod jwt;
pub mod password;
pub mod pipeline;
pub mod principal;
pub mod quota;
pub mod resource;
pub mod role;

pub use context::{AuthContext, Operation, RequestParts};
pub use entitlement::{
    require_active_subscription, require_feature, select_current, SubscriptionSnapshot,
};
pub use error::{AuthError, Rejection};
pub use jwt::{extract_bearer_token, Claims, IssuedToken, TokenCodec, TokenKind};
pub use password::{hash_password, verify_password};
pub use pipeline::{Authorizer, Guard, Policy};
pub use principal::{resolve_principal, Principal};
pub use quota::{require_within_quota, QuotaTable};
pub use resource::{require_ownership, Access, ResourceClass, ResourceRegistry};
pub use role::{require_role, Role};
