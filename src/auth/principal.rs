//! Principal resolution
//!
//! Turns decoded claims into the live account snapshot that the rest of the
//! pipeline reads. The role is always taken from storage, never from the
//! token, so a downgrade or deactivation applies on the very next request.

use serde::Serialize;
use tracing::debug;

use crate::auth::{AuthError, Claims, Role};
use crate::store::PrincipalStore;

/// Authenticated account, read-only for the remainder of the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Load the account named by `claims.sub` and check that it is still active.
pub async fn resolve_principal(
    store: &dyn PrincipalStore,
    claims: &Claims,
) -> Result<Principal, AuthError> {
    let record = store
        .principal_by_id(&claims.sub)
        .await?
        .ok_or_else(|| {
            debug!(principal_id = %claims.sub, "Token names an unknown account");
            AuthError::PrincipalNotFound
        })?;

    if !record.active {
        debug!(principal_id = %record.id, "Token names a deactivated account");
        return Err(AuthError::PrincipalInactive);
    }

    if claims.role.is_some_and(|claimed| claimed != record.role) {
        debug!(
            principal_id = %record.id,
            claimed = ?claims.role,
            current = %record.role,
            "Role changed since token was issued"
        );
    }

    Ok(Principal {
        id: record.id,
        email: record.email,
        role: record.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKind;
    use crate::store::{MemoryStore, PrincipalRecord};

    fn claims(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.into(),
            role: Some(role),
            kind: TokenKind::Access,
            iat: 0,
            exp: i64::MAX,
        }
    }

    async fn store_with(id: &str, role: Role, active: bool) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_principal(PrincipalRecord {
                id: id.into(),
                email: format!("{id}@example.com"),
                name: id.into(),
                password_hash: String::new(),
                role,
                active,
            })
            .await;
        store
    }

    #[tokio::test]
    async fn test_resolves_active_account() {
        let store = store_with("u1", Role::Standard, true).await;
        let principal = resolve_principal(&store, &claims("u1", Role::Standard))
            .await
            .unwrap();
        assert_eq!(principal.id, "u1");
        assert_eq!(principal.email, "u1@example.com");
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = MemoryStore::new();
        let err = resolve_principal(&store, &claims("ghost", Role::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PrincipalNotFound));
    }

    #[tokio::test]
    async fn test_inactive_account() {
        let store = store_with("u1", Role::Standard, false).await;
        let err = resolve_principal(&store, &claims("u1", Role::Standard))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PrincipalInactive));
    }

    #[tokio::test]
    async fn test_live_role_wins_over_token_role() {
        // Token says ADMIN but the account has since been downgraded
        let store = store_with("u1", Role::Standard, true).await;
        let principal = resolve_principal(&store, &claims("u1", Role::Admin))
            .await
            .unwrap();
        assert_eq!(principal.role, Role::Standard);
    }
}
