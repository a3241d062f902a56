//! Resource classes, their lookup registry, and the ownership gate

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{AuthError, Principal};
use crate::store::ResourceStore;

/// Kinds of owned records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Client,
    Process,
    Document,
    Appointment,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::Client,
        ResourceClass::Process,
        ResourceClass::Document,
        ResourceClass::Appointment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Client => "client",
            ResourceClass::Process => "process",
            ResourceClass::Document => "document",
            ResourceClass::Appointment => "appointment",
        }
    }

    /// Plural form used in route paths and collection names
    pub fn plural(self) -> &'static str {
        match self {
            ResourceClass::Client => "clients",
            ResourceClass::Process => "processes",
            ResourceClass::Document => "documents",
            ResourceClass::Appointment => "appointments",
        }
    }

    pub fn from_plural(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.plural() == segment)
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps each resource class to the store that can look it up.
///
/// Adding a class means registering a store; a class with nothing registered
/// fails uniformly with [`AuthError::UnknownResourceClass`].
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    stores: HashMap<ResourceClass, Arc<dyn ResourceStore>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, class: ResourceClass, store: Arc<dyn ResourceStore>) -> Self {
        self.stores.insert(class, store);
        self
    }

    pub fn lookup(&self, class: ResourceClass) -> Result<&Arc<dyn ResourceStore>, AuthError> {
        self.stores
            .get(&class)
            .ok_or(AuthError::UnknownResourceClass(class))
    }

    pub fn is_registered(&self, class: ResourceClass) -> bool {
        self.stores.contains_key(&class)
    }
}

/// How an ownership check was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The principal owns the resource
    Owner,
    /// An admin reached a resource they do not own (or that does not exist)
    AdminOverride { owner_id: Option<String> },
}

/// Confirm that `principal` may act on resource `resource_id` of `class`.
///
/// Performs exactly one lookup. A missing resource and a resource owned by
/// someone else produce the same `Forbidden`, so callers learn nothing about
/// records they cannot reach.
pub async fn require_ownership(
    registry: &ResourceRegistry,
    class: ResourceClass,
    resource_id: Option<&str>,
    principal: &Principal,
) -> Result<Access, AuthError> {
    let store = registry.lookup(class)?;
    let resource_id = resource_id
        .filter(|id| !id.is_empty())
        .ok_or(AuthError::MissingResourceId)?;

    let owner_id = store.owner_of(resource_id).await?;

    if owner_id.as_deref() == Some(principal.id.as_str()) {
        return Ok(Access::Owner);
    }

    if principal.is_admin() {
        return Ok(Access::AdminOverride { owner_id });
    }

    debug!(
        principal_id = %principal.id,
        resource_class = %class,
        resource_id,
        "Ownership check failed"
    );
    Err(AuthError::Forbidden("access to this resource denied".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::{MemoryResourceStore, ResourceRecord};
    use chrono::Utc;

    fn principal(id: &str, role: Role) -> Principal {
        Principal {
            id: id.into(),
            email: format!("{id}@example.com"),
            role,
        }
    }

    async fn registry_with_client(id: &str, owner: &str) -> ResourceRegistry {
        let clients = MemoryResourceStore::new();
        let now = Utc::now();
        clients
            .insert(ResourceRecord {
                id: id.into(),
                owner_id: owner.into(),
                attributes: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        ResourceRegistry::new().register(ResourceClass::Client, Arc::new(clients))
    }

    #[tokio::test]
    async fn test_owner_passes() {
        let registry = registry_with_client("c1", "u1").await;
        let access = require_ownership(
            &registry,
            ResourceClass::Client,
            Some("c1"),
            &principal("u1", Role::Standard),
        )
        .await
        .unwrap();
        assert_eq!(access, Access::Owner);
    }

    #[tokio::test]
    async fn test_other_standard_denied() {
        let registry = registry_with_client("c1", "u1").await;
        let err = require_ownership(
            &registry,
            ResourceClass::Client,
            Some("c1"),
            &principal("u2", Role::Standard),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_missing_and_foreign_are_indistinguishable() {
        let registry = registry_with_client("c1", "u1").await;
        let u2 = principal("u2", Role::Standard);

        let foreign = require_ownership(&registry, ResourceClass::Client, Some("c1"), &u2)
            .await
            .unwrap_err();
        let missing = require_ownership(&registry, ResourceClass::Client, Some("nope"), &u2)
            .await
            .unwrap_err();

        assert_eq!(foreign.status_code(), missing.status_code());
        assert_eq!(foreign.to_rejection(), missing.to_rejection());
    }

    #[tokio::test]
    async fn test_admin_bypasses_any_owner() {
        let registry = registry_with_client("c1", "u1").await;
        let admin = principal("a1", Role::Admin);

        let access = require_ownership(&registry, ResourceClass::Client, Some("c1"), &admin)
            .await
            .unwrap();
        assert_eq!(
            access,
            Access::AdminOverride {
                owner_id: Some("u1".into())
            }
        );

        let access = require_ownership(&registry, ResourceClass::Client, Some("nope"), &admin)
            .await
            .unwrap();
        assert_eq!(access, Access::AdminOverride { owner_id: None });
    }

    #[tokio::test]
    async fn test_unregistered_class() {
        let registry = registry_with_client("c1", "u1").await;
        let err = require_ownership(
            &registry,
            ResourceClass::Appointment,
            Some("a1"),
            &principal("u1", Role::Standard),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AuthError::UnknownResourceClass(ResourceClass::Appointment)
        ));
    }

    #[tokio::test]
    async fn test_missing_id() {
        let registry = registry_with_client("c1", "u1").await;
        let u1 = principal("u1", Role::Standard);
        for id in [None, Some("")] {
            let err = require_ownership(&registry, ResourceClass::Client, id, &u1)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::MissingResourceId));
        }
    }

    #[test]
    fn test_class_names() {
        assert_eq!(ResourceClass::from_plural("processes"), Some(ResourceClass::Process));
        assert_eq!(ResourceClass::from_plural("process"), None);
        assert_eq!(ResourceClass::Document.to_string(), "document");
    }
}
