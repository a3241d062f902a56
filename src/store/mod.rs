//! Storage interface consumed by the authorization pipeline
//!
//! The gates only read: principal by id, subscriptions by principal, resource
//! owner by id and resource count by owner. The remaining methods, and the
//! [`AccountStore`] and [`PlanStore`] traits, serve the collaborator handlers
//! (registration, login, profile, admin listing, plan catalogue, resource CRUD).
//!
//! Two implementations exist: MongoDB ([`crate::db::MongoStore`]) and an
//! in-memory store ([`memory::MemoryStore`]) used in dev mode and tests.

pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::auth::Role;
use crate::types::Result;

pub use memory::{MemoryResourceStore, MemoryStore};

/// Account record as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
}

/// Billing state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
    #[default]
    Pending,
    Canceled,
    Expired,
}

/// Subscription plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    /// Display name, also the key into the quota table (e.g. "Básico")
    pub name: String,
    /// Monthly price in cents
    #[serde(default)]
    pub price_cents: i64,
    /// Capability strings granted by the plan
    #[serde(default)]
    pub features: BTreeSet<String>,
}

/// Subscription joined with its plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub id: String,
    pub principal_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// ACTIVE and either open-ended or ending strictly after `now`.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date.map_or(true, |end| end > now)
    }
}

/// A client, process, document or appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub id: String,
    pub owner_id: String,
    /// Entity fields, opaque to the gateway
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields an account may change on its own profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Admin listing filter. `page` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalQuery {
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub page: u64,
    pub limit: u64,
}

impl PrincipalQuery {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// One page of accounts, ordered by email
#[derive(Debug, Clone, Default)]
pub struct PrincipalPage {
    pub total: u64,
    pub principals: Vec<PrincipalRecord>,
}

/// Account lookups
#[async_trait::async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn principal_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>>;

    async fn principal_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>>;

    /// Flip the active flag. Returns false if the account does not exist.
    async fn set_active(&self, id: &str, active: bool) -> Result<bool>;
}

/// Subscription lookups
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions of a principal, in any status, joined with their plan
    async fn subscriptions_for(&self, principal_id: &str) -> Result<Vec<SubscriptionRecord>>;
}

/// Account writes and listings
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `Conflict` if the email is already registered
    async fn create_principal(&self, record: PrincipalRecord) -> Result<()>;

    /// Apply the present fields. Returns None if the account does not exist.
    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<PrincipalRecord>>;

    /// Returns false if the account does not exist
    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool>;

    async fn list_principals(&self, query: &PrincipalQuery) -> Result<PrincipalPage>;
}

/// Plan catalogue and subscription creation
#[async_trait::async_trait]
pub trait PlanStore: Send + Sync {
    /// Every plan, cheapest first
    async fn plans(&self) -> Result<Vec<Plan>>;

    async fn plan_by_id(&self, id: &str) -> Result<Option<Plan>>;

    async fn plan_by_name(&self, name: &str) -> Result<Option<Plan>>;

    async fn create_subscription(&self, record: SubscriptionRecord) -> Result<()>;
}

/// Storage for one resource class
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Owner of a resource, or None if it does not exist
    async fn owner_of(&self, id: &str) -> Result<Option<String>>;

    async fn count_owned_by(&self, owner_id: &str) -> Result<u64>;

    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<ResourceRecord>>;

    async fn get(&self, id: &str) -> Result<Option<ResourceRecord>>;

    async fn insert(&self, record: ResourceRecord) -> Result<()>;

    /// Replace the attributes of a resource. Returns None if it does not exist.
    async fn update(
        &self,
        id: &str,
        attributes: serde_json::Value,
    ) -> Result<Option<ResourceRecord>>;

    /// Returns false if the resource did not exist
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(
        status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> SubscriptionRecord {
        SubscriptionRecord {
            id: "s1".into(),
            principal_id: "u1".into(),
            plan: Plan {
                id: "p1".into(),
                name: "Básico".into(),
                price_cents: 9_900,
                features: BTreeSet::new(),
            },
            status,
            end_date,
            created_at: Utc::now() - Duration::days(30),
        }
    }

    #[test]
    fn test_active_without_end_date_is_current() {
        let now = Utc::now();
        assert!(subscription(SubscriptionStatus::Active, None).is_current(now));
    }

    #[test]
    fn test_active_ending_yesterday_is_not_current() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, Some(now - Duration::days(1)));
        assert!(!sub.is_current(now));
    }

    #[test]
    fn test_active_ending_tomorrow_is_current() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, Some(now + Duration::days(1)));
        assert!(sub.is_current(now));
    }

    #[test]
    fn test_end_date_equal_to_now_is_not_current() {
        let now = Utc::now();
        let sub = subscription(SubscriptionStatus::Active, Some(now));
        assert!(!sub.is_current(now));
    }

    #[test]
    fn test_principal_query_skip() {
        let query = |page, limit| PrincipalQuery {
            search: None,
            page,
            limit,
        };
        assert_eq!(query(1, 10).skip(), 0);
        assert_eq!(query(3, 10).skip(), 20);
        assert_eq!(query(0, 10).skip(), 0);
        assert_eq!(query(u64::MAX, u64::MAX).skip(), u64::MAX);
    }

    #[test]
    fn test_non_active_statuses_never_current() {
        let now = Utc::now();
        for status in [
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Pending,
            SubscriptionStatus::Expired,
        ] {
            for end in [None, Some(now + Duration::days(1)), Some(now - Duration::days(1))] {
                assert!(!subscription(status, end).is_current(now));
            }
        }
    }
}
