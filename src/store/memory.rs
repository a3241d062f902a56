//! In-memory store (for tests and dev mode without MongoDB)

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{
    AccountStore, Plan, PlanStore, PrincipalPage, PrincipalQuery, PrincipalRecord,
    PrincipalStore, ProfileUpdate, ResourceRecord, ResourceStore, SubscriptionRecord,
    SubscriptionStore,
};
use crate::types::{BailiffError, Result};

/// Accounts, plans and subscriptions held in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    principals: Arc<RwLock<HashMap<String, PrincipalRecord>>>,
    plans: Arc<RwLock<Vec<Plan>>>,
    subscriptions: Arc<RwLock<Vec<SubscriptionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_principal(&self, record: PrincipalRecord) {
        self.principals
            .write()
            .await
            .insert(record.id.clone(), record);
    }

    pub async fn insert_subscription(&self, record: SubscriptionRecord) {
        self.subscriptions.write().await.push(record);
    }

    pub async fn insert_plan(&self, plan: Plan) {
        self.plans.write().await.push(plan);
    }
}

fn matches_search(record: &PrincipalRecord, needle: &str) -> bool {
    record.name.to_lowercase().contains(needle) || record.email.to_lowercase().contains(needle)
}

#[async_trait::async_trait]
impl PrincipalStore for MemoryStore {
    async fn principal_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self.principals.read().await.get(id).cloned())
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        match self.principals.write().await.get_mut(id) {
            Some(principal) => {
                principal.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
    async fn subscriptions_for(&self, principal_id: &str) -> Result<Vec<SubscriptionRecord>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.principal_id == principal_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStore {
    async fn create_principal(&self, record: PrincipalRecord) -> Result<()> {
        let mut principals = self.principals.write().await;
        if principals
            .values()
            .any(|p| p.email.eq_ignore_ascii_case(&record.email))
        {
            return Err(BailiffError::Conflict("Email already registered".into()));
        }
        principals.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<PrincipalRecord>> {
        let mut principals = self.principals.write().await;
        if let Some(email) = &update.email {
            if principals
                .values()
                .any(|p| p.id != id && p.email.eq_ignore_ascii_case(email))
            {
                return Err(BailiffError::Conflict("Email already registered".into()));
            }
        }

        Ok(principals.get_mut(id).map(|principal| {
            if let Some(name) = update.name {
                principal.name = name;
            }
            if let Some(email) = update.email {
                principal.email = email.to_lowercase();
            }
            principal.clone()
        }))
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        match self.principals.write().await.get_mut(id) {
            Some(principal) => {
                principal.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_principals(&self, query: &PrincipalQuery) -> Result<PrincipalPage> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut matching: Vec<PrincipalRecord> = self
            .principals
            .read()
            .await
            .values()
            .filter(|p| needle.as_deref().map_or(true, |n| matches_search(p, n)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.email.cmp(&b.email));

        let total = matching.len() as u64;
        let principals = matching
            .into_iter()
            .skip(usize::try_from(query.skip()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(PrincipalPage { total, principals })
    }
}

#[async_trait::async_trait]
impl PlanStore for MemoryStore {
    async fn plans(&self) -> Result<Vec<Plan>> {
        let mut plans = self.plans.read().await.clone();
        plans.sort_by_key(|p| p.price_cents);
        Ok(plans)
    }

    async fn plan_by_id(&self, id: &str) -> Result<Option<Plan>> {
        Ok(self.plans.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn plan_by_name(&self, name: &str) -> Result<Option<Plan>> {
        Ok(self
            .plans
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn create_subscription(&self, record: SubscriptionRecord) -> Result<()> {
        self.insert_subscription(record).await;
        Ok(())
    }
}

/// Resources of one class held in memory
#[derive(Clone, Default)]
pub struct MemoryResourceStore {
    records: Arc<RwLock<HashMap<String, ResourceRecord>>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn owner_of(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .read()
            .await
            .get(id)
            .map(|r| r.owner_id.clone()))
    }

    async fn count_owned_by(&self, owner_id: &str) -> Result<u64> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .count() as u64)
    }

    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<ResourceRecord>> {
        let mut owned: Vec<ResourceRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn get(&self, id: &str) -> Result<Option<ResourceRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn insert(&self, record: ResourceRecord) -> Result<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        attributes: serde_json::Value,
    ) -> Result<Option<ResourceRecord>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(id).map(|record| {
            record.attributes = attributes;
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}
