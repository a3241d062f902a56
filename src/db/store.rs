//! MongoDB-backed implementations of the store traits

use async_trait::async_trait;
use bson::doc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::auth::{ResourceClass, ResourceRegistry};
use crate::db::schemas::{
    PlanDoc, ResourceDoc, SubscriptionDoc, UserDoc, PLAN_COLLECTION, SUBSCRIPTION_COLLECTION,
    USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::store::{
    AccountStore, Plan, PlanStore, PrincipalPage, PrincipalQuery, PrincipalRecord,
    PrincipalStore, ProfileUpdate, ResourceRecord, ResourceStore, SubscriptionRecord,
    SubscriptionStore,
};
use crate::types::{BailiffError, Result};

/// Accounts, plans and subscriptions
#[derive(Clone)]
pub struct MongoStore {
    users: MongoCollection<UserDoc>,
    plans: MongoCollection<PlanDoc>,
    subscriptions: MongoCollection<SubscriptionDoc>,
}

impl MongoStore {
    pub async fn open(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            users: client.collection(USER_COLLECTION).await?,
            plans: client.collection(PLAN_COLLECTION).await?,
            subscriptions: client.collection(SUBSCRIPTION_COLLECTION).await?,
        })
    }

    pub async fn insert_user(&self, user: UserDoc) -> Result<()> {
        self.users.insert_one(user).await
    }
}

#[async_trait]
impl PrincipalStore for MongoStore {
    async fn principal_by_id(&self, id: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self
            .users
            .find_one(doc! { "user_id": id })
            .await?
            .map(PrincipalRecord::from))
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self
            .users
            .find_one(doc! { "email": email.to_lowercase() })
            .await?
            .map(PrincipalRecord::from))
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        let result = self
            .users
            .set_fields(doc! { "user_id": id }, doc! { "is_active": active })
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl SubscriptionStore for MongoStore {
    async fn subscriptions_for(&self, principal_id: &str) -> Result<Vec<SubscriptionRecord>> {
        let subscriptions = self
            .subscriptions
            .find_many(doc! { "user_id": principal_id }, None)
            .await?;
        if subscriptions.is_empty() {
            return Ok(Vec::new());
        }

        let plan_ids: Vec<&str> = subscriptions.iter().map(|s| s.plan_id.as_str()).collect();
        let plans: HashMap<String, Plan> = self
            .plans
            .find_many(doc! { "plan_id": { "$in": plan_ids } }, None)
            .await?
            .into_iter()
            .map(|p| (p.plan_id.clone(), Plan::from(p)))
            .collect();

        Ok(subscriptions
            .into_iter()
            .filter_map(|sub| match plans.get(&sub.plan_id) {
                Some(plan) => Some(sub.into_record(plan.clone())),
                None => {
                    warn!(
                        subscription_id = %sub.subscription_id,
                        plan_id = %sub.plan_id,
                        "Subscription references a missing plan, ignoring"
                    );
                    None
                }
            })
            .collect())
    }
}

/// Escape regex metacharacters so a search term matches literally
fn literal_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl AccountStore for MongoStore {
    async fn create_principal(&self, record: PrincipalRecord) -> Result<()> {
        if self.principal_by_email(&record.email).await?.is_some() {
            return Err(BailiffError::Conflict("Email already registered".into()));
        }
        self.users.insert_one(UserDoc::from(record)).await
    }

    async fn update_profile(
        &self,
        id: &str,
        update: ProfileUpdate,
    ) -> Result<Option<PrincipalRecord>> {
        let mut fields = bson::Document::new();
        if let Some(name) = update.name {
            fields.insert("name", name);
        }
        if let Some(email) = update.email {
            let email = email.to_lowercase();
            if let Some(existing) = self.principal_by_email(&email).await? {
                if existing.id != id {
                    return Err(BailiffError::Conflict("Email already registered".into()));
                }
            }
            fields.insert("email", email);
        }

        if !fields.is_empty() {
            let result = self.users.set_fields(doc! { "user_id": id }, fields).await?;
            if result.matched_count == 0 {
                return Ok(None);
            }
        }
        self.principal_by_id(id).await
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        let result = self
            .users
            .set_fields(doc! { "user_id": id }, doc! { "password_hash": password_hash })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn list_principals(&self, query: &PrincipalQuery) -> Result<PrincipalPage> {
        let filter = match query.search.as_deref() {
            Some(term) => {
                let pattern = literal_pattern(term);
                doc! {
                    "$or": [
                        { "name": { "$regex": pattern.as_str(), "$options": "i" } },
                        { "email": { "$regex": pattern.as_str(), "$options": "i" } },
                    ]
                }
            }
            None => doc! {},
        };

        let total = self.users.count(filter.clone()).await?;
        let principals = self
            .users
            .find_page(filter, doc! { "email": 1 }, query.skip(), query.limit)
            .await?
            .into_iter()
            .map(PrincipalRecord::from)
            .collect();
        Ok(PrincipalPage { total, principals })
    }
}

#[async_trait]
impl PlanStore for MongoStore {
    async fn plans(&self) -> Result<Vec<Plan>> {
        Ok(self
            .plans
            .find_many(doc! {}, Some(doc! { "price_cents": 1 }))
            .await?
            .into_iter()
            .map(Plan::from)
            .collect())
    }

    async fn plan_by_id(&self, id: &str) -> Result<Option<Plan>> {
        Ok(self
            .plans
            .find_one(doc! { "plan_id": id })
            .await?
            .map(Plan::from))
    }

    async fn plan_by_name(&self, name: &str) -> Result<Option<Plan>> {
        Ok(self
            .plans
            .find_one(doc! { "name": name })
            .await?
            .map(Plan::from))
    }

    async fn create_subscription(&self, record: SubscriptionRecord) -> Result<()> {
        self.subscriptions
            .insert_one(SubscriptionDoc::from(&record))
            .await
    }
}

/// One resource collection
#[derive(Clone)]
pub struct MongoResourceStore {
    collection: MongoCollection<ResourceDoc>,
}

impl MongoResourceStore {
    pub async fn open(client: &MongoClient, class: ResourceClass) -> Result<Self> {
        Ok(Self {
            collection: client.collection(class.plural()).await?,
        })
    }

    /// Open every resource collection and register it
    pub async fn registry(client: &MongoClient) -> Result<ResourceRegistry> {
        let mut registry = ResourceRegistry::new();
        for class in ResourceClass::ALL {
            let store = Self::open(client, class).await?;
            registry = registry.register(class, Arc::new(store));
        }
        Ok(registry)
    }
}

#[async_trait]
impl ResourceStore for MongoResourceStore {
    async fn owner_of(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .collection
            .find_one(doc! { "resource_id": id })
            .await?
            .map(|doc| doc.owner_id))
    }

    async fn count_owned_by(&self, owner_id: &str) -> Result<u64> {
        self.collection.count(doc! { "owner_id": owner_id }).await
    }

    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<ResourceRecord>> {
        Ok(self
            .collection
            .find_many(
                doc! { "owner_id": owner_id },
                Some(doc! { "metadata.created_at": 1, "resource_id": 1 }),
            )
            .await?
            .into_iter()
            .map(ResourceRecord::from)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<ResourceRecord>> {
        Ok(self
            .collection
            .find_one(doc! { "resource_id": id })
            .await?
            .map(ResourceRecord::from))
    }

    async fn insert(&self, record: ResourceRecord) -> Result<()> {
        self.collection.insert_one(ResourceDoc::from(record)).await
    }

    async fn update(
        &self,
        id: &str,
        attributes: serde_json::Value,
    ) -> Result<Option<ResourceRecord>> {
        let attributes = bson::to_bson(&attributes)?;
        let result = self
            .collection
            .set_fields(doc! { "resource_id": id }, doc! { "attributes": attributes })
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self
            .collection
            .soft_delete(doc! { "resource_id": id })
            .await?;
        Ok(result.modified_count > 0)
    }
}
