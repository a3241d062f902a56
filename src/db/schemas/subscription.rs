//! Subscription document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::store::{Plan, SubscriptionRecord, SubscriptionStatus};

pub const SUBSCRIPTION_COLLECTION: &str = "subscriptions";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SubscriptionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub subscription_id: String,

    /// Account that holds the subscription
    pub user_id: String,

    pub plan_id: String,

    #[serde(default)]
    pub status: SubscriptionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime>,

    /// Open-ended when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,
}

impl SubscriptionDoc {
    /// Join with its plan
    pub fn into_record(self, plan: Plan) -> SubscriptionRecord {
        SubscriptionRecord {
            created_at: self.metadata.created(),
            id: self.subscription_id,
            principal_id: self.user_id,
            plan,
            status: self.status,
            end_date: self.end_date.map(DateTime::to_chrono),
        }
    }
}

impl From<&SubscriptionRecord> for SubscriptionDoc {
    fn from(record: &SubscriptionRecord) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subscription_id: record.id.clone(),
            user_id: record.principal_id.clone(),
            plan_id: record.plan.id.clone(),
            status: record.status,
            start_date: Some(DateTime::from_chrono(record.created_at)),
            end_date: record.end_date.map(DateTime::from_chrono),
        }
    }
}

impl IntoIndexes for SubscriptionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "subscription_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("subscription_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SubscriptionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_into_record_keeps_dates() {
        let end = DateTime::from_millis(1_800_000_000_000);
        let doc = SubscriptionDoc {
            subscription_id: "s1".into(),
            user_id: "u1".into(),
            plan_id: "p1".into(),
            status: SubscriptionStatus::Active,
            end_date: Some(end),
            ..Default::default()
        };
        let record = doc.into_record(Plan {
            id: "p1".into(),
            name: "Premium".into(),
            price_cents: 29_900,
            features: BTreeSet::new(),
        });
        assert_eq!(record.principal_id, "u1");
        assert_eq!(record.end_date.map(|d| d.timestamp_millis()), Some(1_800_000_000_000));
        assert_eq!(record.created_at.timestamp(), 0);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let raw = bson::to_document(&SubscriptionDoc {
            status: SubscriptionStatus::Canceled,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(raw.get_str("status").unwrap(), "CANCELED");
    }
}
