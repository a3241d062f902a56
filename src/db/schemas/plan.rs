//! Subscription plan schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::store::Plan;

pub const PLAN_COLLECTION: &str = "plans";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlanDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub plan_id: String,

    /// Display name; also the quota table key
    pub name: String,

    /// Monthly price in cents
    #[serde(default)]
    pub price_cents: i64,

    #[serde(default)]
    pub features: Vec<String>,
}

impl From<PlanDoc> for Plan {
    fn from(doc: PlanDoc) -> Self {
        Self {
            id: doc.plan_id,
            name: doc.name,
            price_cents: doc.price_cents,
            features: doc.features.into_iter().collect(),
        }
    }
}

impl IntoIndexes for PlanDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "plan_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("plan_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PlanDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
