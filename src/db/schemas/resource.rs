//! Owned resource schema, shared by the clients, processes, documents and
//! appointments collections

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::store::ResourceRecord;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResourceDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub resource_id: String,

    /// Account that created the resource
    pub owner_id: String,

    /// Entity fields as sent by the client
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl From<ResourceRecord> for ResourceDoc {
    fn from(record: ResourceRecord) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            resource_id: record.id,
            owner_id: record.owner_id,
            attributes: record.attributes,
        }
    }
}

impl From<ResourceDoc> for ResourceRecord {
    fn from(doc: ResourceDoc) -> Self {
        Self {
            created_at: doc.metadata.created(),
            updated_at: doc.metadata.updated(),
            id: doc.resource_id,
            owner_id: doc.owner_id,
            attributes: doc.attributes,
        }
    }
}

impl IntoIndexes for ResourceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "resource_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("resource_id_unique".to_string())
                        .build(),
                ),
            ),
            // count and list by owner
            (
                doc! { "owner_id": 1, "metadata.created_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_created_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ResourceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
