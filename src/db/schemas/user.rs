//! Account document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::store::PrincipalRecord;

pub const USER_COLLECTION: &str = "users";

/// Account stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Stable account id (UUID), used as the token subject
    pub user_id: String,

    /// Login email, stored lowercase
    pub email: String,

    #[serde(default)]
    pub name: String,

    /// Argon2 password hash
    pub password_hash: String,

    #[serde(default)]
    pub role: Role,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    pub fn new(email: &str, name: &str, password_hash: String, role: Role) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id: uuid::Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            name: name.to_string(),
            password_hash,
            role,
            is_active: true,
        }
    }
}

impl From<UserDoc> for PrincipalRecord {
    fn from(doc: UserDoc) -> Self {
        Self {
            id: doc.user_id,
            email: doc.email,
            name: doc.name,
            password_hash: doc.password_hash,
            role: doc.role,
            active: doc.is_active,
        }
    }
}

impl From<PrincipalRecord> for UserDoc {
    fn from(record: PrincipalRecord) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id: record.id,
            email: record.email.to_lowercase(),
            name: record.name,
            password_hash: record.password_hash,
            role: record.role,
            is_active: record.active,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
