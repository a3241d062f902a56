//! MongoDB client and typed collection wrapper
//!
//! Every collection soft-deletes: reads skip documents whose
//! `metadata.is_deleted` is set.

use bson::{doc, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    options::{FindOptions, IndexOptions},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::schemas::Metadata;
use crate::types::{BailiffError, Result};

/// Schemas that declare their own indexes
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Schemas that carry a [`Metadata`] block
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Connected database handle
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping. Fails fast (3s) when the server is unreachable.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        let separator = if uri.contains('?') { '&' } else { '?' };
        let uri = format!("{uri}{separator}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000");

        let client = Client::with_uri_str(&uri)
            .await
            .map_err(|e| BailiffError::Database(format!("Failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BailiffError::Database(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Open a typed collection, creating its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let collection = MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        };
        collection.apply_indexes().await?;
        Ok(collection)
    }
}

/// Typed collection with soft-delete aware reads
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Send + Sync,
{
    inner: Collection<T>,
}

fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    async fn apply_indexes(&self) -> Result<()> {
        let indexes: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        if indexes.is_empty() {
            return Ok(());
        }

        self.inner
            .create_indexes(indexes)
            .await
            .map_err(|e| BailiffError::Database(format!("Failed to create indexes: {e}")))?;

        debug!(collection = %self.inner.name(), "Indexes applied");
        Ok(())
    }

    /// Insert, stamping creation and update times
    pub async fn insert_one(&self, mut item: T) -> Result<()> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        self.inner
            .insert_one(item)
            .await
            .map_err(|e| BailiffError::Database(format!("Insert failed: {e}")))?;
        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| BailiffError::Database(format!("Find failed: {e}")))
    }

    /// Find all live documents, optionally sorted
    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> Result<Vec<T>> {
        let options = FindOptions::builder().sort(sort).build();

        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| BailiffError::Database(format!("Find failed: {e}")))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| BailiffError::Database(format!("Cursor read failed: {e}")))
    }

    /// One page of live documents
    pub async fn find_page(
        &self,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<T>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self
            .inner
            .find(live(filter))
            .with_options(options)
            .await
            .map_err(|e| BailiffError::Database(format!("Find failed: {e}")))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| BailiffError::Database(format!("Cursor read failed: {e}")))
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| BailiffError::Database(format!("Count failed: {e}")))
    }

    /// Apply a `$set`, bumping `metadata.updated_at`
    pub async fn set_fields(&self, filter: Document, mut fields: Document) -> Result<UpdateResult> {
        fields.insert("metadata.updated_at", DateTime::now());

        self.inner
            .update_one(live(filter), doc! { "$set": fields })
            .await
            .map_err(|e| BailiffError::Database(format!("Update failed: {e}")))
    }

    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult> {
        let now = DateTime::now();
        self.inner
            .update_one(
                live(filter),
                doc! {
                    "$set": {
                        "metadata.is_deleted": true,
                        "metadata.deleted_at": now,
                        "metadata.updated_at": now,
                    }
                },
            )
            .await
            .map_err(|e| BailiffError::Database(format!("Delete failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_filter_excludes_deleted() {
        let filter = live(doc! { "owner_id": "u1" });
        assert_eq!(filter.get_str("owner_id").unwrap(), "u1");
        assert_eq!(
            filter.get_document("metadata.is_deleted").unwrap(),
            &doc! { "$ne": true }
        );
    }
}
