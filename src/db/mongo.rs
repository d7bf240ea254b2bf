//! MongoDB client and collection wrapper
//!
//! Pattern adapted from holo-host/rust/util_libs/db/src/mongodb

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::db::store::{Query, Record, Store};
use crate::types::QuireError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Unique single-field index
pub fn unique_index(field: &str) -> (Document, Option<IndexOptions>) {
    (
        doc! { field: 1 },
        Some(
            IndexOptions::builder()
                .unique(true)
                .name(format!("{}_unique", field))
                .build(),
        ),
    )
}

/// Plain lookup index
pub fn lookup_index(field: &str) -> (Document, Option<IndexOptions>) {
    (
        doc! { field: 1 },
        Some(
            IndexOptions::builder()
                .name(format!("{}_index", field))
                .build(),
        ),
    )
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, QuireError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| QuireError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| QuireError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get the typed collection for a record, creating its indexes
    pub async fn collection<T: Record>(&self) -> Result<MongoCollection<T>, QuireError> {
        MongoCollection::new(&self.client, &self.db_name, T::COLLECTION).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T: Record> MongoCollection<T> {
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, QuireError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), QuireError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| QuireError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    fn key_filter(key: &T::Key) -> Document {
        let key_field = T::KEY_FIELD;
        let value: Bson = key.clone().into();
        doc! { key_field: value }
    }

    /// Find many documents by filter, ordered by key
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, QuireError> {
        use futures_util::StreamExt;

        let key_field = T::KEY_FIELD;
        let cursor = self
            .inner
            .find(filter)
            .sort(doc! { key_field: 1 })
            .await
            .map_err(|e| QuireError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading {} document: {}", T::COLLECTION, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Map a write error, turning unique-index violations into conflicts
fn write_error<T: Record>(op: &str, err: mongodb::error::Error) -> QuireError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    };

    if duplicate {
        QuireError::conflict(format!("Duplicate value in {}", T::COLLECTION))
    } else {
        QuireError::Database(format!("{} on {} failed: {}", op, T::COLLECTION, err))
    }
}

#[async_trait]
impl<T: Record> Store<T> for MongoCollection<T> {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn get(&self, key: &T::Key) -> Result<Option<T>, QuireError> {
        self.inner
            .find_one(Self::key_filter(key))
            .await
            .map_err(|e| QuireError::Database(format!("Find failed: {}", e)))
    }

    async fn find(&self, query: &Query) -> Result<Vec<T>, QuireError> {
        self.find_many(query.to_document()?).await
    }

    async fn insert(&self, mut record: T) -> Result<T, QuireError> {
        record.set_version(0);
        record.mut_metadata().mark_created();

        self.inner
            .insert_one(&record)
            .await
            .map_err(|e| write_error::<T>("Insert", e))?;

        Ok(record)
    }

    async fn replace(&self, mut record: T) -> Result<Option<T>, QuireError> {
        let expected = record.version();
        let mut filter = Self::key_filter(&record.key());
        filter.insert("version", expected);

        record.set_version(expected + 1);
        record.mut_metadata().touch();

        let result = self
            .inner
            .replace_one(filter, &record)
            .await
            .map_err(|e| write_error::<T>("Replace", e))?;

        Ok((result.matched_count == 1).then_some(record))
    }

    async fn delete(&self, key: &T::Key) -> Result<Option<T>, QuireError> {
        self.inner
            .find_one_and_delete(Self::key_filter(key))
            .await
            .map_err(|e| write_error::<T>("Delete", e))
    }

    async fn delete_if_version(&self, key: &T::Key, version: i64) -> Result<bool, QuireError> {
        let mut filter = Self::key_filter(key);
        filter.insert("version", version);

        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| write_error::<T>("Delete", e))?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_where(&self, query: &Query) -> Result<u64, QuireError> {
        let result = self
            .inner
            .delete_many(query.to_document()?)
            .await
            .map_err(|e| write_error::<T>("Delete", e))?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Behaviour against a live server is covered by running the service;
    // the memory store shares the same contract tests.

    #[test]
    fn test_index_helpers() {
        let (keys, opts) = unique_index("mail");
        assert_eq!(keys.get_i32("mail").unwrap(), 1);
        let opts = opts.unwrap();
        assert_eq!(opts.unique, Some(true));
        assert_eq!(opts.name.as_deref(), Some("mail_unique"));

        let (_, opts) = lookup_index("group_id");
        assert_eq!(opts.unwrap().unique, None);
    }
}
