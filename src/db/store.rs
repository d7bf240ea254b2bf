//! Storage seam shared by the MongoDB and in-memory backends
//!
//! Services only talk to [`Store`]. Writes that depend on a prior read go
//! through [`mutate`], which re-reads and retries when another writer got
//! there first.

use async_trait::async_trait;
use bson::{Bson, Document};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Display};
use tracing::debug;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::types::{QuireError, Result};

/// Attempts made by [`mutate`] before reporting a conflict
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// A document type with a natural key and an optimistic-concurrency version
pub trait Record:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + Unpin + IntoIndexes + MutMetadata + 'static
{
    type Key: Clone + Ord + Debug + Display + Send + Sync + Into<Bson> + 'static;

    /// Collection (MongoDB) or table (memory) name
    const COLLECTION: &'static str;

    /// Serialized name of the key field
    const KEY_FIELD: &'static str;

    /// Fields whose values may not repeat across records.
    /// Array fields are checked element by element, like a unique multikey index.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn key(&self) -> Self::Key;

    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq { field: String, value: Value },
    AnyOf { field: String, values: Vec<Value> },
}

/// Conjunction of field conditions.
///
/// Follows MongoDB semantics: an equality on an array field matches when
/// any element is equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
}

impl Query {
    /// Matches every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn any_of<V, I>(mut self, field: &str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.conditions.push(Condition::AnyOf {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Render as a MongoDB filter document
    pub fn to_document(&self) -> Result<Document> {
        let mut filter = Document::new();
        for condition in &self.conditions {
            match condition {
                Condition::Eq { field, value } => {
                    filter.insert(field.clone(), bson::to_bson(value)?);
                }
                Condition::AnyOf { field, values } => {
                    let values = values
                        .iter()
                        .map(bson::to_bson)
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    filter.insert(field.clone(), bson::doc! { "$in": values });
                }
            }
        }
        Ok(filter)
    }

    /// Evaluate against a serialized record
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq { field, value } => value_matches(lookup(record, field), value),
            Condition::AnyOf { field, values } => {
                let found = lookup(record, field);
                values.iter().any(|v| value_matches(found, v))
            }
        })
    }
}

/// Resolve a dotted path such as `updated_by.faculty_id`
pub(crate) fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, segment| value.get(segment))
}

fn value_matches(found: Option<&Value>, expected: &Value) -> bool {
    match found {
        Some(Value::Array(items)) => items.contains(expected) || found == Some(expected),
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

/// Typed persistence operations for one record type
#[async_trait]
pub trait Store<T: Record>: Send + Sync {
    /// Backend name for health output
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &T::Key) -> Result<Option<T>>;

    /// Matching records, ordered by key
    async fn find(&self, query: &Query) -> Result<Vec<T>>;

    async fn find_one(&self, query: &Query) -> Result<Option<T>> {
        Ok(self.find(query).await?.into_iter().next())
    }

    /// Insert a new record at version 0.
    /// Fails with `Conflict` when the key or a unique field is taken.
    async fn insert(&self, record: T) -> Result<T>;

    /// Compare-and-swap on `version`.
    ///
    /// Returns `None` when the stored version differs from the record's (or the
    /// record is gone); otherwise stores it with the version bumped.
    async fn replace(&self, record: T) -> Result<Option<T>>;

    async fn delete(&self, key: &T::Key) -> Result<Option<T>>;

    /// Compare-and-delete on `version`.
    ///
    /// Returns `false` when the record is gone or was written since it was read.
    async fn delete_if_version(&self, key: &T::Key, version: i64) -> Result<bool>;

    async fn delete_where(&self, query: &Query) -> Result<u64>;
}

/// Read-modify-write with retry on stale versions.
///
/// `apply` may run more than once and must only touch the record it is given.
/// `what` names the record in the not-found message.
pub async fn mutate<T, R, F>(store: &dyn Store<T>, key: &T::Key, what: &str, mut apply: F) -> Result<(T, R)>
where
    T: Record,
    R: Send,
    F: FnMut(&mut T) -> Result<R> + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut record = store
            .get(key)
            .await?
            .ok_or_else(|| QuireError::not_found(format!("{} not found", what)))?;

        let outcome = apply(&mut record)?;

        if let Some(saved) = store.replace(record).await? {
            return Ok((saved, outcome));
        }

        debug!(
            "Stale write on {} {} (attempt {}/{})",
            T::COLLECTION,
            key,
            attempt,
            MAX_WRITE_ATTEMPTS
        );
    }

    Err(QuireError::conflict(format!(
        "{} was modified concurrently, retry the request",
        what
    )))
}

/// Delete a record whose current state passes `check`, retrying on stale versions.
///
/// `check` sees the freshest copy on every attempt, so a guard such as "not
/// registered" cannot be bypassed by a write landing between read and delete.
pub async fn remove_checked<T, F>(store: &dyn Store<T>, key: &T::Key, what: &str, mut check: F) -> Result<T>
where
    T: Record,
    F: FnMut(&T) -> Result<()> + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let record = store
            .get(key)
            .await?
            .ok_or_else(|| QuireError::not_found(format!("{} not found", what)))?;

        check(&record)?;

        if store.delete_if_version(key, record.version()).await? {
            return Ok(record);
        }

        debug!(
            "Stale delete on {} {} (attempt {}/{})",
            T::COLLECTION,
            key,
            attempt,
            MAX_WRITE_ATTEMPTS
        );
    }

    Err(QuireError::conflict(format!(
        "{} was modified concurrently, retry the request",
        what
    )))
}

/// Next integer key: highest existing key plus one, or 1 for an empty collection
pub async fn next_id<T>(store: &dyn Store<T>) -> Result<i64>
where
    T: Record<Key = i64>,
{
    let existing = store.find(&Query::all()).await?;
    Ok(existing.iter().map(|r| r.key()).max().map_or(1, |max| max + 1))
}

/// Insert under a fresh `max + 1` key, retrying when a concurrent insert took it
pub async fn insert_with_next_id<T, F>(store: &dyn Store<T>, mut build: F) -> Result<T>
where
    T: Record<Key = i64>,
    F: FnMut(i64) -> T + Send,
{
    let mut last_err = None;
    for _ in 0..MAX_WRITE_ATTEMPTS {
        let id = next_id(store).await?;
        match store.insert(build(id)).await {
            Ok(saved) => return Ok(saved),
            Err(QuireError::Conflict(msg)) => {
                // Only a lost race on the key is worth retrying
                if store.get(&id).await?.is_none() {
                    return Err(QuireError::Conflict(msg));
                }
                debug!("{} id {} taken concurrently, retrying", T::COLLECTION, id);
                last_err = Some(QuireError::Conflict(msg));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| QuireError::conflict("Could not allocate an id")))
}
