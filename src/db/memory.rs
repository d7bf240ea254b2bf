//! In-memory store
//!
//! Used by the test suite and as the dev-mode fallback when MongoDB is not
//! reachable. Mirrors the MongoDB backend: unique fields behave like unique
//! (multikey) indexes and `replace` is a compare-and-swap on `version`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::db::store::{lookup, Query, Record, Store};
use crate::types::{QuireError, Result};

/// Records of one type kept in key order
pub struct MemoryStore<T: Record> {
    records: RwLock<BTreeMap<T::Key, T>>,
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

/// Values a unique field contributes: each element of an array, or the scalar itself
fn unique_values(record: &Value, field: &str) -> Vec<Value> {
    match lookup(record, field) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => vec![value.clone()],
    }
}

fn check_unique<T: Record>(records: &BTreeMap<T::Key, T>, candidate: &T) -> Result<()> {
    if T::UNIQUE_FIELDS.is_empty() {
        return Ok(());
    }

    let candidate_key = candidate.key();
    let candidate_json = serde_json::to_value(candidate)
        .map_err(|e| QuireError::Internal(format!("Failed to encode record: {}", e)))?;

    for (key, other) in records {
        if *key == candidate_key {
            continue;
        }
        let other_json = serde_json::to_value(other)
            .map_err(|e| QuireError::Internal(format!("Failed to encode record: {}", e)))?;

        for field in T::UNIQUE_FIELDS {
            let taken = unique_values(&other_json, field);
            if unique_values(&candidate_json, field)
                .iter()
                .any(|v| taken.contains(v))
            {
                return Err(QuireError::conflict(format!(
                    "Duplicate {} in {}",
                    field,
                    T::COLLECTION
                )));
            }
        }
    }

    Ok(())
}

#[async_trait]
impl<T: Record> Store<T> for MemoryStore<T> {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &T::Key) -> Result<Option<T>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn find(&self, query: &Query) -> Result<Vec<T>> {
        let records = self.records.read().await;
        let mut matched = Vec::new();
        for record in records.values() {
            let json = serde_json::to_value(record)
                .map_err(|e| QuireError::Internal(format!("Failed to encode record: {}", e)))?;
            if query.matches(&json) {
                matched.push(record.clone());
            }
        }
        Ok(matched)
    }

    async fn insert(&self, mut record: T) -> Result<T> {
        let mut records = self.records.write().await;
        let key = record.key();

        if records.contains_key(&key) {
            return Err(QuireError::conflict(format!(
                "Duplicate {} in {}",
                T::KEY_FIELD,
                T::COLLECTION
            )));
        }
        check_unique(&records, &record)?;

        record.set_version(0);
        record.mut_metadata().mark_created();
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn replace(&self, mut record: T) -> Result<Option<T>> {
        let mut records = self.records.write().await;
        let key = record.key();

        match records.get(&key) {
            Some(stored) if stored.version() == record.version() => {}
            _ => return Ok(None),
        }
        check_unique(&records, &record)?;

        record.set_version(record.version() + 1);
        record.mut_metadata().touch();
        records.insert(key, record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, key: &T::Key) -> Result<Option<T>> {
        Ok(self.records.write().await.remove(key))
    }

    async fn delete_if_version(&self, key: &T::Key, version: i64) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get(key) {
            Some(stored) if stored.version() == version => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_where(&self, query: &Query) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        let mut encode_error = None;

        records.retain(|_, record| match serde_json::to_value(&*record) {
            Ok(json) => !query.matches(&json),
            Err(e) => {
                encode_error = Some(e);
                true
            }
        });

        if let Some(e) = encode_error {
            return Err(QuireError::Internal(format!("Failed to encode record: {}", e)));
        }
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::GroupDoc;
    use crate::db::store::{insert_with_next_id, mutate, remove_checked, MAX_WRITE_ATTEMPTS};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store whose next `races` reads are overtaken by another writer
    struct Racing {
        inner: MemoryStore<GroupDoc>,
        races: AtomicUsize,
        interfere: fn(&mut GroupDoc),
    }

    impl Racing {
        fn new(races: usize, interfere: fn(&mut GroupDoc)) -> Self {
            Self {
                inner: MemoryStore::new(),
                races: AtomicUsize::new(races),
                interfere,
            }
        }
    }

    #[async_trait]
    impl Store<GroupDoc> for Racing {
        fn backend(&self) -> &'static str {
            "racing"
        }

        async fn get(&self, key: &i64) -> Result<Option<GroupDoc>> {
            let snapshot = self.inner.get(key).await?;
            let raced = self
                .races
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if let (true, Some(record)) = (raced, &snapshot) {
                let mut other = record.clone();
                (self.interfere)(&mut other);
                self.inner.replace(other).await?;
            }
            Ok(snapshot)
        }

        async fn find(&self, query: &Query) -> Result<Vec<GroupDoc>> {
            self.inner.find(query).await
        }

        async fn insert(&self, record: GroupDoc) -> Result<GroupDoc> {
            self.inner.insert(record).await
        }

        async fn replace(&self, record: GroupDoc) -> Result<Option<GroupDoc>> {
            self.inner.replace(record).await
        }

        async fn delete(&self, key: &i64) -> Result<Option<GroupDoc>> {
            self.inner.delete(key).await
        }

        async fn delete_if_version(&self, key: &i64, version: i64) -> Result<bool> {
            self.inner.delete_if_version(key, version).await
        }

        async fn delete_where(&self, query: &Query) -> Result<u64> {
            self.inner.delete_where(query).await
        }
    }

    fn add_x(group: &mut GroupDoc) {
        group.members.push("x".into());
    }

    fn register(group: &mut GroupDoc) {
        group.registered = true;
    }

    fn group(id: i64, members: &[&str]) -> GroupDoc {
        GroupDoc::new(id, members.iter().map(|m| m.to_string()).collect())
    }

    #[tokio::test]
    async fn test_insert_and_duplicate_key() {
        let store = MemoryStore::<GroupDoc>::new();
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        let err = store.insert(group(1, &["d", "e", "f"])).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_unique_array_elements() {
        let store = MemoryStore::<GroupDoc>::new();
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        // "c" is already a member of group 1
        let err = store.insert(group(2, &["c", "d", "e"])).await.unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));

        store.insert(group(2, &["d", "e", "f"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_is_compare_and_swap() {
        let store = MemoryStore::<GroupDoc>::new();
        let saved = store.insert(group(1, &["a", "b", "c"])).await.unwrap();
        assert_eq!(saved.version, 0);

        let mut first = saved.clone();
        first.members.push("d".into());
        let stored = store.replace(first).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        // Second writer still holds version 0
        let mut second = saved;
        second.members.push("e".into());
        assert!(store.replace(second).await.unwrap().is_none());

        let current = store.get(&1).await.unwrap().unwrap();
        assert_eq!(current.members, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_mutate_and_next_id() {
        let store = MemoryStore::<GroupDoc>::new();
        let first = insert_with_next_id(&store, |id| group(id, &["a", "b", "c"]))
            .await
            .unwrap();
        let second = insert_with_next_id(&store, |id| group(id, &["d", "e", "f"]))
            .await
            .unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let (saved, len) = mutate(&store, &2, "Group", |g| {
            g.members.push("g".into());
            Ok(g.members.len())
        })
        .await
        .unwrap();
        assert_eq!(len, 4);
        assert_eq!(saved.version, 1);

        let missing = mutate(&store, &9, "Group", |_| Ok(())).await.unwrap_err();
        assert!(matches!(missing, QuireError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mutate_retries_stale_write() {
        let store = Racing::new(1, add_x);
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        let (saved, ()) = mutate(&store, &1, "Group", |g| {
            g.members.push("d".into());
            Ok(())
        })
        .await
        .unwrap();

        // Both writes survive: the competing one and ours on top of it
        assert_eq!(saved.members, vec!["a", "b", "c", "x", "d"]);
        assert_eq!(saved.version, 2);
    }

    #[tokio::test]
    async fn test_mutate_gives_up_with_conflict() {
        let store = Racing::new(MAX_WRITE_ATTEMPTS, add_x);
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        let mut calls = 0;
        let err = mutate(&store, &1, "Group", |g| {
            calls += 1;
            g.members.push("d".into());
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, QuireError::Conflict(_)));
        assert_eq!(calls, MAX_WRITE_ATTEMPTS);

        let current = store.inner.get(&1).await.unwrap().unwrap();
        assert!(!current.members.contains(&"d".to_string()));
        assert_eq!(current.version, MAX_WRITE_ATTEMPTS as i64);
    }

    #[tokio::test]
    async fn test_delete_if_version() {
        let store = MemoryStore::<GroupDoc>::new();
        let saved = store.insert(group(1, &["a", "b", "c"])).await.unwrap();
        store.replace(saved.clone()).await.unwrap().unwrap();

        assert!(!store.delete_if_version(&1, saved.version).await.unwrap());
        assert!(store.get(&1).await.unwrap().is_some());
        assert!(store.delete_if_version(&1, saved.version + 1).await.unwrap());
        assert!(!store.delete_if_version(&1, saved.version + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_checked_rechecks_after_race() {
        // The group gets registered between the guard and the delete
        let store = Racing::new(1, register);
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        let err = remove_checked(&store, &1, "Group", |g| {
            if g.registered {
                return Err(QuireError::workflow("registered"));
            }
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, QuireError::Workflow(_)));
        assert!(store.inner.get(&1).await.unwrap().unwrap().registered);
    }

    #[tokio::test]
    async fn test_remove_checked() {
        let store = MemoryStore::<GroupDoc>::new();
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();

        let removed = remove_checked(&store, &1, "Group", |_| Ok(())).await.unwrap();
        assert_eq!(removed.id, 1);
        assert!(store.get(&1).await.unwrap().is_none());

        let missing = remove_checked(&store, &1, "Group", |_| Ok(())).await.unwrap_err();
        assert!(matches!(missing, QuireError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_and_delete_where() {
        let store = MemoryStore::<GroupDoc>::new();
        store.insert(group(1, &["a", "b", "c"])).await.unwrap();
        store.insert(group(2, &["d", "e", "f"])).await.unwrap();

        let found = store.find(&Query::all().eq("members", "e")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);

        let removed = store.delete_where(&Query::all().eq("members", "a")).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&1).await.unwrap().is_none());
    }
}
