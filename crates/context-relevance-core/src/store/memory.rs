//! In-memory [`ContextStore`] implementation for testing and embedding.
//!
//! Keeps entries in a `Vec` behind `std::sync::RwLock`, so insertion order
//! is the listing order.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::ContextEntry;

use super::{check_supersession, ContextStore, StoreError};

/// In-memory store for tests and single-process use.
pub struct InMemoryStore {
    entries: RwLock<Vec<ContextEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Seed a store with existing entries, kept in the given order.
    pub fn with_entries(entries: Vec<ContextEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ContextEntry>>> {
        self.entries
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ContextEntry>>> {
        self.entries
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for InMemoryStore {
    async fn insert(&self, entry: &ContextEntry) -> Result<()> {
        let mut entries = self.write()?;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::Duplicate(entry.id.clone()).into());
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContextEntry>> {
        Ok(self.read()?.iter().find(|e| e.id == id).cloned())
    }

    async fn list_for_client(&self, client_id: &str) -> Result<Vec<ContextEntry>> {
        Ok(self
            .read()?
            .iter()
            .filter(|e| e.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn update(&self, entry: &ContextEntry) -> Result<()> {
        let mut entries = self.write()?;
        let slot = entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| StoreError::NotFound(entry.id.clone()))?;
        *slot = entry.clone();
        Ok(())
    }

    async fn supersede(&self, id: &str, by: &str, at: DateTime<Utc>) -> Result<ContextEntry> {
        let mut entries = self.write()?;
        let replacement = entries
            .iter()
            .find(|e| e.id == by)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(by.to_string()))?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        check_supersession(entry, &replacement)?;
        entry.superseded_by = Some(replacement.id);
        entry.updated_at = at;
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewContextEntry;
    use chrono::NaiveDate;

    fn make(client: &str, title: &str) -> ContextEntry {
        ContextEntry::create(
            NewContextEntry {
                client_id: client.to_string(),
                category: "paid_media_strategy".to_string(),
                title: title.to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list_in_order() {
        let store = InMemoryStore::new();
        let a = make("acme", "first");
        let b = make("acme", "second");
        let c = make("globex", "other client");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();
        store.insert(&c).await.unwrap();

        let listed = store.list_for_client("acme").await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryStore::new();
        let a = make("acme", "first");
        store.insert(&a).await.unwrap();
        let err = store.insert(&a).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::Duplicate(a.id.clone()))
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryStore::new();
        let a = make("acme", "first");
        let err = store.update(&a).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_supersede_sets_reference() {
        let store = InMemoryStore::new();
        let old = make("acme", "old");
        let new = make("acme", "new");
        store.insert(&old).await.unwrap();
        store.insert(&new).await.unwrap();

        let at = Utc::now();
        let retired = store.supersede(&old.id, &new.id, at).await.unwrap();
        assert_eq!(retired.superseded_by.as_deref(), Some(new.id.as_str()));
        assert_eq!(retired.updated_at, at);

        let fetched = store.get(&old.id).await.unwrap().unwrap();
        assert_eq!(fetched, retired);
    }

    #[tokio::test]
    async fn test_supersede_unknown_ids() {
        let store = InMemoryStore::new();
        let old = make("acme", "old");
        store.insert(&old).await.unwrap();

        let err = store.supersede(&old.id, "ghost", Utc::now()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound("ghost".to_string()))
        );
    }
}
