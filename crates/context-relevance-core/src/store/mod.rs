//! Storage abstraction for context entries.
//!
//! The engine itself never reads or writes storage; it evaluates whatever
//! snapshot the caller hands it. The [`ContextStore`] trait is the seam the
//! reporting layer and HTTP API use to load those snapshots, enabling
//! pluggable backends (SQLite, in-memory).
//!
//! Entries are never hard-deleted. Retiring an entry means pointing its
//! `superseded_by` at the entry that replaces it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::ContextEntry;

/// Failures callers may want to tell apart from plain I/O errors.
///
/// Store implementations return these wrapped in [`anyhow::Error`];
/// use `downcast_ref::<StoreError>()` to classify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("context entry not found: {0}")]
    NotFound(String),

    #[error("context entry already exists: {0}")]
    Duplicate(String),

    #[error("entry {0} cannot supersede itself")]
    SelfSupersession(String),

    #[error("entry {entry} belongs to client {entry_client}, but {by} belongs to {by_client}")]
    ClientMismatch {
        entry: String,
        entry_client: String,
        by: String,
        by_client: String,
    },
}

/// Checks shared by every backend before recording a supersession.
pub fn check_supersession(entry: &ContextEntry, by: &ContextEntry) -> Result<(), StoreError> {
    if entry.id == by.id {
        return Err(StoreError::SelfSupersession(entry.id.clone()));
    }
    if entry.client_id != by.client_id {
        return Err(StoreError::ClientMismatch {
            entry: entry.id.clone(),
            entry_client: entry.client_id.clone(),
            by: by.id.clone(),
            by_client: by.client_id.clone(),
        });
    }
    Ok(())
}

/// Abstract storage backend for context entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](ContextStore::insert) | Store a newly created entry |
/// | [`get`](ContextStore::get) | Fetch one entry by id |
/// | [`list_for_client`](ContextStore::list_for_client) | All entries of a client, in insertion order |
/// | [`update`](ContextStore::update) | Replace an existing entry |
/// | [`supersede`](ContextStore::supersede) | Soft-retire an entry in favor of another |
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Store a newly created entry. Fails with [`StoreError::Duplicate`]
    /// if the id is taken.
    async fn insert(&self, entry: &ContextEntry) -> Result<()>;

    /// Fetch one entry by id.
    async fn get(&self, id: &str) -> Result<Option<ContextEntry>>;

    /// All entries for a client, in insertion order.
    ///
    /// The order is stable across calls so downstream sorting stays
    /// deterministic.
    async fn list_for_client(&self, client_id: &str) -> Result<Vec<ContextEntry>>;

    /// Replace an existing entry. Fails with [`StoreError::NotFound`] if
    /// there is no entry with that id.
    async fn update(&self, entry: &ContextEntry) -> Result<()>;

    /// Mark `id` as superseded by `by`, stamping `updated_at` with `at`.
    ///
    /// Returns the updated entry.
    async fn supersede(&self, id: &str, by: &str, at: DateTime<Utc>) -> Result<ContextEntry>;
}
