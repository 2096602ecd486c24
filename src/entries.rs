//! Context entry management: create, list, fetch, edit, and supersede.
//!
//! The `create_entry` / `edit_entry` / `supersede_entry` functions are shared
//! by the CLI (`ctxr add`, `ctxr edit`, `ctxr supersede`) and the HTTP API.
//! Entries are never deleted; retiring one means superseding it.

use anyhow::{Context, Result};
use chrono::Utc;

use context_relevance_core::models::{ContextEntry, EntryPatch, NewContextEntry};
use context_relevance_core::registry::{CategoryRegistry, ComparisonDefault, TemporalKind};
use context_relevance_core::store::{ContextStore, StoreError};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

fn note_unregistered(registry: &CategoryRegistry, entry: &ContextEntry) {
    if !registry.is_registered(&entry.category) {
        tracing::warn!(
            entry_id = %entry.id,
            category = %entry.category,
            "unregistered category; entry will be treated as 'other'"
        );
    }
}

/// Validate and store a new entry.
pub async fn create_entry(
    store: &dyn ContextStore,
    registry: &CategoryRegistry,
    new: NewContextEntry,
) -> Result<ContextEntry> {
    let entry = ContextEntry::create(new, Utc::now())?;
    note_unregistered(registry, &entry);
    store.insert(&entry).await?;
    tracing::info!(
        entry_id = %entry.id,
        client_id = %entry.client_id,
        category = %entry.category,
        "entry created"
    );
    Ok(entry)
}

/// Apply a partial edit to an existing entry.
pub async fn edit_entry(
    store: &dyn ContextStore,
    registry: &CategoryRegistry,
    id: &str,
    patch: EntryPatch,
) -> Result<ContextEntry> {
    let mut entry = store
        .get(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    if patch.is_empty() {
        return Ok(entry);
    }

    entry.apply(patch, Utc::now())?;
    if let (Some(start), Some(end)) = (entry.start_date, entry.end_date) {
        if end < start {
            tracing::warn!(
                entry_id = %entry.id,
                %start,
                %end,
                "edit leaves end date before start date"
            );
        }
    }
    note_unregistered(registry, &entry);
    store.update(&entry).await?;
    tracing::info!(entry_id = %entry.id, "entry updated");
    Ok(entry)
}

/// Retire `id` in favor of `by`.
pub async fn supersede_entry(store: &dyn ContextStore, id: &str, by: &str) -> Result<ContextEntry> {
    let entry = store.supersede(id, by, Utc::now()).await?;
    tracing::info!(entry_id = %id, superseded_by = %by, "entry superseded");
    Ok(entry)
}

fn print_entry(entry: &ContextEntry, registry: &CategoryRegistry) {
    let descriptor = registry.get_descriptor(&entry.category);
    println!("--- Context Entry ---");
    println!("id:                     {}", entry.id);
    println!("client_id:              {}", entry.client_id);
    println!(
        "category:               {} ({})",
        entry.category, descriptor.kind
    );
    println!("title:                  {}", entry.title);
    if let Some(event) = entry.event_date {
        println!("event_date:             {}", event);
    }
    if let Some(start) = entry.start_date {
        println!("start_date:             {}", start);
    }
    if let Some(end) = entry.end_date {
        println!("end_date:               {}", end);
    }
    if let Some(magnitude) = entry.magnitude {
        println!("magnitude:              {}", magnitude);
    }
    if let Some(flag) = entry.comparison_significant {
        println!("comparison_significant: {} (override)", flag);
    }
    if let Some(ref by) = entry.superseded_by {
        println!("superseded_by:          {}", by);
    }
    println!("created_at:             {}", entry.created_at.to_rfc3339());
    println!("updated_at:             {}", entry.updated_at.to_rfc3339());
    if !entry.description.is_empty() {
        println!();
        println!("{}", entry.description);
    }
}

fn date_summary(entry: &ContextEntry) -> String {
    match (entry.event_date, entry.start_date, entry.end_date) {
        (Some(event), _, _) => event.to_string(),
        (None, Some(start), Some(end)) => format!("{}..{}", start, end),
        (None, Some(start), None) => format!("{}..", start),
        (None, None, _) => "-".to_string(),
    }
}

/// CLI entry point for `ctxr categories`.
pub fn run_categories(config: &Config) -> Result<()> {
    let registry = config.registry()?;

    println!(
        "{:<24}  {:<10}  {:>4}  {:<11}  {:>6}  DESCRIPTION",
        "CATEGORY", "KIND", "DAYS", "SIGNIFICANT", "WINDOW"
    );
    for (key, descriptor) in registry.categories() {
        let days = match descriptor.kind {
            TemporalKind::Point => descriptor.tail_days.to_string(),
            TemporalKind::Bounded => descriptor.buffer_days.to_string(),
            TemporalKind::Persistent | TemporalKind::Always => "-".to_string(),
        };
        let significant = match descriptor.default_significant {
            ComparisonDefault::Fixed(true) => "always".to_string(),
            ComparisonDefault::Fixed(false) => "never".to_string(),
            ComparisonDefault::AtLeast(m) => format!(">= {}", m),
        };
        println!(
            "{:<24}  {:<10}  {:>4}  {:<11}  {:>6}  {}",
            key,
            descriptor.kind.as_str(),
            days,
            significant,
            descriptor.comparison_window_days,
            descriptor.description
        );
    }
    Ok(())
}

/// CLI entry point for `ctxr add`.
pub async fn run_add(config: &Config, new: NewContextEntry) -> Result<()> {
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let entry = create_entry(&store, &registry, new).await?;
    store.pool().close().await;

    println!("{}", entry.id);
    Ok(())
}

/// CLI entry point for `ctxr list`.
pub async fn run_list(
    config: &Config,
    client_id: &str,
    include_superseded: bool,
    json: bool,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let entries: Vec<ContextEntry> = store
        .list_for_client(client_id)
        .await?
        .into_iter()
        .filter(|e| include_superseded || !e.is_superseded())
        .collect();
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No context entries for {}.", client_id);
        return Ok(());
    }

    println!(
        "{:<36}  {:<24}  {:<22}  {:<9}  TITLE",
        "ID", "CATEGORY", "DATES", "MAGNITUDE"
    );
    for entry in &entries {
        let title = if entry.is_superseded() {
            format!("{} (superseded)", entry.title)
        } else {
            entry.title.clone()
        };
        println!(
            "{:<36}  {:<24}  {:<22}  {:<9}  {}",
            entry.id,
            entry.category,
            date_summary(entry),
            entry.magnitude.map(|m| m.as_str()).unwrap_or("-"),
            title
        );
    }
    Ok(())
}

/// CLI entry point for `ctxr get`.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let entry = store
        .get(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(&entry, &registry);
    }
    Ok(())
}

/// CLI entry point for `ctxr edit`.
pub async fn run_edit(config: &Config, id: &str, patch: EntryPatch) -> Result<()> {
    if patch.is_empty() {
        anyhow::bail!("nothing to change: pass at least one field to edit");
    }
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let entry = edit_entry(&store, &registry, id, patch)
        .await
        .with_context(|| format!("Failed to edit entry {}", id))?;
    store.pool().close().await;

    print_entry(&entry, &registry);
    Ok(())
}

/// CLI entry point for `ctxr supersede`.
pub async fn run_supersede(config: &Config, id: &str, by: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let entry = supersede_entry(&store, id, by).await?;
    store.pool().close().await;

    println!("{} superseded by {}", entry.id, by);
    Ok(())
}
