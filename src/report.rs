//! Reports over a client's context entries.
//!
//! Both reports load the client's full snapshot from a [`ContextStore`],
//! resolve supersession within it, and hand it to the engine. Data-quality
//! problems are logged and returned alongside the result; they never fail
//! a report.
//!
//! | Function | Question answered |
//! |----------|-------------------|
//! | [`active_context`] | What was going on for this client on a date? |
//! | [`explain_comparison`] | What might explain the change between two periods? |

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use context_relevance_core::comparison::{candidates, ComparisonResolver};
use context_relevance_core::evaluator::{resolve_superseding, ActiveWindow, RelevanceEvaluator};
use context_relevance_core::models::{ContextEntry, DateInterval};
use context_relevance_core::registry::CategoryRegistry;
use context_relevance_core::store::ContextStore;
use context_relevance_core::warning::DataQualityWarning;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// An entry active on the report date.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveEntry {
    pub entry: ContextEntry,
    pub comparison_significant: bool,
    pub window: Option<ActiveWindow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveContext {
    pub client_id: String,
    pub date: NaiveDate,
    pub entries: Vec<ActiveEntry>,
    pub warnings: Vec<DataQualityWarning>,
}

/// An entry selected to explain a period-over-period change.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedEntry {
    pub entry: ContextEntry,
    pub window: ActiveWindow,
    pub overlaps_current: bool,
    pub overlaps_comparison: bool,
    pub in_lookback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub client_id: String,
    pub current: DateInterval,
    pub comparison: DateInterval,
    pub explanations: Vec<ExplainedEntry>,
    pub warnings: Vec<DataQualityWarning>,
}

fn log_warnings(client_id: &str, warnings: &[DataQualityWarning]) {
    for warning in warnings {
        tracing::warn!(
            client_id,
            entry_id = %warning.entry_id,
            kind = warning.code(),
            "{}",
            warning
        );
    }
}

/// Entries active for `client_id` on `date`.
///
/// Always-included categories (brand details) come first, then the rest by
/// start/event date, most recent first. Ties keep store order.
pub async fn active_context(
    store: &dyn ContextStore,
    registry: &CategoryRegistry,
    client_id: &str,
    date: NaiveDate,
) -> Result<ActiveContext> {
    let snapshot = store.list_for_client(client_id).await?;
    let evaluator = RelevanceEvaluator::new(registry);

    let mut entries = Vec::new();
    let mut warnings = Vec::new();
    for (entry, superseding) in snapshot.iter().zip(resolve_superseding(&snapshot)) {
        let evaluation = evaluator.evaluate(entry, superseding, date);
        warnings.extend(evaluation.warnings);
        if evaluation.active {
            entries.push(ActiveEntry {
                entry: entry.clone(),
                comparison_significant: evaluation.comparison_significant,
                window: evaluation.window,
            });
        }
    }

    entries.sort_by(|a, b| {
        let a_always = registry.is_always_included(&a.entry.category);
        let b_always = registry.is_always_included(&b.entry.category);
        b_always
            .cmp(&a_always)
            .then_with(|| b.entry.anchor_date().cmp(&a.entry.anchor_date()))
    });

    log_warnings(client_id, &warnings);
    tracing::debug!(
        client_id,
        %date,
        total = snapshot.len(),
        active = entries.len(),
        "active context evaluated"
    );

    Ok(ActiveContext {
        client_id: client_id.to_string(),
        date,
        entries,
        warnings,
    })
}

/// Entries that may explain the change between `current` and `comparison`.
pub async fn explain_comparison(
    store: &dyn ContextStore,
    registry: &CategoryRegistry,
    client_id: &str,
    current: DateInterval,
    comparison: DateInterval,
) -> Result<ComparisonReport> {
    let snapshot = store.list_for_client(client_id).await?;
    let selection =
        ComparisonResolver::new(registry).select(&candidates(&snapshot), &current, &comparison);

    log_warnings(client_id, &selection.warnings);
    tracing::debug!(
        client_id,
        %current,
        %comparison,
        total = snapshot.len(),
        selected = selection.explanations.len(),
        "comparison explained"
    );

    let explanations = selection
        .explanations
        .into_iter()
        .map(|e| ExplainedEntry {
            entry: e.entry.clone(),
            window: e.window,
            overlaps_current: e.overlaps_current,
            overlaps_comparison: e.overlaps_comparison,
            in_lookback: e.in_lookback,
        })
        .collect();

    Ok(ComparisonReport {
        client_id: client_id.to_string(),
        current,
        comparison,
        explanations,
        warnings: selection.warnings,
    })
}

fn format_window(window: Option<&ActiveWindow>) -> String {
    match window {
        None => "-".to_string(),
        Some(w) => {
            let start = w.start.map(|d| d.to_string()).unwrap_or_else(|| "..".to_string());
            let end = w.end.map(|d| d.to_string()).unwrap_or_else(|| "..".to_string());
            format!("{} to {}", start, end)
        }
    }
}

fn print_warnings(warnings: &[DataQualityWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("Warnings ({}):", warnings.len());
    for warning in warnings {
        println!("  {}", warning);
    }
}

/// CLI entry point for `ctxr active`.
pub async fn run_active(
    config: &Config,
    client_id: &str,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let report = active_context(&store, &registry, client_id, date).await?;
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.entries.is_empty() {
        println!("No active context for {} on {}.", client_id, date);
    } else {
        println!("Active context for {} on {}:", client_id, date);
        println!();
        println!(
            "{:<36}  {:<24}  {:<9}  {:<4}  {:<24}  TITLE",
            "ID", "CATEGORY", "MAGNITUDE", "SIG", "WINDOW"
        );
        for active in &report.entries {
            let entry = &active.entry;
            println!(
                "{:<36}  {:<24}  {:<9}  {:<4}  {:<24}  {}",
                entry.id,
                entry.category,
                entry.magnitude.map(|m| m.as_str()).unwrap_or("-"),
                if active.comparison_significant { "yes" } else { "no" },
                format_window(active.window.as_ref()),
                entry.title
            );
        }
    }
    print_warnings(&report.warnings);
    Ok(())
}

/// CLI entry point for `ctxr explain`.
pub async fn run_explain(
    config: &Config,
    client_id: &str,
    current: DateInterval,
    comparison: DateInterval,
    json: bool,
) -> Result<()> {
    let registry = config.registry()?;
    let store = SqliteStore::open(config).await?;
    let report = explain_comparison(&store, &registry, client_id, current, comparison).await?;
    store.pool().close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Comparing {} against {} for {}:",
        current, comparison, client_id
    );
    println!();
    if report.explanations.is_empty() {
        println!("No explanatory context found.");
    } else {
        println!(
            "{:<36}  {:<18}  {:<9}  {:<10}  {:<24}  TITLE",
            "ID", "CATEGORY", "MAGNITUDE", "ANCHOR", "TOUCHES"
        );
        for explained in &report.explanations {
            let entry = &explained.entry;
            let mut touches = Vec::new();
            if explained.overlaps_current {
                touches.push("current");
            }
            if explained.in_lookback {
                touches.push("lookback");
            }
            if explained.overlaps_comparison {
                touches.push("comparison");
            }
            println!(
                "{:<36}  {:<18}  {:<9}  {:<10}  {:<24}  {}",
                entry.id,
                entry.category,
                entry.magnitude.map(|m| m.as_str()).unwrap_or("-"),
                entry
                    .anchor_date()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                touches.join(","),
                entry.title
            );
        }
    }
    print_warnings(&report.warnings);
    Ok(())
}
