//! Relevance evaluator.
//!
//! Decides, for a [`ContextEntry`] and a reference date, whether the entry
//! is active and whether it counts as comparison-significant.
//!
//! # Active windows by kind
//!
//! | Kind | Window |
//! |------|--------|
//! | `Always` | every date |
//! | `Point` | `[event, event + tail_days]` |
//! | `Bounded` | `[start, end + buffer_days]` |
//! | `Persistent` | `[start, ∞)`, start falling back to the creation date |
//!
//! A superseded entry's window is cut off the day before its replacement
//! activates. The evaluator never follows `superseded_by` itself: callers
//! hand in the immediate superseding entry (or its activation date) as a
//! [`SupersedingRef`], which keeps a mistaken A→B→A cycle from turning into
//! an unbounded walk. [`resolve_superseding`] does that one-hop lookup over
//! a snapshot of entries.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{ContextEntry, DateInterval};
use crate::registry::{CategoryRegistry, TemporalKind};
use crate::warning::{DataQualityWarning, WarningKind};

/// Inclusive relevance interval. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ActiveWindow {
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn between(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| s <= date) && self.end.map_or(true, |e| date <= e)
    }

    pub fn overlaps(&self, interval: &DateInterval) -> bool {
        self.start.map_or(true, |s| s <= interval.end())
            && self.end.map_or(true, |e| interval.start() <= e)
    }

    /// Cut the window off so it ends the day before `cutoff`.
    ///
    /// Returns `None` when nothing is left.
    fn ending_before(self, cutoff: NaiveDate) -> Option<Self> {
        let last = cutoff.checked_sub_days(Days::new(1))?;
        let end = match self.end {
            Some(end) if end <= last => end,
            _ => last,
        };
        if self.start.is_some_and(|start| start > end) {
            return None;
        }
        Some(Self {
            start: self.start,
            end: Some(end),
        })
    }
}

/// The entry that replaced the one being evaluated, as resolved by the caller.
#[derive(Debug, Clone, Copy)]
pub enum SupersedingRef<'a> {
    Entry(&'a ContextEntry),
    ActivatedOn(NaiveDate),
}

/// Resolved relevance window for one entry, with any problems found.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResolution {
    /// `None` when the entry is never active.
    pub window: Option<ActiveWindow>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Result of evaluating one entry against one reference date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub active: bool,
    pub comparison_significant: bool,
    pub window: Option<ActiveWindow>,
    pub warnings: Vec<DataQualityWarning>,
}

/// Whether `entry` is a plausible explanation for a period-over-period swing.
///
/// An explicit per-entry override always wins over the category default.
pub fn is_comparison_significant(entry: &ContextEntry, registry: &CategoryRegistry) -> bool {
    entry
        .comparison_significant
        .unwrap_or_else(|| {
            registry.resolve_comparison_significant(&entry.category, entry.magnitude)
        })
}

/// For each entry in `entries`, find the entry named by its `superseded_by`
/// within the same snapshot. One hop only; chains are not followed.
///
/// The result is index-aligned with `entries`. An entry that is not
/// superseded, or whose superseding entry is missing from the snapshot,
/// maps to `None`.
pub fn resolve_superseding(entries: &[ContextEntry]) -> Vec<Option<SupersedingRef<'_>>> {
    let by_id: HashMap<&str, &ContextEntry> =
        entries.iter().map(|e| (e.id.as_str(), e)).collect();

    entries
        .iter()
        .map(|entry| {
            entry
                .superseded_by
                .as_deref()
                .and_then(|id| by_id.get(id).copied())
                .map(SupersedingRef::Entry)
        })
        .collect()
}

fn add_days(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
}

/// Evaluates entries against a [`CategoryRegistry`].
///
/// Cheap to construct and `Copy`; holds only a borrowed registry.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceEvaluator<'r> {
    registry: &'r CategoryRegistry,
}

impl<'r> RelevanceEvaluator<'r> {
    pub fn new(registry: &'r CategoryRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r CategoryRegistry {
        self.registry
    }

    /// Compute the entry's relevance window, applying supersession.
    pub fn window(
        &self,
        entry: &ContextEntry,
        superseding: Option<SupersedingRef<'_>>,
    ) -> WindowResolution {
        let mut warnings = Vec::new();
        let base = self.base_window(entry, &mut warnings);

        let window = match (entry.superseded_by.as_deref(), superseding) {
            (None, _) => base,
            (Some(by), None) => {
                // Dangling reference: the replacement cannot be found, so
                // the entry stands on its own dates.
                warnings.push(DataQualityWarning::new(
                    &entry.id,
                    WarningKind::DanglingSupersession {
                        superseded_by: by.to_string(),
                    },
                ));
                base
            }
            (Some(by), Some(superseding)) => {
                let cutoff = match self.activation_date(superseding) {
                    Some(date) => date,
                    None => {
                        warnings.push(DataQualityWarning::new(
                            &entry.id,
                            WarningKind::UndeterminedSupersession {
                                superseded_by: by.to_string(),
                            },
                        ));
                        entry.updated_at.date_naive()
                    }
                };
                base.and_then(|w| w.ending_before(cutoff))
            }
        };

        WindowResolution { window, warnings }
    }

    /// The date the superseding entry took effect.
    ///
    /// Start date, else event date. Persistent and always-kind entries fall
    /// back to the day they were created; a point or bounded entry with
    /// neither date has no activation date.
    pub fn activation_date(&self, superseding: SupersedingRef<'_>) -> Option<NaiveDate> {
        match superseding {
            SupersedingRef::ActivatedOn(date) => Some(date),
            SupersedingRef::Entry(entry) => entry.anchor_date().or_else(|| {
                match self.registry.get_descriptor(&entry.category).kind {
                    TemporalKind::Persistent | TemporalKind::Always => {
                        Some(entry.created_at.date_naive())
                    }
                    TemporalKind::Point | TemporalKind::Bounded => None,
                }
            }),
        }
    }

    fn base_window(
        &self,
        entry: &ContextEntry,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Option<ActiveWindow> {
        let descriptor = self.registry.get_descriptor(&entry.category);

        match descriptor.kind {
            TemporalKind::Always => Some(ActiveWindow::unbounded()),
            TemporalKind::Point => {
                let Some(event) = entry.event_date.or(entry.start_date) else {
                    warnings.push(DataQualityWarning::new(&entry.id, WarningKind::MissingDates));
                    return None;
                };
                Some(ActiveWindow::between(
                    event,
                    add_days(event, descriptor.tail_days),
                ))
            }
            TemporalKind::Bounded => {
                let Some(start) = entry.start_date.or(entry.event_date) else {
                    warnings.push(DataQualityWarning::new(&entry.id, WarningKind::MissingDates));
                    return None;
                };
                let Some(end) = entry.end_date else {
                    warnings.push(DataQualityWarning::new(
                        &entry.id,
                        WarningKind::MissingEndDate { start },
                    ));
                    return None;
                };
                if end < start {
                    warnings.push(DataQualityWarning::new(
                        &entry.id,
                        WarningKind::InvertedInterval { start, end },
                    ));
                    return None;
                }
                Some(ActiveWindow::between(
                    start,
                    add_days(end, descriptor.buffer_days),
                ))
            }
            TemporalKind::Persistent => {
                let start = entry
                    .anchor_date()
                    .unwrap_or_else(|| entry.created_at.date_naive());
                Some(ActiveWindow::starting(start))
            }
        }
    }

    /// Evaluate `entry` at `reference`.
    pub fn evaluate(
        &self,
        entry: &ContextEntry,
        superseding: Option<SupersedingRef<'_>>,
        reference: NaiveDate,
    ) -> Evaluation {
        let WindowResolution { window, warnings } = self.window(entry, superseding);
        Evaluation {
            active: window.is_some_and(|w| w.contains(reference)),
            comparison_significant: self.is_comparison_significant(entry),
            window,
            warnings,
        }
    }

    pub fn is_active(
        &self,
        entry: &ContextEntry,
        superseding: Option<SupersedingRef<'_>>,
        reference: NaiveDate,
    ) -> bool {
        self.window(entry, superseding)
            .window
            .is_some_and(|w| w.contains(reference))
    }

    pub fn is_comparison_significant(&self, entry: &ContextEntry) -> bool {
        is_comparison_significant(entry, self.registry)
    }
}
