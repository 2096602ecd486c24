//! Comparison window resolver.
//!
//! Given a current reporting period, the period it is compared against,
//! and a snapshot of context entries, picks the entries a reviewer should
//! see as possible explanations for the change between the two.
//!
//! # Selection
//!
//! 1. Entries whose category has `comparison_window_days == 0` are skipped.
//! 2. An entry qualifies if its relevance window overlaps the current
//!    period, or overlaps the `comparison_window_days` days immediately
//!    before the current period starts. The lookback is what surfaces last
//!    year's promotion next to this year's spike.
//! 3. The entry must be comparison-significant (override, else category
//!    default).
//! 4. Results are ordered by magnitude (major first, unset last), then by
//!    start/event date, most recent first. The sort is stable, so ties keep
//!    snapshot order.
//!
//! The comparison period does not widen the lookback; it only tags each
//! explanation with whether it touched that period.

use serde::Serialize;
use std::cmp::Ordering;

use crate::evaluator::{
    is_comparison_significant, resolve_superseding, ActiveWindow, RelevanceEvaluator,
    SupersedingRef,
};
use crate::models::{ContextEntry, DateInterval};
use crate::registry::CategoryRegistry;
use crate::warning::DataQualityWarning;

/// An entry under consideration, paired with its resolved replacement.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entry: &'a ContextEntry,
    pub superseding: Option<SupersedingRef<'a>>,
}

impl<'a> Candidate<'a> {
    pub fn new(entry: &'a ContextEntry) -> Self {
        Self {
            entry,
            superseding: None,
        }
    }

    pub fn superseded_by(entry: &'a ContextEntry, superseding: SupersedingRef<'a>) -> Self {
        Self {
            entry,
            superseding: Some(superseding),
        }
    }
}

/// Pair every entry in a snapshot with its immediate superseding entry.
pub fn candidates(entries: &[ContextEntry]) -> Vec<Candidate<'_>> {
    entries
        .iter()
        .zip(resolve_superseding(entries))
        .map(|(entry, superseding)| Candidate { entry, superseding })
        .collect()
}

/// A selected entry and the windows it touched.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation<'a> {
    pub entry: &'a ContextEntry,
    pub window: ActiveWindow,
    pub overlaps_current: bool,
    pub overlaps_comparison: bool,
    pub in_lookback: bool,
}

/// Output of [`ComparisonResolver::select`].
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSelection<'a> {
    pub explanations: Vec<Explanation<'a>>,
    pub warnings: Vec<DataQualityWarning>,
}

impl<'a> ComparisonSelection<'a> {
    pub fn entries(&self) -> Vec<&'a ContextEntry> {
        self.explanations.iter().map(|e| e.entry).collect()
    }
}

fn rank(a: &ContextEntry, b: &ContextEntry) -> Ordering {
    b.magnitude
        .cmp(&a.magnitude)
        .then_with(|| b.anchor_date().cmp(&a.anchor_date()))
}

/// Selects explanatory entries for a period-over-period comparison.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonResolver<'r> {
    evaluator: RelevanceEvaluator<'r>,
}

impl<'r> ComparisonResolver<'r> {
    pub fn new(registry: &'r CategoryRegistry) -> Self {
        Self {
            evaluator: RelevanceEvaluator::new(registry),
        }
    }

    pub fn select<'a>(
        &self,
        candidates: &[Candidate<'a>],
        current: &DateInterval,
        comparison: &DateInterval,
    ) -> ComparisonSelection<'a> {
        let registry = self.evaluator.registry();
        let mut explanations = Vec::new();
        let mut warnings = Vec::new();

        for candidate in candidates {
            let entry = candidate.entry;
            let window_days = registry.comparison_window_days(&entry.category);
            if window_days == 0 {
                continue;
            }

            let resolution = self.evaluator.window(entry, candidate.superseding);
            warnings.extend(resolution.warnings);
            let Some(window) = resolution.window else {
                continue;
            };

            if !is_comparison_significant(entry, registry) {
                continue;
            }

            let overlaps_current = window.overlaps(current);
            let in_lookback = current
                .preceding(window_days)
                .is_some_and(|lookback| window.overlaps(&lookback));
            if !overlaps_current && !in_lookback {
                continue;
            }

            explanations.push(Explanation {
                entry,
                window,
                overlaps_current,
                overlaps_comparison: window.overlaps(comparison),
                in_lookback,
            });
        }

        explanations.sort_by(|a, b| rank(a.entry, b.entry));

        ComparisonSelection {
            explanations,
            warnings,
        }
    }
}

/// Convenience wrapper: resolve supersession within `entries`, select, and
/// return only the ordered entries.
pub fn select_explanatory_entries<'a>(
    entries: &'a [ContextEntry],
    current: &DateInterval,
    comparison: &DateInterval,
    registry: &CategoryRegistry,
) -> Vec<&'a ContextEntry> {
    ComparisonResolver::new(registry)
        .select(&candidates(entries), current, comparison)
        .entries()
}
