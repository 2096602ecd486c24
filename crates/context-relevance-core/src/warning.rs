//! Data-quality warnings.
//!
//! Bad context data never aborts an evaluation. The evaluator degrades to
//! a conservative default and reports what it saw as a
//! [`DataQualityWarning`], tagged with the offending entry's id, so batch
//! report generation can carry on and an editor can fix the entry later.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// What was wrong with an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// A bounded entry whose end date precedes its start date.
    InvertedInterval { start: NaiveDate, end: NaiveDate },
    /// No event date and no start date.
    MissingDates,
    /// A bounded entry with a start but no end.
    MissingEndDate { start: NaiveDate },
    /// `superseded_by` names an entry the caller could not find.
    DanglingSupersession { superseded_by: String },
    /// The superseding entry has no date to activate from.
    UndeterminedSupersession { superseded_by: String },
}

/// A data-quality problem found while evaluating one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    pub entry_id: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl DataQualityWarning {
    pub fn new(entry_id: &str, kind: WarningKind) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            kind,
        }
    }

    /// Short machine-readable code, matching the serialized `kind` tag.
    pub fn code(&self) -> &'static str {
        match self.kind {
            WarningKind::InvertedInterval { .. } => "inverted_interval",
            WarningKind::MissingDates => "missing_dates",
            WarningKind::MissingEndDate { .. } => "missing_end_date",
            WarningKind::DanglingSupersession { .. } => "dangling_supersession",
            WarningKind::UndeterminedSupersession { .. } => "undetermined_supersession",
        }
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::InvertedInterval { start, end } => write!(
                f,
                "entry {}: end date {} is before start date {}",
                self.entry_id, end, start
            ),
            WarningKind::MissingDates => {
                write!(f, "entry {}: no event date or start date", self.entry_id)
            }
            WarningKind::MissingEndDate { start } => write!(
                f,
                "entry {}: interval starting {} has no end date",
                self.entry_id, start
            ),
            WarningKind::DanglingSupersession { superseded_by } => write!(
                f,
                "entry {}: superseding entry {} not found",
                self.entry_id, superseded_by
            ),
            WarningKind::UndeterminedSupersession { superseded_by } => write!(
                f,
                "entry {}: superseding entry {} has no activation date",
                self.entry_id, superseded_by
            ),
        }
    }
}
