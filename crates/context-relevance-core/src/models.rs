//! Core data models used throughout Context Relevance.
//!
//! A [`ContextEntry`] is a business event or standing condition recorded by
//! an operator. Entries carry either a single event date or a start/end
//! interval; [`ContextEntry::create`] enforces that exactly one of those
//! shapes is present. Later edits ([`EntryPatch`]) may leave an entry in a
//! state the evaluator has to treat as malformed (an end date before the
//! start date), which is why the dates stay plain optional fields rather
//! than a closed enum.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validation failures raised when an entry or interval is constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("entry needs either an event date or a start date")]
    MissingDates,

    #[error("entry cannot carry both an event date and a start/end interval")]
    AmbiguousDates,

    #[error("an end date requires a start date")]
    EndWithoutStart,

    #[error("end date {end} is before start date {start}")]
    InvertedInterval { start: NaiveDate, end: NaiveDate },

    #[error("invalid magnitude '{0}': expected minor, moderate, or major")]
    InvalidMagnitude(String),
}

/// How large an event's impact was, as judged by whoever recorded it.
///
/// Ordered `Minor < Moderate < Major` so comparisons read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Minor,
    Moderate,
    Major,
}

impl Magnitude {
    pub fn as_str(&self) -> &'static str {
        match self {
            Magnitude::Minor => "minor",
            Magnitude::Moderate => "moderate",
            Magnitude::Major => "major",
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Magnitude {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" => Ok(Magnitude::Minor),
            "moderate" => Ok(Magnitude::Moderate),
            "major" => Ok(Magnitude::Major),
            _ => Err(EntryError::InvalidMagnitude(s.to_string())),
        }
    }
}

/// Inclusive calendar interval `[start, end]`.
///
/// Reporting periods handed in by callers are always well-formed; an
/// inverted pair is rejected here rather than evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IntervalParts")]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct IntervalParts {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<IntervalParts> for DateInterval {
    type Error = EntryError;

    fn try_from(parts: IntervalParts) -> Result<Self, Self::Error> {
        DateInterval::new(parts.start, parts.end)
    }
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EntryError> {
        if end < start {
            return Err(EntryError::InvertedInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The `days`-long interval ending the day before this one starts.
    ///
    /// Returns `None` when `days` is zero.
    pub fn preceding(&self, days: u32) -> Option<DateInterval> {
        if days == 0 {
            return None;
        }
        let end = self.start.checked_sub_days(Days::new(1))?;
        let start = self
            .start
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Some(DateInterval { start, end })
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A recorded business event or condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    pub client_id: String,
    /// Key into the category registry. Free text; unknown keys fall back.
    pub category: String,
    pub title: String,
    pub description: String,
    pub event_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub magnitude: Option<Magnitude>,
    /// Explicit override of the category's comparison-significance default.
    pub comparison_significant: Option<bool>,
    /// Id of the entry that replaced this one.
    pub superseded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a [`ContextEntry`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContextEntry {
    pub client_id: String,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub magnitude: Option<Magnitude>,
    #[serde(default)]
    pub comparison_significant: Option<bool>,
}

/// Partial edit of an existing entry. `None` leaves a field untouched.
///
/// Setting an event date switches the entry to the single-date shape and
/// clears its interval; setting a start or end date does the reverse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPatch {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub magnitude: Option<Magnitude>,
    #[serde(default)]
    pub clear_magnitude: bool,
    #[serde(default)]
    pub comparison_significant: Option<bool>,
    #[serde(default)]
    pub clear_comparison_significant: bool,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.event_date.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.magnitude.is_none()
            && !self.clear_magnitude
            && self.comparison_significant.is_none()
            && !self.clear_comparison_significant
    }
}

fn require_non_empty(value: &str, field: &'static str) -> Result<(), EntryError> {
    if value.trim().is_empty() {
        Err(EntryError::EmptyField { field })
    } else {
        Ok(())
    }
}

/// Checks that exactly one date shape is populated and that an interval,
/// if closed, is not inverted.
pub fn validate_dates(
    event_date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(), EntryError> {
    match (event_date, start_date, end_date) {
        (Some(_), None, None) => Ok(()),
        (Some(_), _, _) => Err(EntryError::AmbiguousDates),
        (None, None, Some(_)) => Err(EntryError::EndWithoutStart),
        (None, None, None) => Err(EntryError::MissingDates),
        (None, Some(start), Some(end)) if end < start => {
            Err(EntryError::InvertedInterval { start, end })
        }
        (None, Some(_), _) => Ok(()),
    }
}

impl ContextEntry {
    /// Validate a creation payload and stamp it with a fresh id.
    pub fn create(new: NewContextEntry, now: DateTime<Utc>) -> Result<Self, EntryError> {
        require_non_empty(&new.client_id, "client_id")?;
        require_non_empty(&new.category, "category")?;
        require_non_empty(&new.title, "title")?;
        validate_dates(new.event_date, new.start_date, new.end_date)?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: new.client_id.trim().to_string(),
            category: new.category.trim().to_string(),
            title: new.title.trim().to_string(),
            description: new.description,
            event_date: new.event_date,
            start_date: new.start_date,
            end_date: new.end_date,
            magnitude: new.magnitude,
            comparison_significant: new.comparison_significant,
            superseded_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial edit.
    ///
    /// Only empty text fields are rejected. A patch that moves the end date
    /// before the start date is accepted; the evaluator reports it.
    pub fn apply(&mut self, patch: EntryPatch, now: DateTime<Utc>) -> Result<(), EntryError> {
        if let Some(ref category) = patch.category {
            require_non_empty(category, "category")?;
        }
        if let Some(ref title) = patch.title {
            require_non_empty(title, "title")?;
        }

        if let Some(category) = patch.category {
            self.category = category.trim().to_string();
        }
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }

        if let Some(event_date) = patch.event_date {
            self.event_date = Some(event_date);
            self.start_date = None;
            self.end_date = None;
        }
        if patch.start_date.is_some() || patch.end_date.is_some() {
            if let Some(start) = patch.start_date {
                self.start_date = Some(start);
            }
            if let Some(end) = patch.end_date {
                self.end_date = Some(end);
            }
            // An interval edit on a single-date entry converts it in place.
            if let Some(event) = self.event_date.take() {
                self.start_date.get_or_insert(event);
            }
        }

        if patch.clear_magnitude {
            self.magnitude = None;
        } else if let Some(magnitude) = patch.magnitude {
            self.magnitude = Some(magnitude);
        }

        if patch.clear_comparison_significant {
            self.comparison_significant = None;
        } else if let Some(flag) = patch.comparison_significant {
            self.comparison_significant = Some(flag);
        }

        self.updated_at = now;
        Ok(())
    }

    /// The date the entry's relevance begins: its start date, else its
    /// event date. `None` only for legacy rows with no dates at all.
    pub fn anchor_date(&self) -> Option<NaiveDate> {
        self.start_date.or(self.event_date)
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}
