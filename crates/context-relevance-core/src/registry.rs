//! Category registry: how each kind of business event behaves over time.
//!
//! Every category key maps to a [`CategoryDescriptor`] describing its
//! [`TemporalKind`], how many days of relevance trail the event, whether it
//! explains period-over-period swings by default, and how far back a
//! comparison lookup should search for it.
//!
//! Category keys are user-authored free text that may predate schema
//! changes, so lookups never fail: an unregistered key resolves to the
//! `other` fallback descriptor.
//!
//! # Built-in categories
//!
//! | Key | Kind | Tail / buffer | Significant by default | Window |
//! |-----|------|---------------|------------------------|--------|
//! | `organic_pr_win` | point | 30 | always | 365 |
//! | `influencer` | point | 21 | major | 365 |
//! | `product_launch` | point | 90 | always | 365 |
//! | `promotion` | bounded | 14 | major | 365 |
//! | `budget_change` | point | 7 | never | 0 |
//! | `competitor` | point | 30 | major | 365 |
//! | `site_issue` | bounded | 7 | major | 365 |
//! | `inventory_issue` | bounded | 7 | moderate or major | 365 |
//! | `paid_media_strategy` | persistent | - | never | 0 |
//! | `organic_social_strategy` | persistent | - | never | 0 |
//! | `business_strategy` | persistent | - | never | 0 |
//! | `market_trend` | persistent | - | never | 0 |
//! | `standing_condition` | persistent | - | never | 0 |
//! | `brand_details` | always | - | never | 0 |
//! | `other` | point | 14 | never | 0 |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::models::Magnitude;

/// Key of the descriptor used for unregistered categories.
pub const FALLBACK_CATEGORY: &str = "other";

/// Errors raised while assembling a registry. These indicate a broken
/// configuration, not bad user data, and should stop startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown temporal kind '{0}': expected point, bounded, persistent, or always")]
    UnknownKind(String),

    #[error("category key must not be empty")]
    EmptyKey,

    #[error("category '{category}': tail_days only applies to point categories, not {kind}")]
    TailOnNonPoint { category: String, kind: TemporalKind },

    #[error("category '{category}': buffer_days only applies to bounded categories, not {kind}")]
    BufferOnNonBounded { category: String, kind: TemporalKind },

    #[error("fallback category 'other' must be a point category, not {0}")]
    FallbackNotPoint(TemporalKind),
}

/// How a category's active window is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalKind {
    /// A single event with a tail of `tail_days` after it.
    Point,
    /// A start/end interval with `buffer_days` appended after the end.
    Bounded,
    /// Relevant from its start until superseded.
    Persistent,
    /// Relevant at every date.
    Always,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalKind::Point => "point",
            TemporalKind::Bounded => "bounded",
            TemporalKind::Persistent => "persistent",
            TemporalKind::Always => "always",
        }
    }
}

impl fmt::Display for TemporalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(TemporalKind::Point),
            "bounded" => Ok(TemporalKind::Bounded),
            "persistent" => Ok(TemporalKind::Persistent),
            "always" => Ok(TemporalKind::Always),
            _ => Err(RegistryError::UnknownKind(s.to_string())),
        }
    }
}

/// Default comparison significance for a category.
///
/// Serialized untagged: `true`/`false` for a fixed value, or a magnitude
/// name meaning "significant at this magnitude or above".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonDefault {
    Fixed(bool),
    AtLeast(Magnitude),
}

impl ComparisonDefault {
    /// Evaluate against an entry's magnitude. An unset magnitude never
    /// satisfies a magnitude threshold.
    pub fn resolve(&self, magnitude: Option<Magnitude>) -> bool {
        match self {
            ComparisonDefault::Fixed(value) => *value,
            ComparisonDefault::AtLeast(threshold) => magnitude.is_some_and(|m| m >= *threshold),
        }
    }
}

impl Default for ComparisonDefault {
    fn default() -> Self {
        ComparisonDefault::Fixed(false)
    }
}

/// Temporal behavior of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDescriptor {
    pub kind: TemporalKind,
    /// Days after the event date a point entry stays relevant.
    pub tail_days: u32,
    /// Days after the end date a bounded entry stays relevant.
    pub buffer_days: u32,
    pub default_significant: ComparisonDefault,
    /// How far back a comparison lookup searches. Zero excludes the
    /// category from comparison explanations entirely.
    pub comparison_window_days: u32,
    pub description: String,
}

impl CategoryDescriptor {
    pub fn point(
        tail_days: u32,
        default_significant: ComparisonDefault,
        comparison_window_days: u32,
        description: &str,
    ) -> Self {
        Self {
            kind: TemporalKind::Point,
            tail_days,
            buffer_days: 0,
            default_significant,
            comparison_window_days,
            description: description.to_string(),
        }
    }

    pub fn bounded(
        buffer_days: u32,
        default_significant: ComparisonDefault,
        comparison_window_days: u32,
        description: &str,
    ) -> Self {
        Self {
            kind: TemporalKind::Bounded,
            tail_days: 0,
            buffer_days,
            default_significant,
            comparison_window_days,
            description: description.to_string(),
        }
    }

    pub fn persistent(description: &str) -> Self {
        Self {
            kind: TemporalKind::Persistent,
            tail_days: 0,
            buffer_days: 0,
            default_significant: ComparisonDefault::Fixed(false),
            comparison_window_days: 0,
            description: description.to_string(),
        }
    }

    pub fn always(description: &str) -> Self {
        Self {
            kind: TemporalKind::Always,
            ..Self::persistent(description)
        }
    }

    /// Build a descriptor from loosely-typed configuration values.
    ///
    /// `tail_days` and `buffer_days` are only accepted for the kinds they
    /// apply to, so a misconfigured category fails loudly instead of
    /// silently ignoring a value.
    pub fn from_parts(
        category: &str,
        kind: &str,
        tail_days: Option<u32>,
        buffer_days: Option<u32>,
        default_significant: ComparisonDefault,
        comparison_window_days: u32,
        description: &str,
    ) -> Result<Self, RegistryError> {
        let kind: TemporalKind = kind.parse()?;
        if tail_days.is_some() && kind != TemporalKind::Point {
            return Err(RegistryError::TailOnNonPoint {
                category: category.to_string(),
                kind,
            });
        }
        if buffer_days.is_some() && kind != TemporalKind::Bounded {
            return Err(RegistryError::BufferOnNonBounded {
                category: category.to_string(),
                kind,
            });
        }
        Ok(Self {
            kind,
            tail_days: tail_days.unwrap_or(0),
            buffer_days: buffer_days.unwrap_or(0),
            default_significant,
            comparison_window_days,
            description: description.to_string(),
        })
    }
}

/// Immutable mapping from category key to [`CategoryDescriptor`].
///
/// Built once at startup and shared read-only; nothing mutates it after
/// construction, so it can be handed to any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: HashMap<String, CategoryDescriptor>,
    fallback: CategoryDescriptor,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryRegistry {
    /// The built-in category table.
    pub fn builtin() -> Self {
        use ComparisonDefault::{AtLeast, Fixed};
        use Magnitude::{Major, Moderate};

        let entries = [
            (
                "organic_pr_win",
                CategoryDescriptor::point(
                    30,
                    Fixed(true),
                    365,
                    "Press coverage, viral moments, unexpected organic wins",
                ),
            ),
            (
                "influencer",
                CategoryDescriptor::point(
                    21,
                    AtLeast(Major),
                    365,
                    "Influencer partnerships, UGC campaigns, creator content",
                ),
            ),
            (
                "product_launch",
                CategoryDescriptor::point(
                    90,
                    Fixed(true),
                    365,
                    "New product releases, product updates, SKU additions",
                ),
            ),
            (
                "promotion",
                CategoryDescriptor::bounded(
                    14,
                    AtLeast(Major),
                    365,
                    "Sales, discounts, promotional campaigns",
                ),
            ),
            (
                "budget_change",
                CategoryDescriptor::point(
                    7,
                    Fixed(false),
                    0,
                    "Spend adjustments - increased/decreased budget",
                ),
            ),
            (
                "competitor",
                CategoryDescriptor::point(
                    30,
                    AtLeast(Major),
                    365,
                    "Competitor activities, market movements",
                ),
            ),
            (
                "site_issue",
                CategoryDescriptor::bounded(
                    7,
                    AtLeast(Major),
                    365,
                    "Website problems, checkout issues, page errors",
                ),
            ),
            (
                "inventory_issue",
                CategoryDescriptor::bounded(
                    7,
                    AtLeast(Moderate),
                    365,
                    "Stock constraints, out-of-stock events, supply chain problems",
                ),
            ),
            (
                "paid_media_strategy",
                CategoryDescriptor::persistent(
                    "Paid media strategy changes (ABO testing, audience segments, bidding)",
                ),
            ),
            (
                "organic_social_strategy",
                CategoryDescriptor::persistent(
                    "Organic social strategy (posting frequency, content pillars, platform focus)",
                ),
            ),
            (
                "business_strategy",
                CategoryDescriptor::persistent(
                    "Business-level decisions (new markets, pricing, distribution)",
                ),
            ),
            (
                "market_trend",
                CategoryDescriptor::persistent("Industry trends, market shifts"),
            ),
            (
                "standing_condition",
                CategoryDescriptor::persistent(
                    "Chronic/ongoing constraints (inventory limits, shipping delays)",
                ),
            ),
            (
                "brand_details",
                CategoryDescriptor::always("Brand positioning, messaging, target audience, USPs"),
            ),
        ];

        Self {
            categories: entries
                .into_iter()
                .map(|(key, descriptor)| (key.to_string(), descriptor))
                .collect(),
            fallback: builtin_fallback(),
        }
    }

    /// Build a registry from an explicit set of descriptors.
    ///
    /// If no `other` descriptor is supplied the built-in fallback is used.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, CategoryDescriptor)>,
    {
        let registry = Self {
            categories: HashMap::new(),
            fallback: builtin_fallback(),
        };
        registry.with_overrides(descriptors)
    }

    /// Return a new registry with the given descriptors added or replaced.
    pub fn with_overrides<I>(mut self, overrides: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, CategoryDescriptor)>,
    {
        for (key, descriptor) in overrides {
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(RegistryError::EmptyKey);
            }
            if key == FALLBACK_CATEGORY {
                if descriptor.kind != TemporalKind::Point {
                    return Err(RegistryError::FallbackNotPoint(descriptor.kind));
                }
                self.fallback = descriptor;
            } else {
                self.categories.insert(key, descriptor);
            }
        }
        Ok(self)
    }

    fn lookup(&self, category: &str) -> Option<&CategoryDescriptor> {
        if category == FALLBACK_CATEGORY {
            Some(&self.fallback)
        } else {
            self.categories.get(category)
        }
    }

    /// Whether `category` has its own descriptor (the fallback key counts).
    pub fn is_registered(&self, category: &str) -> bool {
        self.lookup(category).is_some()
    }

    /// Descriptor for `category`, or the `other` fallback if unregistered.
    pub fn get_descriptor(&self, category: &str) -> &CategoryDescriptor {
        self.lookup(category).unwrap_or(&self.fallback)
    }

    /// Evaluate the category's default significance for `magnitude`.
    pub fn resolve_comparison_significant(
        &self,
        category: &str,
        magnitude: Option<Magnitude>,
    ) -> bool {
        self.get_descriptor(category)
            .default_significant
            .resolve(magnitude)
    }

    pub fn tail_days(&self, category: &str) -> u32 {
        let descriptor = self.get_descriptor(category);
        match descriptor.kind {
            TemporalKind::Point => descriptor.tail_days,
            _ => 0,
        }
    }

    pub fn buffer_days(&self, category: &str) -> u32 {
        let descriptor = self.get_descriptor(category);
        match descriptor.kind {
            TemporalKind::Bounded => descriptor.buffer_days,
            _ => 0,
        }
    }

    pub fn is_always_included(&self, category: &str) -> bool {
        self.get_descriptor(category).kind == TemporalKind::Always
    }

    pub fn is_persistent(&self, category: &str) -> bool {
        self.get_descriptor(category).kind == TemporalKind::Persistent
    }

    /// Comparison lookback for `category`; zero for unregistered keys.
    pub fn comparison_window_days(&self, category: &str) -> u32 {
        self.lookup(category)
            .map(|d| d.comparison_window_days)
            .unwrap_or(0)
    }

    /// All registered descriptors, sorted by key, fallback included.
    pub fn categories(&self) -> Vec<(&str, &CategoryDescriptor)> {
        let mut all: Vec<(&str, &CategoryDescriptor)> = self
            .categories
            .iter()
            .map(|(k, d)| (k.as_str(), d))
            .collect();
        all.push((FALLBACK_CATEGORY, &self.fallback));
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.categories.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

fn builtin_fallback() -> CategoryDescriptor {
    CategoryDescriptor::point(
        14,
        ComparisonDefault::Fixed(false),
        0,
        "Other significant context",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_fifteen_categories() {
        let registry = CategoryRegistry::builtin();
        assert_eq!(registry.len(), 15);
        assert!(registry.is_registered("promotion"));
        assert!(registry.is_registered("other"));
    }

    #[test]
    fn test_unknown_key_falls_back_to_other() {
        let registry = CategoryRegistry::builtin();
        assert_eq!(
            registry.get_descriptor("totally_unknown_key"),
            registry.get_descriptor("other")
        );
        assert!(!registry.is_registered("totally_unknown_key"));
        assert_eq!(registry.tail_days("totally_unknown_key"), 14);
        assert_eq!(registry.comparison_window_days("totally_unknown_key"), 0);
    }

    #[test]
    fn test_kind_specific_days() {
        let registry = CategoryRegistry::builtin();
        assert_eq!(registry.tail_days("product_launch"), 90);
        assert_eq!(registry.tail_days("promotion"), 0);
        assert_eq!(registry.buffer_days("promotion"), 14);
        assert_eq!(registry.buffer_days("budget_change"), 0);
        assert_eq!(registry.buffer_days("standing_condition"), 0);
    }

    #[test]
    fn test_kind_predicates() {
        let registry = CategoryRegistry::builtin();
        assert!(registry.is_always_included("brand_details"));
        assert!(!registry.is_always_included("promotion"));
        assert!(registry.is_persistent("market_trend"));
        assert!(!registry.is_persistent("brand_details"));
    }

    #[test]
    fn test_magnitude_thresholds() {
        let registry = CategoryRegistry::builtin();
        assert!(registry.resolve_comparison_significant("promotion", Some(Magnitude::Major)));
        assert!(!registry.resolve_comparison_significant("promotion", Some(Magnitude::Moderate)));
        assert!(!registry.resolve_comparison_significant("promotion", None));

        assert!(registry
            .resolve_comparison_significant("inventory_issue", Some(Magnitude::Moderate)));
        assert!(!registry
            .resolve_comparison_significant("inventory_issue", Some(Magnitude::Minor)));

        assert!(registry.resolve_comparison_significant("product_launch", None));
        assert!(!registry.resolve_comparison_significant("budget_change", Some(Magnitude::Major)));
    }

    #[test]
    fn test_overrides_replace_and_add() {
        let registry = CategoryRegistry::builtin()
            .with_overrides([
                (
                    "budget_change".to_string(),
                    CategoryDescriptor::point(3, ComparisonDefault::Fixed(true), 90, "Budget"),
                ),
                (
                    "weather".to_string(),
                    CategoryDescriptor::bounded(
                        2,
                        ComparisonDefault::AtLeast(Magnitude::Moderate),
                        365,
                        "Weather events",
                    ),
                ),
            ])
            .unwrap();
        assert_eq!(registry.tail_days("budget_change"), 3);
        assert_eq!(registry.comparison_window_days("budget_change"), 90);
        assert_eq!(registry.buffer_days("weather"), 2);
        assert_eq!(registry.len(), 16);
    }

    #[test]
    fn test_fallback_must_be_point() {
        let err = CategoryRegistry::builtin()
            .with_overrides([(
                "other".to_string(),
                CategoryDescriptor::persistent("nope"),
            )])
            .unwrap_err();
        assert_eq!(err, RegistryError::FallbackNotPoint(TemporalKind::Persistent));
    }

    #[test]
    fn test_from_parts_validation() {
        let err = CategoryDescriptor::from_parts(
            "launch",
            "bounded",
            Some(10),
            None,
            ComparisonDefault::Fixed(true),
            365,
            "",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::TailOnNonPoint { .. }));

        let err = CategoryDescriptor::from_parts(
            "launch",
            "sometimes",
            None,
            None,
            ComparisonDefault::Fixed(true),
            365,
            "",
        )
        .unwrap_err();
        assert_eq!(err, RegistryError::UnknownKind("sometimes".to_string()));
    }

    #[test]
    fn test_categories_sorted() {
        let registry = CategoryRegistry::builtin();
        let keys: Vec<&str> = registry.categories().iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"other"));
    }
}
