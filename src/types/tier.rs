//! Subscription tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::taxonomy::Category;

/// Subscription level, as persisted and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free access.
    #[default]
    None,
    /// Paid access scoped to a single category.
    CategoryPro,
    /// Full paid access.
    Premier,
}

impl Tier {
    /// Parse from the persisted string form.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "free" | "" => Some(Self::None),
            "category_pro" => Some(Self::CategoryPro),
            "premier" => Some(Self::Premier),
            _ => None,
        }
    }

    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CategoryPro => "category_pro",
            Self::Premier => "premier",
        }
    }

    /// Whether this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tier together with the fields that are only meaningful for that tier.
///
/// A `category_pro` subscriber owns at most one category; a `premier`
/// subscriber owns a category set; a free account owns neither.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum TierState {
    /// Free account.
    #[default]
    None,
    /// Single-category subscriber.
    CategoryPro {
        /// Selected category, if one has been picked.
        category: Option<Category>,
        /// When the category last changed (not stamped by the initial pick).
        changed_at: Option<DateTime<Utc>>,
    },
    /// Full-access subscriber.
    Premier {
        /// Categories of interest.
        categories: BTreeSet<Category>,
    },
}

impl TierState {
    /// Fresh state for a newly activated tier.
    pub fn fresh(tier: Tier) -> Self {
        match tier {
            Tier::None => Self::None,
            Tier::CategoryPro => Self::CategoryPro {
                category: None,
                changed_at: None,
            },
            Tier::Premier => Self::Premier {
                categories: BTreeSet::new(),
            },
        }
    }

    /// The bare tier.
    pub fn tier(&self) -> Tier {
        match self {
            Self::None => Tier::None,
            Self::CategoryPro { .. } => Tier::CategoryPro,
            Self::Premier { .. } => Tier::Premier,
        }
    }

    /// Selected category of a `category_pro` subscriber.
    pub fn tier_category(&self) -> Option<Category> {
        match self {
            Self::CategoryPro { category, .. } => *category,
            _ => None,
        }
    }

    /// Last category change of a `category_pro` subscriber.
    pub fn category_changed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::CategoryPro { changed_at, .. } => *changed_at,
            _ => None,
        }
    }

    /// Premier category set (empty otherwise).
    pub fn categories(&self) -> BTreeSet<Category> {
        match self {
            Self::Premier { categories } => categories.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Rebuild from flat persisted columns, discarding fields the tier does
    /// not own.
    pub fn from_columns(
        tier: Tier,
        tier_category: Option<Category>,
        changed_at: Option<DateTime<Utc>>,
        categories: impl IntoIterator<Item = Category>,
    ) -> Self {
        match tier {
            Tier::None => Self::None,
            Tier::CategoryPro => Self::CategoryPro {
                category: tier_category,
                changed_at,
            },
            Tier::Premier => Self::Premier {
                categories: categories.into_iter().collect(),
            },
        }
    }
}
