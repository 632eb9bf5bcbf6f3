//! Canonical category taxonomy and raw-code classification.
//!
//! Raw regulatory class/type codes (e.g. `"KENTUCKY STRAIGHT BOURBON WHISKY"`)
//! are mapped onto a two-level `{category, subcategory}` taxonomy.
//!
//! ## Matching
//!
//! ```text
//! raw code → normalize → exact reverse index ──hit──▶ {category, subcategory}
//!                              │
//!                             miss
//!                              ▼
//!            categories in declaration order, patterns in list order
//!            first substring hit ──▶ {category, "Other {category}"}
//!                              │
//!                           no hit ──▶ {Other, "Other"}
//! ```
//!
//! The fallback is first-match-wins, so overlapping substrings resolve by
//! order. `"GINGER LIQUEUR"` is not in the exact table and contains `GIN`;
//! because `Gin` is declared before `Liqueur` it classifies as Gin.

pub mod classifier;
pub mod data;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use classifier::{classify, normalize_code, Classification};
pub use data::{CategoryEntry, TAXONOMY};

/// Canonical top-level category.
///
/// Variant order matches taxonomy declaration order, with `Other` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Bourbon, rye, scotch and other whiskies.
    Whiskey,
    /// Tequila, mezcal and agave spirits.
    Tequila,
    /// Vodka.
    Vodka,
    /// Gin and genever.
    Gin,
    /// Rum and cachaça.
    Rum,
    /// Grape and fruit brandies.
    Brandy,
    /// Cordials, liqueurs, schnapps.
    Liqueur,
    /// Prepared spirit cocktails.
    Cocktails,
    /// Still, sparkling, dessert and fruit wines.
    Wine,
    /// Beer and malt beverages.
    Beer,
    /// Anything the taxonomy cannot place.
    Other,
}

impl Category {
    /// Every category a subscriber can select, in declaration order.
    pub const SELECTABLE: [Category; 10] = [
        Self::Whiskey,
        Self::Tequila,
        Self::Vodka,
        Self::Gin,
        Self::Rum,
        Self::Brandy,
        Self::Liqueur,
        Self::Cocktails,
        Self::Wine,
        Self::Beer,
    ];

    /// Parse a category name, case-insensitively.
    ///
    /// Accepts the `Whisky` spelling. Returns `None` for unknown names.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "whiskey" | "whisky" => Some(Self::Whiskey),
            "tequila" => Some(Self::Tequila),
            "vodka" => Some(Self::Vodka),
            "gin" => Some(Self::Gin),
            "rum" => Some(Self::Rum),
            "brandy" => Some(Self::Brandy),
            "liqueur" => Some(Self::Liqueur),
            "cocktails" => Some(Self::Cocktails),
            "wine" => Some(Self::Wine),
            "beer" => Some(Self::Beer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whiskey => "Whiskey",
            Self::Tequila => "Tequila",
            Self::Vodka => "Vodka",
            Self::Gin => "Gin",
            Self::Rum => "Rum",
            Self::Brandy => "Brandy",
            Self::Liqueur => "Liqueur",
            Self::Cocktails => "Cocktails",
            Self::Wine => "Wine",
            Self::Beer => "Beer",
            Self::Other => "Other",
        }
    }

    /// Taxonomy entry for this category. `None` for [`Category::Other`].
    pub fn entry(&self) -> Option<&'static CategoryEntry> {
        TAXONOMY.iter().find(|e| e.category == *self)
    }

    /// Subcategory names, in declaration order.
    pub fn subcategories(&self) -> Vec<&'static str> {
        self.entry()
            .map(|e| e.subcategories.iter().map(|(name, _)| *name).collect())
            .unwrap_or_default()
    }

    /// Every raw code mapped to this category.
    pub fn codes(&self) -> Vec<&'static str> {
        self.entry()
            .map(|e| {
                e.subcategories
                    .iter()
                    .flat_map(|(_, codes)| codes.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raw codes of one subcategory (case-insensitive name match).
    pub fn subcategory_codes(&self, subcategory: &str) -> Option<&'static [&'static str]> {
        self.entry()?
            .subcategories
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(subcategory.trim()))
            .map(|(_, codes)| *codes)
    }

    /// Ordered fallback patterns.
    pub fn fallback_patterns(&self) -> &'static [&'static str] {
        self.entry().map(|e| e.fallback).unwrap_or(&[])
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
