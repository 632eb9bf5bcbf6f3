//! Raw code → canonical category classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use super::{Category, TAXONOMY};

/// Result of classifying one raw code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// Canonical category.
    pub category: Category,
    /// Subcategory within `category`. Synthesized as `"Other {category}"`
    /// for fallback matches.
    pub subcategory: String,
}

impl Classification {
    fn exact(category: Category, subcategory: &'static str) -> Self {
        Self {
            category,
            subcategory: subcategory.to_string(),
        }
    }

    fn fallback(category: Category) -> Self {
        Self {
            category,
            subcategory: format!("Other {}", category),
        }
    }

    fn unmatched() -> Self {
        Self {
            category: Category::Other,
            subcategory: "Other".to_string(),
        }
    }
}

/// Normalise a raw code for lookup: trim, upper-case, collapse inner whitespace.
pub fn normalize_code(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

type ReverseIndex = HashMap<String, (Category, &'static str)>;

fn reverse_index() -> &'static ReverseIndex {
    static INDEX: OnceLock<ReverseIndex> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = HashMap::new();
        for entry in TAXONOMY {
            for (subcategory, codes) in entry.subcategories {
                for code in codes.iter() {
                    // First declaration wins; the taxonomy test rejects duplicates.
                    index
                        .entry(normalize_code(code))
                        .or_insert((entry.category, *subcategory));
                }
            }
        }
        tracing::debug!(codes = index.len(), "category reverse index built");
        index
    })
}

/// Classify a raw class/type code.
///
/// Exact match against the taxonomy first; on a miss, the first category (in
/// declaration order) with a fallback pattern contained in the code wins.
pub fn classify(raw_code: &str) -> Classification {
    let normalized = normalize_code(raw_code);
    if normalized.is_empty() {
        return Classification::unmatched();
    }

    if let Some((category, subcategory)) = reverse_index().get(&normalized) {
        return Classification::exact(*category, subcategory);
    }

    TAXONOMY
        .iter()
        .find(|entry| entry.fallback.iter().any(|p| normalized.contains(p)))
        .map(|entry| Classification::fallback(entry.category))
        .unwrap_or_else(Classification::unmatched)
}
