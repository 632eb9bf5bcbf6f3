//! Typed filter predicates.
//!
//! Each filter kind is one [`Predicate`] variant. A predicate renders to a
//! SQL fragment whose text contains only column names, operators and `$n`
//! placeholders; every caller-supplied value travels in the parameter list.
//!
//! ```text
//! Predicate::Search("o'brien")  →  (brand_name ILIKE $1 OR ... )   params: ["%o'brien%"]
//! Predicate::Category(Wine)     →  (UPPER(class_type_code) = ANY($2) OR (NOT ... AND ... ILIKE ANY($4) ...))
//! ```
//!
//! The same predicate evaluates in memory via [`Predicate::matches`] with the
//! semantics the SQL has, so every record store agrees on results.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::taxonomy::{normalize_code, Category};
use crate::types::{FilingRecord, FilingStatus, Signal};

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// Text value.
    Text(String),
    /// Integer value.
    Int(i32),
    /// Text array, compared with `= ANY(..)` or `ILIKE ANY(..)`.
    TextList(Vec<String>),
}

/// Year and month, compared as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
}

impl YearMonth {
    /// Parse `YYYY-MM` or `YYYY-MM-DD` (the day is ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u32 = parts.next()?.parse().ok()?;
        if let Some(day) = parts.next() {
            let day: u32 = day.parse().ok()?;
            if !(1..=31).contains(&day) {
                return None;
            }
        }
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Case-insensitive substring over brand, fanciful name, company and id.
    Search(String),
    /// Origin code equality (case-insensitive).
    Origin(String),
    /// Status equality.
    Status(FilingStatus),
    /// Signal equality.
    Signal(Signal),
    /// Raw class/type code equality (normalised).
    ClassTypeCode(String),
    /// Raw code places in the category the way `classify` would place it.
    /// `Other` matches codes no selectable category claims.
    Category(Category),
    /// Raw code equals one of the subcategory's codes.
    Subcategory {
        /// Owning category.
        category: Category,
        /// Subcategory name as declared in the taxonomy.
        subcategory: String,
    },
    /// Approval year/month window, inclusive on both ends.
    DateRange {
        /// Lower bound.
        from: Option<YearMonth>,
        /// Upper bound.
        to: Option<YearMonth>,
    },
}

/// Columns the free-text search spans.
pub const SEARCH_COLUMNS: [&str; 4] = ["brand_name", "fanciful_name", "company_name", "ttb_id"];

/// Collects bound parameters and hands out placeholders.
#[derive(Debug, Default)]
pub struct ParamSink {
    params: Vec<SqlParam>,
}

impl ParamSink {
    /// Bind a value; returns its placeholder (`$n`).
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// Consume the sink.
    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }

    /// Number of parameters bound so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether nothing has been bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Escape `LIKE` metacharacters so caller text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Match terms for a selectable category, ordered the way `classify` reads
/// the taxonomy.
///
/// A code listed in the taxonomy belongs to the category that lists it. Any
/// other code belongs to the first category, in declaration order, with a
/// fallback pattern it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTerms {
    /// The category's own taxonomy codes, matched exactly.
    pub codes: Vec<String>,
    /// The category's fallback patterns, matched as substrings.
    pub patterns: Vec<String>,
    /// Fallback patterns of every category declared earlier.
    pub preceding: Vec<String>,
}

impl CategoryTerms {
    /// Whether an upper-cased raw code falls in the category.
    pub fn matches(&self, code_upper: &str) -> bool {
        if self.codes.iter().any(|c| c == code_upper) {
            return true;
        }
        !is_taxonomy_code(code_upper)
            && contains_any(code_upper, &self.patterns)
            && !contains_any(code_upper, &self.preceding)
    }
}

/// Terms for a selectable category.
pub fn category_terms(category: Category) -> CategoryTerms {
    let normalized = |c: &Category| -> Vec<String> {
        c.fallback_patterns().iter().map(|p| normalize_code(p)).collect()
    };
    CategoryTerms {
        codes: category.codes().iter().map(|c| normalize_code(c)).collect(),
        patterns: normalized(&category),
        preceding: Category::SELECTABLE
            .iter()
            .take_while(|c| **c != category)
            .flat_map(normalized)
            .collect(),
    }
}

/// Every taxonomy code, normalised.
fn taxonomy_codes() -> &'static [String] {
    static CODES: OnceLock<Vec<String>> = OnceLock::new();
    CODES.get_or_init(|| {
        Category::SELECTABLE
            .iter()
            .flat_map(|c| c.codes())
            .map(normalize_code)
            .collect()
    })
}

/// Every fallback pattern, normalised.
fn all_patterns() -> Vec<String> {
    Category::SELECTABLE
        .iter()
        .flat_map(|c| c.fallback_patterns().iter().map(|p| normalize_code(p)))
        .collect()
}

fn is_taxonomy_code(code_upper: &str) -> bool {
    taxonomy_codes().iter().any(|c| c == code_upper)
}

fn contains_any(code_upper: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| code_upper.contains(p.as_str()))
}

fn like_patterns(patterns: &[String]) -> SqlParam {
    SqlParam::TextList(patterns.iter().map(|p| format!("%{}%", escape_like(p))).collect())
}

impl Predicate {
    /// Render the SQL fragment, binding values into `sink`.
    pub fn to_sql(&self, sink: &mut ParamSink) -> String {
        match self {
            Self::Search(text) => {
                let p = sink.bind(SqlParam::Text(format!("%{}%", escape_like(text))));
                let ors: Vec<String> = SEARCH_COLUMNS
                    .iter()
                    .map(|c| format!("{} ILIKE {}", c, p))
                    .collect();
                format!("({})", ors.join(" OR "))
            }
            Self::Origin(origin) => {
                let p = sink.bind(SqlParam::Text(origin.trim().to_uppercase()));
                format!("UPPER(origin_code) = {}", p)
            }
            Self::Status(status) => {
                let p = sink.bind(SqlParam::Text(status.as_str().to_string()));
                format!("UPPER(status) = {}", p)
            }
            Self::Signal(signal) => {
                let p = sink.bind(SqlParam::Text(signal.as_str().to_string()));
                format!("UPPER(signal) = {}", p)
            }
            Self::ClassTypeCode(code) => {
                let p = sink.bind(SqlParam::Text(normalize_code(code)));
                format!("UPPER(class_type_code) = {}", p)
            }
            Self::Category(Category::Other) => {
                let codes = sink.bind(SqlParam::TextList(taxonomy_codes().to_vec()));
                let patterns = sink.bind(like_patterns(&all_patterns()));
                format!(
                    "(NOT UPPER(class_type_code) = ANY({codes}) \
                     AND NOT class_type_code ILIKE ANY({patterns}))"
                )
            }
            Self::Category(category) => category_sql(*category, sink),
            Self::Subcategory { category, subcategory } => {
                let codes = category.subcategory_codes(subcategory).unwrap_or(&[]);
                if codes.is_empty() {
                    return "FALSE".to_string();
                }
                let ors: Vec<String> = codes
                    .iter()
                    .map(|code| {
                        let p = sink.bind(SqlParam::Text(normalize_code(code)));
                        format!("UPPER(class_type_code) = {}", p)
                    })
                    .collect();
                format!("({})", ors.join(" OR "))
            }
            Self::DateRange { from, to } => {
                let mut parts = Vec::new();
                if let Some(from) = from {
                    let y = sink.bind(SqlParam::Int(from.year));
                    let m = sink.bind(SqlParam::Int(from.month as i32));
                    parts.push(format!(
                        "(approval_year > {y} OR (approval_year = {y} AND approval_month >= {m}))"
                    ));
                }
                if let Some(to) = to {
                    let y = sink.bind(SqlParam::Int(to.year));
                    let m = sink.bind(SqlParam::Int(to.month as i32));
                    parts.push(format!(
                        "(approval_year < {y} OR (approval_year = {y} AND approval_month <= {m}))"
                    ));
                }
                if parts.is_empty() {
                    "TRUE".to_string()
                } else {
                    parts.join(" AND ")
                }
            }
        }
    }

    /// Evaluate against a record in memory.
    pub fn matches(&self, record: &FilingRecord) -> bool {
        match self {
            Self::Search(text) => {
                let needle = text.to_lowercase();
                [
                    Some(record.brand_name.as_str()),
                    record.fanciful_name.as_deref(),
                    Some(record.company_name.as_str()),
                    Some(record.ttb_id.as_str()),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            Self::Origin(origin) => record.origin_code.trim().to_uppercase() == origin.trim().to_uppercase(),
            Self::Status(status) => record.status == *status,
            Self::Signal(signal) => record.signal == *signal,
            Self::ClassTypeCode(code) => {
                record.class_type_code.to_uppercase() == normalize_code(code)
            }
            Self::Category(Category::Other) => {
                let code = record.class_type_code.to_uppercase();
                !is_taxonomy_code(&code) && !contains_any(&code, &all_patterns())
            }
            Self::Category(category) => {
                category_terms(*category).matches(&record.class_type_code.to_uppercase())
            }
            Self::Subcategory { category, subcategory } => {
                let code = record.class_type_code.to_uppercase();
                category
                    .subcategory_codes(subcategory)
                    .unwrap_or(&[])
                    .iter()
                    .any(|c| normalize_code(c) == code)
            }
            Self::DateRange { from, to } => {
                let ym = YearMonth {
                    year: record.approval_year(),
                    month: record.approval_month(),
                };
                from.map_or(true, |f| ym >= f) && to.map_or(true, |t| ym <= t)
            }
        }
    }
}

fn category_sql(category: Category, sink: &mut ParamSink) -> String {
    let terms = category_terms(category);
    let own = sink.bind(SqlParam::TextList(terms.codes));
    let known = sink.bind(SqlParam::TextList(taxonomy_codes().to_vec()));
    let patterns = sink.bind(like_patterns(&terms.patterns));
    let preceding = sink.bind(like_patterns(&terms.preceding));
    format!(
        "(UPPER(class_type_code) = ANY({own}) \
         OR (NOT UPPER(class_type_code) = ANY({known}) \
         AND class_type_code ILIKE ANY({patterns}) \
         AND NOT class_type_code ILIKE ANY({preceding})))"
    )
}
