//! Filing records served by the API.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market signal attached to a filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// First filing from the company.
    NewCompany,
    /// First filing for the brand.
    NewBrand,
    /// New product under an existing brand.
    NewSku,
    /// Re-filing of an existing label.
    Refile,
    /// Unrecognised upstream value.
    Unknown,
}

impl Signal {
    /// Parse from string; unknown values map to [`Signal::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "NEW_COMPANY" => Self::NewCompany,
            "NEW_BRAND" => Self::NewBrand,
            "NEW_SKU" => Self::NewSku,
            "REFILE" => Self::Refile,
            _ => Self::Unknown,
        }
    }

    /// Strict parse for filters.
    pub fn from_str(s: &str) -> Option<Self> {
        match Self::parse(s) {
            Self::Unknown => None,
            other => Some(other),
        }
    }

    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewCompany => "NEW_COMPANY",
            Self::NewBrand => "NEW_BRAND",
            Self::NewSku => "NEW_SKU",
            Self::Refile => "REFILE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Regulatory status of a filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    /// Approved.
    Approved,
    /// Surrendered by the applicant.
    Surrendered,
    /// Expired.
    Expired,
    /// Revoked by the regulator.
    Revoked,
    /// Unrecognised upstream value.
    Unknown,
}

impl FilingStatus {
    /// Parse from string; unknown values map to [`FilingStatus::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "APPROVED" => Self::Approved,
            "SURRENDERED" => Self::Surrendered,
            "EXPIRED" => Self::Expired,
            "REVOKED" => Self::Revoked,
            _ => Self::Unknown,
        }
    }

    /// Strict parse for filters.
    pub fn from_str(s: &str) -> Option<Self> {
        match Self::parse(s) {
            Self::Unknown => None,
            other => Some(other),
        }
    }

    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Surrendered => "SURRENDERED",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single label-approval filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    /// Regulator-assigned identifier.
    pub ttb_id: String,
    /// Brand name.
    pub brand_name: String,
    /// Fanciful (product) name.
    pub fanciful_name: Option<String>,
    /// Applicant company.
    pub company_name: String,
    /// Raw class/type code.
    pub class_type_code: String,
    /// Origin code (state or country).
    pub origin_code: String,
    /// Approval date.
    pub approval_date: NaiveDate,
    /// Status.
    pub status: FilingStatus,
    /// Market signal.
    pub signal: Signal,
    /// Times this label has been re-filed.
    pub refile_count: i32,
}

impl FilingRecord {
    /// Approval year, matching the store's `approval_year` column.
    pub fn approval_year(&self) -> i32 {
        self.approval_date.year()
    }

    /// Approval month (1-12), matching the store's `approval_month` column.
    pub fn approval_month(&self) -> u32 {
        self.approval_date.month()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_parse_is_lenient() {
        assert_eq!(Signal::parse("new brand"), Signal::NewBrand);
        assert_eq!(Signal::parse("new-sku"), Signal::NewSku);
        assert_eq!(Signal::parse("mystery"), Signal::Unknown);
        assert_eq!(Signal::from_str("mystery"), None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(FilingStatus::parse("approved"), FilingStatus::Approved);
        assert_eq!(FilingStatus::from_str("pending"), None);
    }
}
