//! Core data types.

pub mod filing;
pub mod preference;
pub mod tier;

pub use filing::{FilingRecord, FilingStatus, Signal};
pub use preference::{generate_token, normalize_email, UserPreference};
pub use tier::{Tier, TierState};
