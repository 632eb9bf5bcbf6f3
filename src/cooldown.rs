//! Category-change cooldown for single-category subscribers.
//!
//! ## States
//!
//! ```text
//!            pick X (free, unstamped)
//!   Unset ───────────────────────────▶ Set(X)
//!                                       │  X again → no-op
//!                                       │  Y ≠ X   → cooldown elapsed?  no → CooldownActive
//!                                       │                      yes → confirmed? no → ConfirmationRequired
//!                                       ▼                                   yes → Set(Y), stamp now
//!                                     Set(Y)
//! ```
//!
//! Pure logic: callers load the stored state, evaluate, and persist the
//! returned outcome. Rejections never imply a mutation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::taxonomy::Category;

/// Minimum interval between category changes, in days.
pub const CATEGORY_COOLDOWN_DAYS: i64 = 7;

/// Minimum interval between category changes.
pub fn category_cooldown() -> Duration {
    Duration::days(CATEGORY_COOLDOWN_DAYS)
}

/// Current selection of a single-category subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryState {
    /// Nothing picked yet.
    Unset,
    /// Category picked.
    Set(Category),
}

impl From<Option<Category>> for CategoryState {
    fn from(c: Option<Category>) -> Self {
        c.map(Self::Set).unwrap_or(Self::Unset)
    }
}

/// A requested category change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Requested category.
    pub requested: Category,
    /// Whether the caller explicitly confirmed the change.
    pub confirmed: bool,
}

/// Accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// First pick. `changed_at` stays as it was.
    Initial(Category),
    /// Same category resubmitted. Nothing to write.
    Unchanged,
    /// Switched categories; `changed_at` must be stamped.
    Changed {
        /// Previous category.
        from: Category,
        /// New category.
        to: Category,
        /// New `category_changed_at`.
        changed_at: DateTime<Utc>,
    },
}

/// Rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRejection {
    /// Last change is less than the cooldown ago.
    CooldownActive {
        /// When the next change becomes possible.
        cooldown_ends_at: DateTime<Utc>,
    },
    /// Cooldown elapsed but the request was not confirmed.
    ConfirmationRequired {
        /// Current category.
        current: Category,
        /// Requested category.
        requested: Category,
    },
}

impl From<ChangeRejection> for AccessError {
    fn from(r: ChangeRejection) -> Self {
        match r {
            ChangeRejection::CooldownActive { cooldown_ends_at } => {
                AccessError::CooldownActive { cooldown_ends_at }
            }
            ChangeRejection::ConfirmationRequired { current, requested } => {
                AccessError::ConfirmationRequired { current, requested }
            }
        }
    }
}

/// Evaluate a change request against the stored state.
pub fn evaluate_change(
    state: CategoryState,
    changed_at: Option<DateTime<Utc>>,
    request: ChangeRequest,
    now: DateTime<Utc>,
) -> Result<ChangeOutcome, ChangeRejection> {
    let current = match state {
        CategoryState::Unset => return Ok(ChangeOutcome::Initial(request.requested)),
        CategoryState::Set(current) => current,
    };

    if current == request.requested {
        return Ok(ChangeOutcome::Unchanged);
    }

    if let Some(last) = changed_at {
        let cooldown_ends_at = last + category_cooldown();
        if now < cooldown_ends_at {
            return Err(ChangeRejection::CooldownActive { cooldown_ends_at });
        }
    }

    if !request.confirmed {
        return Err(ChangeRejection::ConfirmationRequired {
            current,
            requested: request.requested,
        });
    }

    Ok(ChangeOutcome::Changed {
        from: current,
        to: request.requested,
        changed_at: now,
    })
}

/// Whether a change is currently possible, and when the cooldown ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    /// A change would pass the cooldown check now.
    pub can_change: bool,
    /// End of the running cooldown, if one is running.
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

/// Cooldown status at `now` for a stored `changed_at`.
pub fn cooldown_status(changed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownStatus {
    match changed_at.map(|t| t + category_cooldown()) {
        Some(ends) if now < ends => CooldownStatus {
            can_change: false,
            cooldown_ends_at: Some(ends),
        },
        _ => CooldownStatus {
            can_change: true,
            cooldown_ends_at: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
    }

    fn req(requested: Category, confirmed: bool) -> ChangeRequest {
        ChangeRequest { requested, confirmed }
    }

    #[test]
    fn test_initial_pick_needs_no_confirmation() {
        let outcome = evaluate_change(CategoryState::Unset, None, req(Category::Wine, false), now());
        assert_eq!(outcome, Ok(ChangeOutcome::Initial(Category::Wine)));
    }

    #[test]
    fn test_same_category_is_noop_even_in_cooldown() {
        let changed = now() - Duration::days(1);
        let outcome = evaluate_change(
            CategoryState::Set(Category::Wine),
            Some(changed),
            req(Category::Wine, false),
            now(),
        );
        assert_eq!(outcome, Ok(ChangeOutcome::Unchanged));
    }

    #[test]
    fn test_change_inside_cooldown_rejected_with_end_time() {
        let changed = now() - Duration::days(3);
        let outcome = evaluate_change(
            CategoryState::Set(Category::Wine),
            Some(changed),
            req(Category::Beer, true),
            now(),
        );
        assert_eq!(
            outcome,
            Err(ChangeRejection::CooldownActive {
                cooldown_ends_at: changed + Duration::days(7)
            })
        );
    }

    #[test]
    fn test_change_after_cooldown_requires_confirmation() {
        let changed = now() - Duration::days(8);
        let outcome = evaluate_change(
            CategoryState::Set(Category::Wine),
            Some(changed),
            req(Category::Beer, false),
            now(),
        );
        assert_eq!(
            outcome,
            Err(ChangeRejection::ConfirmationRequired {
                current: Category::Wine,
                requested: Category::Beer
            })
        );
    }

    #[test]
    fn test_confirmed_change_stamps_now() {
        let changed = now() - Duration::days(7);
        let outcome = evaluate_change(
            CategoryState::Set(Category::Wine),
            Some(changed),
            req(Category::Beer, true),
            now(),
        );
        assert_eq!(
            outcome,
            Ok(ChangeOutcome::Changed {
                from: Category::Wine,
                to: Category::Beer,
                changed_at: now()
            })
        );
    }

    #[test]
    fn test_first_change_without_stamp_skips_cooldown_but_not_confirmation() {
        let outcome = evaluate_change(
            CategoryState::Set(Category::Wine),
            None,
            req(Category::Gin, false),
            now(),
        );
        assert!(matches!(outcome, Err(ChangeRejection::ConfirmationRequired { .. })));

        let outcome = evaluate_change(CategoryState::Set(Category::Wine), None, req(Category::Gin, true), now());
        assert!(matches!(outcome, Ok(ChangeOutcome::Changed { .. })));
    }

    #[test]
    fn test_cooldown_status() {
        let status = cooldown_status(Some(now() - Duration::days(2)), now());
        assert!(!status.can_change);
        assert_eq!(status.cooldown_ends_at, Some(now() + Duration::days(5)));

        let status = cooldown_status(Some(now() - Duration::days(7)), now());
        assert!(status.can_change);
        assert_eq!(status.cooldown_ends_at, None);

        assert!(cooldown_status(None, now()).can_change);
    }
}
