//! Loan application records and submission drafts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LoanCategory, LoanPeriod, LoanStatus};
use crate::domain::identity::IdentityId;

/// Owner username shown when the owner's profile row is missing.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Store-assigned, monotonically increasing application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(i64);

impl LoanId {
    /// Wrap an id issued by the loan store.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw value, as used in `id=eq.` filters.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applicant-provided loan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanDraft {
    /// Product the applicant picked.
    pub category: LoanCategory,
    /// Requested principal in whole currency units.
    pub amount: u64,
    /// Repayment term.
    pub period: LoanPeriod,
}

impl LoanDraft {
    /// Whether the amount lies inside the category's advertised range.
    ///
    /// Submission does not enforce this; callers may use it to warn.
    #[must_use]
    pub fn within_advertised_range(&self) -> bool {
        self.category.product().accepts_amount(self.amount)
    }
}

/// Row handed to the loan store for insertion.
///
/// Fields match [`LoanApplication`] minus the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoanApplication {
    /// See [`LoanApplication::owner_id`].
    pub owner_id: IdentityId,
    /// See [`LoanApplication::category`].
    pub category: LoanCategory,
    /// See [`LoanApplication::amount`].
    pub amount: u64,
    /// See [`LoanApplication::period`].
    pub period: LoanPeriod,
    /// Always pending review on submission.
    pub status: LoanStatus,
    /// See [`LoanApplication::created_at`].
    pub created_at: DateTime<Utc>,
}

/// Persisted loan application.
///
/// ## Invariants
/// - Created with [`LoanStatus::PendingReview`]; only moved to `Approved` or
///   `Rejected` by the administrative surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    /// Store-assigned id.
    pub id: LoanId,
    /// Applicant who submitted the request.
    pub owner_id: IdentityId,
    /// Requested product.
    pub category: LoanCategory,
    /// Principal in whole currency units.
    pub amount: u64,
    /// Repayment term.
    pub period: LoanPeriod,
    /// Review state.
    pub status: LoanStatus,
    /// Submission time; the listing sort key.
    pub created_at: DateTime<Utc>,
}

impl LoanApplication {
    /// Attach a store-assigned id to a new row.
    #[must_use]
    pub fn from_new(id: LoanId, row: NewLoanApplication) -> Self {
        Self {
            id,
            owner_id: row.owner_id,
            category: row.category,
            amount: row.amount,
            period: row.period,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Application joined with its owner's username for the review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoanView {
    /// The application itself.
    #[serde(flatten)]
    pub application: LoanApplication,
    /// Owner username, or [`UNKNOWN_OWNER`].
    pub owner_username: String,
}

impl AdminLoanView {
    /// Join an application with an optional owner username.
    #[must_use]
    pub fn new(application: LoanApplication, owner_username: Option<String>) -> Self {
        let owner = owner_username
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_OWNER.to_owned());
        Self {
            application,
            owner_username: owner,
        }
    }
}

/// Newest first; ties broken by id, highest first.
pub(crate) fn newest_first(lhs: &LoanApplication, rhs: &LoanApplication) -> std::cmp::Ordering {
    rhs.created_at
        .cmp(&lhs.created_at)
        .then_with(|| rhs.id.cmp(&lhs.id))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeDelta;
    use rstest::rstest;

    fn application(id: i64, offset_secs: i64) -> LoanApplication {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("timestamp");
        LoanApplication {
            id: LoanId::new(id),
            owner_id: IdentityId::random(),
            category: LoanCategory::MicroEnterprise,
            amount: 15_000,
            period: LoanPeriod::Months12,
            status: LoanStatus::PendingReview,
            created_at: base + TimeDelta::seconds(offset_secs),
        }
    }

    #[rstest]
    #[case(LoanCategory::MicroEnterprise, 15_000, false)]
    #[case(LoanCategory::MicroEnterprise, 50_000, true)]
    #[case(LoanCategory::SmallBusinessPlus, 1_000_000, true)]
    #[case(LoanCategory::EducationExcellence, 100_001, false)]
    fn advisory_range_check(
        #[case] category: LoanCategory,
        #[case] amount: u64,
        #[case] expected: bool,
    ) {
        let draft = LoanDraft {
            category,
            amount,
            period: LoanPeriod::Months12,
        };
        assert_eq!(draft.within_advertised_range(), expected);
    }

    #[rstest]
    fn ordering_prefers_newer_then_higher_id() {
        let mut rows = vec![application(1, 0), application(3, 10), application(2, 10)];
        rows.sort_by(newest_first);
        let ids: Vec<i64> = rows.iter().map(|row| row.id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[rstest]
    #[case(Some("rahim42".to_owned()), "rahim42")]
    #[case(Some("   ".to_owned()), UNKNOWN_OWNER)]
    #[case(None, UNKNOWN_OWNER)]
    fn admin_view_uses_placeholder_for_missing_owner(
        #[case] owner: Option<String>,
        #[case] expected: &str,
    ) {
        let view = AdminLoanView::new(application(1, 0), owner);
        assert_eq!(view.owner_username, expected);
    }
}
