//! Loan application status and the legacy-synonym normalisation rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Review state of a loan application.
///
/// Wire values are the display labels (`"Pending Review"`, `"Approved"`, ...).
/// Every ingest boundary goes through [`LoanStatus::normalize`], which maps
/// the legacy `"Pending"` label onto [`LoanStatus::PendingReview`].
///
/// # Examples
/// ```
/// use lending::domain::LoanStatus;
///
/// assert_eq!(LoanStatus::normalize("Pending"), Ok(LoanStatus::PendingReview));
/// assert_eq!(LoanStatus::normalize(" approved "), Ok(LoanStatus::Approved));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoanStatus {
    /// Submitted and awaiting a reviewer.
    PendingReview,
    /// Accepted by a reviewer.
    Approved,
    /// Declined by a reviewer.
    Rejected,
    /// Advanced by servicing outside this crate.
    Active,
}

/// Raised when a status label matches no known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown loan status: {label}")]
pub struct UnknownLoanStatus {
    /// Offending label, trimmed.
    pub label: String,
}

impl LoanStatus {
    /// Canonical display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingReview => "Pending Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Active => "Active",
        }
    }

    /// Parse a stored or user-supplied label, folding legacy synonyms.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn normalize(raw: &str) -> Result<Self, UnknownLoanStatus> {
        let label = raw.trim();
        let folded = label.to_ascii_lowercase();
        match folded.as_str() {
            "pending review" | "pending" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "active" => Ok(Self::Active),
            _ => Err(UnknownLoanStatus {
                label: label.to_owned(),
            }),
        }
    }

    /// Counts towards the pending review queue.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::PendingReview)
    }

    /// Counts as approved for statistics; active loans were approved first.
    #[must_use]
    pub const fn counts_as_approved(self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }

    /// Statuses an administrator may set.
    #[must_use]
    pub const fn is_review_decision(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoanStatus {
    type Err = UnknownLoanStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for LoanStatus {
    type Error = UnknownLoanStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<LoanStatus> for String {
    fn from(value: LoanStatus) -> Self {
        value.label().to_owned()
    }
}
