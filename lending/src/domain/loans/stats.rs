//! Review queue statistics.

use serde::Serialize;

use super::LoanApplication;

/// Aggregate counts shown on the review dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStats {
    /// Every application counted.
    pub total: usize,
    /// Awaiting review, legacy `Pending` included.
    pub pending_count: usize,
    /// `Approved` plus `Active`.
    pub approved_count: usize,
}

/// Count applications by review outcome.
///
/// # Examples
/// ```
/// use lending::domain::{LoanApplication, LoanStats, compute_stats};
///
/// let none: Vec<LoanApplication> = Vec::new();
/// assert_eq!(compute_stats(&none), LoanStats::default());
/// ```
#[must_use]
pub fn compute_stats<'a, I>(applications: I) -> LoanStats
where
    I: IntoIterator<Item = &'a LoanApplication>,
{
    applications
        .into_iter()
        .fold(LoanStats::default(), |mut stats, application| {
            stats.total += 1;
            if application.status.is_pending() {
                stats.pending_count += 1;
            }
            if application.status.counts_as_approved() {
                stats.approved_count += 1;
            }
            stats
        })
}
