//! Loan application workflow.
//!
//! Applicants submit drafts and list their own applications; the review
//! surface lists every application with its owner and records decisions.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info};

use crate::domain::Error;
use crate::domain::identity::IdentityId;
use crate::domain::loans::{
    AdminLoanView, LoanApplication, LoanDraft, LoanId, LoanProduct, LoanStats, LoanStatus,
    NewLoanApplication, catalogue, compute_stats, newest_first,
};
use crate::domain::ports::LoanStore;

/// Domain service for loan submission and review.
#[derive(Clone)]
pub struct LoanWorkflow<L> {
    loans: Arc<L>,
    clock: Arc<dyn Clock>,
}

impl<L> LoanWorkflow<L> {
    /// Create a workflow over the loan store.
    pub fn new(loans: Arc<L>, clock: Arc<dyn Clock>) -> Self {
        Self { loans, clock }
    }

    /// Loan products with their advertised rates and ranges.
    #[must_use]
    pub fn catalogue(&self) -> &'static [LoanProduct] {
        catalogue()
    }

    /// Aggregate counts over an in-memory list.
    #[must_use]
    pub fn compute_stats(&self, applications: &[LoanApplication]) -> LoanStats {
        compute_stats(applications)
    }
}

impl<L> LoanWorkflow<L>
where
    L: LoanStore,
{
    /// Submit a draft on behalf of `owner_id`.
    ///
    /// The caller must have authenticated `owner_id`. The amount must be
    /// positive but is not checked against the category range; see
    /// [`LoanDraft::within_advertised_range`]. Retrying after a transport
    /// failure may create a duplicate application.
    pub async fn submit(
        &self,
        owner_id: &IdentityId,
        draft: LoanDraft,
    ) -> Result<LoanApplication, Error> {
        if draft.amount == 0 {
            return Err(Error::validation("Loan amount must be greater than zero"));
        }
        if !draft.within_advertised_range() {
            debug!(
                category = %draft.category,
                amount = draft.amount,
                "amount outside advertised range"
            );
        }

        let row = NewLoanApplication {
            owner_id: owner_id.clone(),
            category: draft.category,
            amount: draft.amount,
            period: draft.period,
            status: LoanStatus::PendingReview,
            created_at: self.clock.utc(),
        };
        let application = self.loans.insert(&row).await.map_err(Error::from)?;
        info!(
            loan = %application.id,
            owner = %owner_id,
            category = %application.category,
            "loan application submitted"
        );
        Ok(application)
    }

    /// Applications owned by `owner_id`, newest first.
    pub async fn list_for_owner(
        &self,
        owner_id: &IdentityId,
    ) -> Result<Vec<LoanApplication>, Error> {
        let mut applications = self
            .loans
            .find_by_owner(owner_id)
            .await
            .map_err(Error::from)?;
        applications.sort_by(newest_first);
        Ok(applications)
    }

    /// Every application with its owner's username, newest first.
    pub async fn list_all(&self) -> Result<Vec<AdminLoanView>, Error> {
        let mut views = self
            .loans
            .list_with_owners()
            .await
            .map_err(Error::from)?;
        views.sort_by(|lhs, rhs| newest_first(&lhs.application, &rhs.application));
        Ok(views)
    }

    /// Record a review decision.
    ///
    /// Only `Approved` and `Rejected` are accepted. The current status is not
    /// consulted, so decisions may be repeated or reversed.
    pub async fn set_status(&self, id: LoanId, status: LoanStatus) -> Result<(), Error> {
        if !status.is_review_decision() {
            return Err(Error::validation(format!(
                "Status {status} cannot be set by a reviewer"
            )));
        }
        self.loans
            .update_status(id, status)
            .await
            .map_err(Error::from)?;
        info!(loan = %id, status = %status, "loan application reviewed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "loan_workflow_tests.rs"]
mod tests;
