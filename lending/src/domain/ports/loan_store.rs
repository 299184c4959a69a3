//! Port for loan application persistence.

use async_trait::async_trait;

use crate::domain::identity::IdentityId;
use crate::domain::loans::{AdminLoanView, LoanApplication, LoanId, LoanStatus, NewLoanApplication};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by loan store adapters.
    pub enum LoanStoreError {
        /// Store connection could not be established or timed out.
        Connection { message: String } => Transient, "loan store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => Transient, "loan store query failed: {message}",
        /// No application with the given id.
        Missing { id: i64 } => NotFound, "loan application {id} not found",
        /// A stored row could not be decoded.
        Corrupt { message: String } => Transient, "loan store returned an unreadable row: {message}",
    }
}

/// Loan application persistence capability.
///
/// Rows are never deleted and there is no row locking; concurrent status
/// updates resolve as last write wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Persist a new application and return it with its assigned id.
    async fn insert(&self, row: &NewLoanApplication) -> Result<LoanApplication, LoanStoreError>;

    /// Applications owned by `owner`, in no particular order.
    async fn find_by_owner(
        &self,
        owner: &IdentityId,
    ) -> Result<Vec<LoanApplication>, LoanStoreError>;

    /// Every application joined with its owner's username.
    async fn list_with_owners(&self) -> Result<Vec<AdminLoanView>, LoanStoreError>;

    /// Overwrite the status of one application.
    async fn update_status(&self, id: LoanId, status: LoanStatus) -> Result<(), LoanStoreError>;
}
