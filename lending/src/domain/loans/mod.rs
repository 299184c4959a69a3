//! Loan products, applications, and review statistics.

mod application;
mod category;
mod stats;
mod status;

pub(crate) use application::newest_first;
pub use application::{
    AdminLoanView, LoanApplication, LoanDraft, LoanId, NewLoanApplication, UNKNOWN_OWNER,
};
pub use category::{
    InvalidLoanPeriod, LoanCategory, LoanPeriod, LoanProduct, UnknownLoanCategory, catalogue,
};
pub use stats::{LoanStats, compute_stats};
pub use status::{LoanStatus, UnknownLoanStatus};
