//! Domain primitives, services, and ports.
//!
//! Purpose: model the client session and the loan workflow independently of
//! any transport. Services are generic over the driven ports in [`ports`] and
//! report failures as [`Error`] values tagged with an [`ErrorCode`].
//!
//! Public surface:
//! - [`SessionController`]: login, OTP-gated registration, recovery,
//!   profile bootstrap and completion, logout.
//! - [`LoanWorkflow`]: submission, applicant and reviewer listings, review
//!   decisions, statistics.
//! - Value types for identities, credentials, sessions, and loans.

pub mod auth;
pub mod error;
pub mod identity;
pub mod loans;
pub mod otp;
pub mod ports;
pub mod session;

mod loan_workflow;
mod session_controller;

pub use self::auth::{
    AuthValidationError, LoginCredentials, LoginIdentifier, OtpCode, PASSWORD_MIN_LEN, Password,
    Registration, RegistrationForm,
};
pub use self::error::{Error, ErrorCode};
pub use self::identity::{
    Email, FALLBACK_USERNAME, Identity, IdentityId, IdentityValidationError, Profile,
    ProfileDetails, Username,
};
pub use self::loan_workflow::LoanWorkflow;
pub use self::loans::{
    AdminLoanView, LoanApplication, LoanCategory, LoanDraft, LoanId, LoanPeriod, LoanProduct,
    LoanStats, LoanStatus, NewLoanApplication, UNKNOWN_OWNER, catalogue, compute_stats,
};
pub use self::otp::{DEFAULT_OTP_COOLDOWN, OtpChallenge, ResendTimer};
pub use self::session::{
    ProviderEvent, ProviderSession, Session, SessionEvent, SessionStatus, SessionSubscription,
};
pub use self::session_controller::{INVALID_LOGIN_MESSAGE, SessionController};
