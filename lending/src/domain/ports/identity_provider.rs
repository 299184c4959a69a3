//! Port for the external identity provider.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::auth::{OtpCode, Password};
use crate::domain::identity::Email;
use crate::domain::session::{ProviderEvent, ProviderSession};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// Email/password pair was rejected.
        InvalidCredentials => Auth, "invalid login credentials",
        /// One-time code was wrong or expired.
        InvalidCode => Auth, "one-time code is invalid or has expired",
        /// Operation needs a signed-in provider session.
        NotAuthenticated => Auth, "no active provider session",
        /// The email already belongs to a registered account.
        AlreadyRegistered => Conflict, "User ID or Email already registered",
        /// Provider refused the request for a reason it explained.
        Rejected { message: String } => Validation, "identity provider rejected the request: {message}",
        /// Provider could not be reached or failed internally.
        Transport { message: String } => Transient, "identity provider unavailable: {message}",
    }
}

/// Capability for credential and one-time-code operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an email/password pair for a provider session.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, IdentityProviderError>;

    /// Create the credential, or set the password on an account that a
    /// verified one-time code already created.
    async fn sign_up(
        &self,
        email: &Email,
        password: &Password,
    ) -> Result<ProviderSession, IdentityProviderError>;

    /// Send a one-time code to `email`.
    async fn send_one_time_code(&self, email: &Email) -> Result<(), IdentityProviderError>;

    /// Check a one-time code. Success signs the account in.
    async fn verify_one_time_code(
        &self,
        email: &Email,
        code: &OtpCode,
    ) -> Result<ProviderSession, IdentityProviderError>;

    /// Send a password recovery link.
    async fn send_recovery_email(&self, email: &Email) -> Result<(), IdentityProviderError>;

    /// Replace the password of the signed-in account.
    async fn update_credential(&self, password: &Password) -> Result<(), IdentityProviderError>;

    /// End the provider session.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;

    /// Session persisted by the provider, if any.
    async fn current_session(&self) -> Result<Option<ProviderSession>, IdentityProviderError>;

    /// Stream of provider-side session changes.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::rstest;

    use super::*;
    use crate::domain::{Error, ErrorCode};

    #[rstest]
    #[case(IdentityProviderError::invalid_credentials(), ErrorCode::Auth)]
    #[case(IdentityProviderError::invalid_code(), ErrorCode::Auth)]
    #[case(IdentityProviderError::not_authenticated(), ErrorCode::Auth)]
    #[case(IdentityProviderError::already_registered(), ErrorCode::Conflict)]
    #[case(IdentityProviderError::rejected("weak password"), ErrorCode::Validation)]
    #[case(IdentityProviderError::transport("timeout"), ErrorCode::Transient)]
    fn provider_errors_map_to_domain_codes(
        #[case] err: IdentityProviderError,
        #[case] expected: ErrorCode,
    ) {
        let mapped = Error::from(err);
        assert_eq!(mapped.code(), expected);
    }
}
