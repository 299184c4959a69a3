//! Session lifecycle service.
//!
//! The controller owns the client [`Session`] and drives it through the
//! identity provider: login by email or username, OTP-gated registration,
//! password recovery, profile bootstrap, and logout. Provider events are
//! drained before every operation so out-of-band changes (a recovery link
//! being opened, a remote sign-out) are applied in order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::domain::auth::{
    LoginCredentials, LoginIdentifier, OtpCode, Password, Registration, RegistrationForm,
};
use crate::domain::identity::{Email, Identity, Profile, ProfileDetails};
use crate::domain::otp::{DEFAULT_OTP_COOLDOWN, OtpChallenge, ResendTimer};
use crate::domain::ports::{IdentityProvider, IdentityProviderError, ProfileStore};
use crate::domain::session::{
    ProviderEvent, ProviderSession, Session, SessionEvent, SessionListeners, SessionStatus,
    SessionSubscription,
};
use crate::domain::{Error, ErrorCode};

/// Single message for unknown usernames and rejected credentials.
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid User ID/Email or password";

const AUTH_IN_PROGRESS_MESSAGE: &str = "authentication already in progress";
const INVALID_CODE_MESSAGE: &str = "Invalid or expired verification code";

#[derive(Debug, Default)]
struct ControllerState {
    session: Session,
    challenges: HashMap<Email, OtpChallenge>,
}

/// Domain service owning the client session.
pub struct SessionController<P, S> {
    provider: Arc<P>,
    profiles: Arc<S>,
    clock: Arc<dyn Clock>,
    otp_cooldown: Duration,
    state: Mutex<ControllerState>,
    events: Mutex<broadcast::Receiver<ProviderEvent>>,
    listeners: SessionListeners,
}

impl<P, S> SessionController<P, S>
where
    P: IdentityProvider,
    S: ProfileStore,
{
    /// Create an anonymous controller subscribed to provider events.
    pub fn new(provider: Arc<P>, profiles: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let events = provider.subscribe();
        Self {
            provider,
            profiles,
            clock,
            otp_cooldown: DEFAULT_OTP_COOLDOWN,
            state: Mutex::new(ControllerState::default()),
            events: Mutex::new(events),
            listeners: SessionListeners::default(),
        }
    }

    /// Override the resend cooldown applied to new OTP challenges.
    #[must_use]
    pub fn with_otp_cooldown(mut self, cooldown: Duration) -> Self {
        self.otp_cooldown = cooldown;
        self
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current_session(&self) -> Session {
        self.lock_state().session.clone()
    }

    /// Status of the current session.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock_state().session.status()
    }

    /// Register a handler for session transitions.
    pub fn on_session_event<F>(&self, handler: F) -> SessionSubscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(handler)
    }

    /// Restore a session the provider already holds.
    ///
    /// Provider failures leave the session anonymous.
    pub async fn initialize(&self) -> Session {
        self.sync_provider_events();
        if self.status() == SessionStatus::RecoveryPending {
            return self.current_session();
        }

        match self.provider.current_session().await {
            Ok(Some(provider_session)) => self.bootstrap(provider_session).await,
            Ok(None) => self.transition(Session::anonymous()),
            Err(err) => {
                warn!(error = %err, "could not restore provider session");
                self.transition(Session::anonymous())
            }
        }
    }

    /// Apply queued provider events to the session.
    ///
    /// Recovery links move the session to `recovery-pending`; remote
    /// sign-outs reset it to anonymous. Other events are informational.
    pub fn sync_provider_events(&self) {
        loop {
            let next = {
                let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
                events.try_recv()
            };
            match next {
                Ok(event) => self.apply_provider_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "provider event stream lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn apply_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::PasswordRecoveryRequested(provider_session) => {
                info!(identity = %provider_session.identity_id, "password recovery link opened");
                self.transition(Session::recovery_pending());
            }
            ProviderEvent::SignedOut => {
                if self.status() != SessionStatus::Anonymous {
                    info!("provider signed the session out");
                }
                self.transition(Session::anonymous());
            }
            ProviderEvent::SignedIn(provider_session) => {
                debug!(identity = %provider_session.identity_id, "provider sign-in observed");
            }
            ProviderEvent::CredentialUpdated => debug!("provider credential update observed"),
        }
    }

    /// Authenticate with an email or username and a password.
    ///
    /// # Errors
    /// - `Validation` for blank inputs or a malformed email.
    /// - `Auth` with [`INVALID_LOGIN_MESSAGE`] for unknown usernames and
    ///   rejected credentials.
    /// - `Conflict` while another login or registration is in flight.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session, Error> {
        self.sync_provider_events();
        let credentials =
            LoginCredentials::try_from_parts(identifier, password).map_err(invalid_input)?;
        let previous = self.begin_authentication()?;

        match self.authenticate(&credentials).await {
            Ok(provider_session) => Ok(self.bootstrap(provider_session).await),
            Err(err) => {
                debug!(code = err.code().as_str(), "login failed");
                self.transition(previous);
                Err(err)
            }
        }
    }

    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<ProviderSession, Error> {
        let email = match credentials.identifier() {
            LoginIdentifier::Email(email) => email.clone(),
            LoginIdentifier::Username(username) => self
                .profiles
                .find_by_username(username)
                .await
                .map_err(Error::from)?
                .map(|profile| profile.email)
                .ok_or_else(|| Error::auth(INVALID_LOGIN_MESSAGE))?,
        };

        self.provider
            .sign_in_with_password(&email, credentials.password())
            .await
            .map_err(|err| match err {
                IdentityProviderError::InvalidCredentials => Error::auth(INVALID_LOGIN_MESSAGE),
                other => Error::from(other),
            })
    }

    /// Create an account for an email whose OTP challenge was verified.
    ///
    /// Runs the username uniqueness check, then creates or updates the
    /// provider credential, then upserts the profile row. A profile failure
    /// is returned but the credential is left in place.
    pub async fn register(&self, form: RegistrationForm) -> Result<Identity, Error> {
        self.sync_provider_events();
        let registration = Registration::try_from_form(form).map_err(invalid_input)?;
        if !self.challenge_verified(registration.email()) {
            return Err(Error::validation(
                "Verify the code sent to your email before registering",
            ));
        }
        let previous = self.begin_authentication()?;

        match self.create_account(&registration).await {
            Ok(identity) => {
                self.lock_state().challenges.remove(registration.email());
                info!(identity = %identity.id(), username = %identity.username(), "registration complete");
                self.transition(Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                self.transition(previous);
                Err(err)
            }
        }
    }

    async fn create_account(&self, registration: &Registration) -> Result<Identity, Error> {
        let taken = self
            .profiles
            .count_by_username(registration.username())
            .await
            .map_err(Error::from)?;
        if taken > 0 {
            return Err(Error::conflict(format!(
                "Username {} is already taken",
                registration.username()
            )));
        }

        let provider_session = self
            .provider
            .sign_up(registration.email(), registration.password())
            .await
            .map_err(Error::from)?;
        if provider_session
            .email
            .as_ref()
            .is_some_and(|email| email != registration.email())
        {
            warn!(
                identity = %provider_session.identity_id,
                "provider returned a different account for registration"
            );
            return Err(Error::conflict(
                "The signed-in account does not match the registration email",
            ));
        }

        let profile = Profile {
            id: provider_session.identity_id,
            username: registration.username().clone(),
            email: registration.email().clone(),
            details: ProfileDetails {
                full_name: registration.full_name().map(ToOwned::to_owned),
                ..ProfileDetails::default()
            },
        };
        if let Err(err) = self.profiles.upsert(&profile).await {
            warn!(
                identity = %profile.id,
                error = %err,
                "credential created but profile row could not be written"
            );
            return Err(Error::from(err));
        }
        Ok(Identity::from_profile(profile))
    }

    /// Send a one-time code and start the resend cooldown.
    ///
    /// A pending, unverified challenge for the same email blocks a resend
    /// until its timer reaches zero.
    pub async fn send_otp(&self, email: &str) -> Result<OtpChallenge, Error> {
        self.sync_provider_events();
        let address = Email::new(email).map_err(invalid_input)?;
        let now = self.clock.utc();
        if let Some(timer) = self.pending_timer(&address, now) {
            if !timer.can_resend() {
                return Err(Error::validation(format!(
                    "Wait {} seconds before requesting another code",
                    timer.remaining_secs()
                )));
            }
        }

        self.provider
            .send_one_time_code(&address)
            .await
            .map_err(Error::from)?;

        let challenge = OtpChallenge::issue(address.clone(), now, self.otp_cooldown);
        self.lock_state()
            .challenges
            .insert(address, challenge.clone());
        Ok(challenge)
    }

    /// Check a six-digit code; marks the challenge verified on success.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), Error> {
        self.sync_provider_events();
        let address = Email::new(email).map_err(invalid_input)?;
        let otp = OtpCode::parse(code).map_err(invalid_input)?;

        self.provider
            .verify_one_time_code(&address, &otp)
            .await
            .map_err(|err| match err {
                IdentityProviderError::InvalidCode => Error::auth(INVALID_CODE_MESSAGE),
                other => Error::from(other),
            })?;

        let now = self.clock.utc();
        let mut state = self.lock_state();
        state
            .challenges
            .entry(address.clone())
            .or_insert_with(|| OtpChallenge::issue(address, now, self.otp_cooldown))
            .mark_verified();
        Ok(())
    }

    /// Resend countdown for the challenge issued to `email`, if any.
    #[must_use]
    pub fn resend_timer(&self, email: &str) -> Option<ResendTimer> {
        let address = Email::new(email).ok()?;
        self.pending_timer(&address, self.clock.utc())
    }

    fn pending_timer(&self, email: &Email, now: DateTime<Utc>) -> Option<ResendTimer> {
        self.lock_state()
            .challenges
            .get(email)
            .filter(|challenge| !challenge.is_verified())
            .map(|challenge| challenge.resend_timer(now))
    }

    fn challenge_verified(&self, email: &Email) -> bool {
        self.lock_state()
            .challenges
            .get(email)
            .is_some_and(OtpChallenge::is_verified)
    }

    /// Ask the provider to send a recovery link.
    ///
    /// Succeeds for any well-formed email so callers cannot probe which
    /// addresses have accounts.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        self.sync_provider_events();
        let address = Email::new(email).map_err(invalid_input)?;
        if let Err(err) = self.provider.send_recovery_email(&address).await {
            warn!(error = %err, "recovery email request failed");
        }
        Ok(())
    }

    /// Replace the password, then sign out so the next login uses it.
    ///
    /// # Errors
    /// - `Auth` unless the session is authenticated or recovery-pending.
    /// - `Validation` for passwords shorter than six characters.
    pub async fn update_password(&self, new_password: &str) -> Result<(), Error> {
        self.sync_provider_events();
        if !matches!(
            self.status(),
            SessionStatus::Authenticated | SessionStatus::RecoveryPending
        ) {
            return Err(Error::auth(
                "Sign in or open the recovery link before changing your password",
            ));
        }
        let password = Password::with_min_length(new_password).map_err(invalid_input)?;

        self.provider
            .update_credential(&password)
            .await
            .map_err(Error::from)?;
        info!("password updated; signing out");
        self.sign_out_quietly().await;
        self.transition(Session::anonymous());
        Ok(())
    }

    /// Load the profile row and authenticate the session with it.
    ///
    /// A missing row or a store failure degrades to a minimal identity built
    /// from the provider session.
    pub async fn bootstrap(&self, provider_session: ProviderSession) -> Session {
        let ProviderSession { identity_id, email } = provider_session;
        let identity = match self.profiles.find_by_id(&identity_id).await {
            Ok(Some(profile)) => Identity::from_profile(profile),
            Ok(None) => {
                debug!(identity = %identity_id, "no profile row; using minimal identity");
                Identity::minimal(identity_id, email)
            }
            Err(err) => {
                warn!(identity = %identity_id, error = %err, "profile lookup failed; using minimal identity");
                Identity::minimal(identity_id, email)
            }
        };
        self.transition(Session::authenticated(identity))
    }

    /// Sign out at the provider and reset to anonymous.
    pub async fn logout(&self) {
        self.sync_provider_events();
        self.sign_out_quietly().await;
        self.transition(Session::anonymous());
    }

    async fn sign_out_quietly(&self) {
        if let Err(err) = self.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed");
        }
    }

    /// Save profile attributes for the signed-in identity.
    pub async fn complete_profile(&self, details: ProfileDetails) -> Result<Identity, Error> {
        self.sync_provider_events();
        let identity_id = self
            .current_session()
            .identity()
            .map(|identity| identity.id().clone())
            .ok_or_else(|| Error::auth("Sign in to complete your profile"))?;
        let normalized = details.normalized();
        if normalized
            .date_of_birth
            .is_some_and(|born| born > self.clock.utc().date_naive())
        {
            return Err(Error::validation("Date of birth cannot be in the future"));
        }

        let profile = self
            .profiles
            .update_details(&identity_id, &normalized)
            .await
            .map_err(Error::from)?;
        let identity = Identity::from_profile(profile);
        self.transition(Session::authenticated(identity.clone()));
        Ok(identity)
    }

    /// Enter `authenticating`, returning the session to restore on failure.
    fn begin_authentication(&self) -> Result<Session, Error> {
        let previous = {
            let mut state = self.lock_state();
            if state.session.status() == SessionStatus::Authenticating {
                return Err(Error::conflict(AUTH_IN_PROGRESS_MESSAGE));
            }
            std::mem::replace(&mut state.session, Session::authenticating())
        };
        self.listeners.notify(&SessionEvent {
            previous: previous.status(),
            session: Session::authenticating(),
        });
        Ok(previous)
    }

    /// Swap in `next` and notify subscribers when anything changed.
    fn transition(&self, next: Session) -> Session {
        let previous = std::mem::replace(&mut self.lock_state().session, next.clone());
        if previous != next {
            debug!(from = %previous.status(), to = %next.status(), "session transition");
            self.listeners.notify(&SessionEvent {
                previous: previous.status(),
                session: next.clone(),
            });
        }
        next
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invalid_input(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorCode::Validation, err.to_string())
}

#[cfg(test)]
#[path = "session_controller_tests.rs"]
mod tests;
