//! In-process identity provider.
//!
//! Mirrors the hosted provider closely enough for end-to-end flows: codes are
//! issued per email and expire, a verified code creates the account and signs
//! it in, and every session change is published on the event stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tokio::sync::broadcast;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::ports::{IdentityProvider, IdentityProviderError};
use crate::domain::{Email, IdentityId, OtpCode, Password, ProviderEvent, ProviderSession};

/// How long an issued code stays valid, in seconds.
pub const CODE_TTL_SECS: i64 = 600;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct Account {
    id: IdentityId,
    password: Option<Zeroizing<String>>,
}

#[derive(Debug)]
struct IssuedCode {
    code: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ProviderState {
    accounts: HashMap<Email, Account>,
    codes: HashMap<Email, IssuedCode>,
    current: Option<ProviderSession>,
    recovery_requests: Vec<Email>,
    codes_issued: u32,
    offline: bool,
}

/// Identity provider held entirely in memory.
pub struct MemoryIdentityProvider {
    state: Mutex<ProviderState>,
    events: broadcast::Sender<ProviderEvent>,
    clock: Arc<dyn Clock>,
}

impl MemoryIdentityProvider {
    /// Empty provider reading code expiry from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(ProviderState::default()),
            events,
            clock,
        }
    }

    /// Seed a confirmed account with a password.
    #[must_use]
    pub fn with_account(self, email: Email, password: &str) -> Self {
        self.lock_state().accounts.insert(
            email,
            Account {
                id: IdentityId::random(),
                password: Some(Zeroizing::new(password.to_owned())),
            },
        );
        self
    }

    /// Simulate an outage: every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.lock_state().offline = offline;
    }

    /// Last code sent to `email`, as an inbox would show it.
    #[must_use]
    pub fn issued_code(&self, email: &Email) -> Option<String> {
        self.lock_state()
            .codes
            .get(email)
            .map(|issued| issued.code.clone())
    }

    /// Emails for which a recovery link was requested, oldest first.
    #[must_use]
    pub fn recovery_requests(&self) -> Vec<Email> {
        self.lock_state().recovery_requests.clone()
    }

    /// Provider id of the account registered under `email`.
    #[must_use]
    pub fn account_id(&self, email: &Email) -> Option<IdentityId> {
        self.lock_state()
            .accounts
            .get(email)
            .map(|account| account.id.clone())
    }

    /// Follow a recovery link: signs the account in for a password change
    /// and publishes [`ProviderEvent::PasswordRecoveryRequested`].
    pub fn open_recovery_link(&self, email: &Email) -> Result<(), IdentityProviderError> {
        let session = {
            let mut state = self.lock_state();
            let account = state
                .accounts
                .get(email)
                .ok_or_else(|| IdentityProviderError::rejected("recovery link is not valid"))?;
            let session = ProviderSession {
                identity_id: account.id.clone(),
                email: Some(email.clone()),
            };
            state.current = Some(session.clone());
            session
        };
        self.publish(ProviderEvent::PasswordRecoveryRequested(session));
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online_state(&self) -> Result<MutexGuard<'_, ProviderState>, IdentityProviderError> {
        let state = self.lock_state();
        if state.offline {
            return Err(IdentityProviderError::transport("identity provider is offline"));
        }
        Ok(state)
    }

    fn publish(&self, event: ProviderEvent) {
        if self.events.send(event).is_err() {
            debug!("no subscribers for provider event");
        }
    }
}

fn sign_in(state: &mut ProviderState, email: &Email) -> Option<ProviderSession> {
    let account = state.accounts.get(email)?;
    let session = ProviderSession {
        identity_id: account.id.clone(),
        email: Some(email.clone()),
    };
    state.current = Some(session.clone());
    Some(session)
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, IdentityProviderError> {
        let session = {
            let mut state = self.online_state()?;
            let matches = state
                .accounts
                .get(email)
                .and_then(|account| account.password.as_ref())
                .is_some_and(|stored| stored.as_str() == password);
            if !matches {
                return Err(IdentityProviderError::invalid_credentials());
            }
            sign_in(&mut state, email)
                .ok_or_else(IdentityProviderError::invalid_credentials)?
        };
        self.publish(ProviderEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &Password,
    ) -> Result<ProviderSession, IdentityProviderError> {
        let session = {
            let mut guard = self.online_state()?;
            let state = &mut *guard;
            let signed_in_as_email = state
                .current
                .as_ref()
                .is_some_and(|current| current.email.as_ref() == Some(email));
            match state.accounts.get_mut(email) {
                Some(account) if signed_in_as_email || account.password.is_none() => {
                    account.password = Some(Zeroizing::new(password.expose().to_owned()));
                }
                Some(_) => return Err(IdentityProviderError::already_registered()),
                None => {
                    state.accounts.insert(
                        email.clone(),
                        Account {
                            id: IdentityId::random(),
                            password: Some(Zeroizing::new(password.expose().to_owned())),
                        },
                    );
                }
            }
            sign_in(state, email)
                .ok_or_else(|| IdentityProviderError::transport("account vanished"))?
        };
        self.publish(ProviderEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn send_one_time_code(&self, email: &Email) -> Result<(), IdentityProviderError> {
        let mut state = self.online_state()?;
        state.codes_issued = state.codes_issued.wrapping_add(1);
        let code = issued_code_for(state.codes_issued);
        let expires_at = self.clock.utc() + TimeDelta::seconds(CODE_TTL_SECS);
        state
            .codes
            .insert(email.clone(), IssuedCode { code, expires_at });
        Ok(())
    }

    async fn verify_one_time_code(
        &self,
        email: &Email,
        code: &OtpCode,
    ) -> Result<ProviderSession, IdentityProviderError> {
        let now = self.clock.utc();
        let session = {
            let mut state = self.online_state()?;
            let valid = state
                .codes
                .get(email)
                .is_some_and(|issued| issued.code == code.as_str() && issued.expires_at > now);
            if !valid {
                return Err(IdentityProviderError::invalid_code());
            }
            state.codes.remove(email);
            state.accounts.entry(email.clone()).or_insert_with(|| Account {
                id: IdentityId::random(),
                password: None,
            });
            sign_in(&mut state, email)
                .ok_or_else(IdentityProviderError::invalid_code)?
        };
        self.publish(ProviderEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn send_recovery_email(&self, email: &Email) -> Result<(), IdentityProviderError> {
        let mut state = self.online_state()?;
        state.recovery_requests.push(email.clone());
        Ok(())
    }

    async fn update_credential(&self, password: &Password) -> Result<(), IdentityProviderError> {
        {
            let mut state = self.online_state()?;
            let email = state
                .current
                .as_ref()
                .and_then(|current| current.email.clone())
                .ok_or_else(IdentityProviderError::not_authenticated)?;
            let account = state
                .accounts
                .get_mut(&email)
                .ok_or_else(IdentityProviderError::not_authenticated)?;
            account.password = Some(Zeroizing::new(password.expose().to_owned()));
        }
        self.publish(ProviderEvent::CredentialUpdated);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        self.online_state()?.current = None;
        self.publish(ProviderEvent::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<ProviderSession>, IdentityProviderError> {
        Ok(self.online_state()?.current.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Six-digit code for the `sequence`-th send, cycling through 100000..=999999.
fn issued_code_for(sequence: u32) -> String {
    let offset = sequence.checked_rem(900_000).unwrap_or_default();
    (100_000 + offset).to_string()
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use rstest::{fixture, rstest};

    use super::*;
    use crate::test_support::MutableClock;

    const EMAIL: &str = "sultana@example.com";

    fn email() -> Email {
        Email::new(EMAIL).expect("valid email")
    }

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::fixed())
    }

    #[rstest]
    #[case(1, "100001")]
    #[case(899_999, "999999")]
    #[case(900_000, "100000")]
    fn issued_codes_stay_six_digits(#[case] sequence: u32, #[case] expected: &str) {
        assert_eq!(issued_code_for(sequence), expected);
    }

    fn code_for(provider: &MemoryIdentityProvider) -> OtpCode {
        let raw = provider.issued_code(&email()).expect("code issued");
        OtpCode::parse(&raw).expect("six digits")
    }

    #[rstest]
    #[tokio::test]
    async fn verified_code_creates_account_and_signs_in(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(clock);
        let mut events = provider.subscribe();

        provider.send_one_time_code(&email()).await.expect("sent");
        let session = provider
            .verify_one_time_code(&email(), &code_for(&provider))
            .await
            .expect("verified");

        assert_eq!(provider.account_id(&email()), Some(session.identity_id.clone()));
        assert_eq!(
            provider.current_session().await.expect("session"),
            Some(session.clone())
        );
        assert_eq!(events.try_recv().expect("event"), ProviderEvent::SignedIn(session));
    }

    #[rstest]
    #[tokio::test]
    async fn codes_expire_after_the_ttl(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(Arc::clone(&clock) as Arc<dyn Clock>);
        provider.send_one_time_code(&email()).await.expect("sent");
        let code = code_for(&provider);

        clock.advance_seconds(CODE_TTL_SECS);
        let err = provider
            .verify_one_time_code(&email(), &code)
            .await
            .expect_err("expired");
        assert_eq!(err, IdentityProviderError::InvalidCode);
    }

    #[rstest]
    #[tokio::test]
    async fn sign_up_sets_password_on_code_created_account(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(clock);
        provider.send_one_time_code(&email()).await.expect("sent");
        let verified = provider
            .verify_one_time_code(&email(), &code_for(&provider))
            .await
            .expect("verified");
        let password = Password::new("secret1").expect("valid password");

        let created = provider.sign_up(&email(), &password).await.expect("sign up");
        assert_eq!(created.identity_id, verified.identity_id);

        provider.sign_out().await.expect("signed out");
        provider
            .sign_in_with_password(&email(), "secret1")
            .await
            .expect("password works");
    }

    #[rstest]
    #[tokio::test]
    async fn sign_up_refuses_to_overwrite_someone_elses_password(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(clock).with_account(email(), "secret1");
        let password = Password::new("hijack99").expect("valid password");

        let err = provider
            .sign_up(&email(), &password)
            .await
            .expect_err("already registered");
        assert_eq!(err, IdentityProviderError::AlreadyRegistered);
        assert_eq!(err.code(), crate::domain::ErrorCode::Conflict);
    }

    #[rstest]
    #[case("secret1", true)]
    #[case("secret2", false)]
    #[tokio::test]
    async fn password_sign_in_checks_stored_password(
        clock: Arc<MutableClock>,
        #[case] attempt: &str,
        #[case] accepted: bool,
    ) {
        let provider = MemoryIdentityProvider::new(clock).with_account(email(), "secret1");
        let result = provider.sign_in_with_password(&email(), attempt).await;
        assert_eq!(result.is_ok(), accepted);
    }

    #[rstest]
    #[tokio::test]
    async fn recovery_link_publishes_event_and_allows_credential_update(
        clock: Arc<MutableClock>,
    ) {
        let provider = MemoryIdentityProvider::new(clock).with_account(email(), "secret1");
        let mut events = provider.subscribe();

        provider.send_recovery_email(&email()).await.expect("requested");
        assert_eq!(provider.recovery_requests(), vec![email()]);
        provider.open_recovery_link(&email()).expect("link opened");
        assert!(matches!(
            events.try_recv(),
            Ok(ProviderEvent::PasswordRecoveryRequested(_))
        ));

        let password = Password::with_min_length("newpass").expect("long enough");
        provider.update_credential(&password).await.expect("updated");
        provider.sign_out().await.expect("signed out");
        provider
            .sign_in_with_password(&email(), "newpass")
            .await
            .expect("new password works");
    }

    #[rstest]
    #[tokio::test]
    async fn offline_provider_fails_with_transport_errors(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(clock);
        provider.set_offline(true);
        let err = provider
            .send_one_time_code(&email())
            .await
            .expect_err("offline");
        assert!(matches!(err, IdentityProviderError::Transport { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn credential_update_without_session_is_refused(clock: Arc<MutableClock>) {
        let provider = MemoryIdentityProvider::new(clock);
        let password = Password::with_min_length("newpass").expect("long enough");
        let err = provider
            .update_credential(&password)
            .await
            .expect_err("no session");
        assert_eq!(err, IdentityProviderError::NotAuthenticated);
    }
}
