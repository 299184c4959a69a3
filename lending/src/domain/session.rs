//! Session state, provider events, and consumer subscriptions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::domain::identity::{Email, Identity, IdentityId};

/// Lifecycle state of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Nobody is signed in.
    Anonymous,
    /// A login or registration call is in flight.
    Authenticating,
    /// Signed in with a bootstrapped identity.
    Authenticated,
    /// The user followed a recovery link and may set a new password.
    RecoveryPending,
}

impl SessionStatus {
    /// Kebab-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::RecoveryPending => "recovery-pending",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the client session.
///
/// ## Invariants
/// - `identity` is present if and only if `status` is
///   [`SessionStatus::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    status: SessionStatus,
    identity: Option<Identity>,
}

impl Session {
    /// Session with no identity attached.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            identity: None,
        }
    }

    /// Session held while a login or registration call is pending.
    #[must_use]
    pub const fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            identity: None,
        }
    }

    /// Authenticated session carrying the bootstrapped identity.
    #[must_use]
    pub const fn authenticated(identity: Identity) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            identity: Some(identity),
        }
    }

    /// Session opened from a recovery link, with no identity attached.
    #[must_use]
    pub const fn recovery_pending() -> Self {
        Self {
            status: SessionStatus::RecoveryPending,
            identity: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Identity when authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Shortcut for `status() == Authenticated`.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    /// Provider-assigned identity.
    pub identity_id: IdentityId,
    /// Email on the provider account, when the provider exposes it.
    pub email: Option<Email>,
}

/// Asynchronous notifications published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Credentials were accepted elsewhere, e.g. a restored session.
    SignedIn(ProviderSession),
    /// The provider dropped the session.
    SignedOut,
    /// A recovery link was opened; the holder may set a new password.
    PasswordRecoveryRequested(ProviderSession),
    /// The password was changed.
    CredentialUpdated,
}

/// Transition delivered to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Status before the transition.
    pub previous: SessionStatus,
    /// Session after the transition.
    pub session: Session,
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<BTreeMap<u64, Handler>>,
}

/// Fan-out list of session event handlers.
#[derive(Clone, Default)]
pub(crate) struct SessionListeners {
    registry: Arc<Registry>,
}

impl SessionListeners {
    pub(crate) fn subscribe<F>(&self, handler: F) -> SessionSubscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self
            .registry
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.insert(id, Arc::new(handler));
        SessionSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every live handler.
    ///
    /// Handlers are cloned out first so a handler may unsubscribe itself.
    pub(crate) fn notify(&self, event: &SessionEvent) {
        let handlers: Vec<Handler> = self
            .registry
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registry
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for SessionListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionListeners").finish_non_exhaustive()
    }
}

/// Handle returned by `on_session_event`; detach with [`Self::unsubscribe`].
///
/// Dropping the handle without unsubscribing keeps the handler registered.
#[derive(Debug)]
pub struct SessionSubscription {
    id: u64,
    registry: Weak<Registry>,
}

impl SessionSubscription {
    /// Remove the handler. Returns `false` if the controller is gone or the
    /// handler was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut handlers = registry
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        handlers.remove(&self.id).is_some()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use rstest::rstest;

    fn event() -> SessionEvent {
        SessionEvent {
            previous: SessionStatus::Authenticated,
            session: Session::anonymous(),
        }
    }

    #[rstest]
    fn handlers_receive_events_until_unsubscribed() {
        let listeners = SessionListeners::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = listeners.subscribe(move |evt| {
            assert_eq!(evt.previous, SessionStatus::Authenticated);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        listeners.notify(&event());
        assert!(subscription.unsubscribe());
        listeners.notify(&event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 0);
    }

    #[rstest]
    fn unsubscribe_after_registry_dropped_is_a_no_op() {
        let listeners = SessionListeners::default();
        let subscription = listeners.subscribe(|_| {});
        drop(listeners);
        assert!(!subscription.unsubscribe());
    }

    #[rstest]
    #[case(Session::anonymous(), false)]
    #[case(Session::authenticating(), false)]
    #[case(Session::recovery_pending(), false)]
    fn sessions_without_identity_are_not_authenticated(
        #[case] session: Session,
        #[case] authenticated: bool,
    ) {
        assert_eq!(session.is_authenticated(), authenticated);
        assert!(session.identity().is_none());
    }

    #[rstest]
    fn status_labels_are_kebab_case() {
        assert_eq!(SessionStatus::RecoveryPending.to_string(), "recovery-pending");
        let json = serde_json::to_value(SessionStatus::RecoveryPending).expect("serialise");
        assert_eq!(json, "recovery-pending");
    }
}
