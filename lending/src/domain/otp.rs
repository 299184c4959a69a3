//! One-time-code challenges and the resend cooldown timer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::identity::Email;

/// Default resend cooldown window.
pub const DEFAULT_OTP_COOLDOWN: Duration = Duration::from_secs(60);

/// Ephemeral record of a code sent to an email address.
///
/// ## Invariants
/// - `expires_at = issued_at + cooldown`.
/// - `verified` only flips to `true` after the provider accepts a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    email: Email,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified: bool,
}

impl OtpChallenge {
    /// Record a freshly issued challenge.
    #[must_use]
    pub fn issue(email: Email, issued_at: DateTime<Utc>, cooldown: Duration) -> Self {
        let window = TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX);
        let expires_at = issued_at
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            email,
            issued_at,
            expires_at,
            verified: false,
        }
    }

    /// Email the code was sent to.
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// When the provider accepted the send request.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// End of the resend cooldown window.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the provider accepted a code for this challenge.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verified
    }

    pub(crate) const fn mark_verified(&mut self) {
        self.verified = true;
    }

    /// Timer showing how long the caller must wait before resending.
    #[must_use]
    pub fn resend_timer(&self, now: DateTime<Utc>) -> ResendTimer {
        let remaining = (self.expires_at - now).num_seconds().max(0);
        ResendTimer {
            remaining_secs: u64::try_from(remaining).unwrap_or(0),
        }
    }
}

/// Whole-second countdown gating the "resend code" action.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use lending::domain::ResendTimer;
///
/// let mut timer = ResendTimer::start(Duration::from_secs(2));
/// assert!(!timer.can_resend());
/// timer.tick();
/// timer.tick();
/// assert!(timer.can_resend());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendTimer {
    remaining_secs: u64,
}

impl ResendTimer {
    /// Start counting down from the full window.
    #[must_use]
    pub const fn start(window: Duration) -> Self {
        Self {
            remaining_secs: window.as_secs(),
        }
    }

    /// Seconds left before a resend is allowed.
    #[must_use]
    pub const fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// Advance by one second, saturating at zero.
    pub const fn tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
    }

    /// Resend is permitted only once the countdown reaches zero.
    #[must_use]
    pub const fn can_resend(&self) -> bool {
        self.remaining_secs == 0
    }
}
