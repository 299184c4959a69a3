//! Identity data model: provider-issued ids, usernames, emails, and profile
//! attributes.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Username shown when a profile row is missing for an authenticated identity.
pub const FALLBACK_USERNAME: &str = "Member";

/// Validation errors returned by identity constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    /// Provider key was blank.
    EmptyId,
    /// Provider key was padded or not a UUID.
    InvalidId,
    /// Username was blank after trimming.
    EmptyUsername,
    /// Username contained something other than ASCII letters and digits.
    UsernameInvalidCharacters,
    /// Username lacked a letter or lacked a digit.
    UsernameMissingLetterOrDigit,
    /// Email was blank after trimming.
    EmptyEmail,
    /// Email did not look like `local@domain.tld`.
    InvalidEmail,
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "identity id must not be empty"),
            Self::InvalidId => write!(f, "identity id must be a valid UUID"),
            Self::EmptyUsername => write!(f, "User ID must not be empty."),
            Self::UsernameInvalidCharacters => {
                write!(f, "User ID may only contain letters and numbers.")
            }
            Self::UsernameMissingLetterOrDigit => {
                write!(f, "User ID must contain both letters and numbers.")
            }
            Self::EmptyEmail => write!(f, "Email must not be empty."),
            Self::InvalidEmail => write!(f, "Please enter a valid email address."),
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Account key minted by the identity provider.
///
/// The provider hands these out as UUID strings. Only the parsed value is
/// kept, so two spellings of the same key (upper and lower case) compare
/// equal and always render in the hyphenated lower-case form the REST
/// tables filter on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(Uuid);

impl IdentityId {
    /// Parse a provider key, refusing blanks and padded input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        raw.as_ref().parse()
    }

    /// Mint a fresh key the way the in-memory provider does.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for IdentityId {
    type Err = IdentityValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "" => Err(IdentityValidationError::EmptyId),
            padded if padded.trim() != padded => Err(IdentityValidationError::InvalidId),
            key => Uuid::parse_str(key)
                .map(Self)
                .map_err(|_| IdentityValidationError::InvalidId),
        }
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl From<IdentityId> for String {
    fn from(value: IdentityId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for IdentityId {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

static ALPHANUMERIC_RE: OnceLock<Regex> = OnceLock::new();

fn alphanumeric_regex() -> &'static Regex {
    ALPHANUMERIC_RE.get_or_init(|| {
        Regex::new("^[A-Za-z0-9]+$")
            .unwrap_or_else(|error| panic!("alphanumeric regex failed to compile: {error}"))
    })
}

/// Letters-and-digits shape shared by usernames and passwords.
///
/// The input must contain at least one ASCII letter and one ASCII digit.
pub(crate) fn has_letter_and_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_alphabetic()) && value.chars().any(|c| c.is_ascii_digit())
}

/// Human-chosen unique handle, e.g. `rahim42`.
///
/// ## Invariants
/// - Only ASCII letters and digits.
/// - At least one letter and at least one digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`].
    pub fn new(username: impl Into<String>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(username.into())
    }

    fn from_owned(username: String) -> Result<Self, IdentityValidationError> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyUsername);
        }
        if !alphanumeric_regex().is_match(trimmed) {
            return Err(IdentityValidationError::UsernameInvalidCharacters);
        }
        if !has_letter_and_digit(trimmed) {
            return Err(IdentityValidationError::UsernameMissingLetterOrDigit);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Username used when no profile row exists; skips shape validation.
    pub(crate) fn fallback(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Canonical credential identifier for the identity provider.
///
/// Stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`].
    pub fn new(email: impl Into<String>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(email.into())
    }

    fn from_owned(email: String) -> Result<Self, IdentityValidationError> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(IdentityValidationError::EmptyEmail);
        }
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(IdentityValidationError::InvalidEmail);
        };
        let well_formed = !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !normalized.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(IdentityValidationError::InvalidEmail);
        }
        Ok(Self(normalized))
    }

    /// Part of the address before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Optional profile attributes filled in by the profile completion flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    /// Full legal name.
    pub full_name: Option<String>,
    /// Calendar date, no time zone.
    pub date_of_birth: Option<NaiveDate>,
    /// Free text as entered.
    pub gender: Option<String>,
    /// Occupational role, e.g. `Micro-Entrepreneur`.
    pub occupation: Option<String>,
    /// Gross monthly income in whole currency units.
    pub monthly_income: Option<u64>,
}

impl ProfileDetails {
    /// Drop blank text attributes so they count as missing.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        }

        Self {
            full_name: clean(self.full_name),
            date_of_birth: self.date_of_birth,
            gender: clean(self.gender),
            occupation: clean(self.occupation),
            monthly_income: self.monthly_income,
        }
    }

    fn filled_count(&self) -> u8 {
        [
            self.full_name.is_some(),
            self.date_of_birth.is_some(),
            self.gender.is_some(),
            self.occupation.is_some(),
            self.monthly_income.is_some(),
        ]
        .into_iter()
        .map(u8::from)
        .sum()
    }
}

/// Profile row stored by the profile store, keyed by the provider id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Provider identity this row belongs to.
    pub id: IdentityId,
    /// Unique User ID used for username login.
    pub username: Username,
    /// Contact address; login by username resolves to it.
    pub email: Email,
    /// Completion-flow attributes.
    #[serde(flatten)]
    pub details: ProfileDetails,
}

/// Authenticated identity held by the session.
///
/// ## Invariants
/// - `username` is the profile username, or [`FALLBACK_USERNAME`]-style
///   placeholder when the profile row is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    id: IdentityId,
    username: Username,
    email: Option<Email>,
    details: ProfileDetails,
}

impl Identity {
    /// Build an identity from a stored profile row.
    #[must_use]
    pub fn from_profile(profile: Profile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            email: Some(profile.email),
            details: profile.details,
        }
    }

    /// Minimal identity used when the profile row is unavailable.
    ///
    /// The username falls back to the email local part, then to
    /// [`FALLBACK_USERNAME`].
    #[must_use]
    pub fn minimal(id: IdentityId, email: Option<Email>) -> Self {
        let username = email
            .as_ref()
            .map(Email::local_part)
            .filter(|local| !local.is_empty())
            .map_or_else(
                || Username::fallback(FALLBACK_USERNAME),
                |local| Username::fallback(local),
            );
        Self {
            id,
            username,
            email,
            details: ProfileDetails::default(),
        }
    }

    /// Stable provider identifier.
    #[must_use]
    pub const fn id(&self) -> &IdentityId {
        &self.id
    }

    /// Display handle.
    #[must_use]
    pub const fn username(&self) -> &Username {
        &self.username
    }

    /// Email address when known.
    #[must_use]
    pub const fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    /// Profile attributes.
    #[must_use]
    pub const fn details(&self) -> &ProfileDetails {
        &self.details
    }

    /// Percentage (0–100) of profile attributes that have been filled in.
    #[must_use]
    pub fn profile_completion(&self) -> u8 {
        // Five attributes, twenty points each.
        const POINTS_PER_ATTRIBUTE: u8 = 20;
        self.details
            .filled_count()
            .saturating_mul(POINTS_PER_ATTRIBUTE)
    }
}
