//! Domain-level error types.
//!
//! These errors are transport agnostic. Callers branch on [`ErrorCode`] and
//! show [`Error::message`] to the user; nothing here is fatal to the process.

use serde::{Deserialize, Serialize};

/// Stable machine-readable tag describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed input rejected before any remote call.
    Validation,
    /// The identity provider rejected credentials or a one-time code, or the
    /// session does not permit the operation.
    Auth,
    /// The resource (username, email, session slot) is already taken.
    Conflict,
    /// A profile or loan application does not exist.
    NotFound,
    /// The identity provider or data store is unavailable.
    Transient,
}

impl ErrorCode {
    /// Snake-case tag used in logs and serialised payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
        }
    }
}

/// Domain error payload: a taxonomy tag plus one human-readable message.
///
/// ## Invariants
/// - `message` is non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use lending::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("loan application 7 not found");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    /// Create a new error, falling back to a generic message when the
    /// supplied one is blank.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let text = message.into();
        let message = if text.trim().is_empty() {
            fallback_message(code).to_owned()
        } else {
            text
        };
        Self { code, message }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message for the transient notification.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Convenience constructor for [`ErrorCode::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    /// Convenience constructor for [`ErrorCode::Auth`].
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Auth, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Transient`].
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transient, message)
    }
}

const fn fallback_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Validation => "The submitted details are not valid.",
        ErrorCode::Auth => "Authentication failed.",
        ErrorCode::Conflict => "The resource already exists.",
        ErrorCode::NotFound => "The requested record was not found.",
        ErrorCode::Transient => "The service is unavailable. Please try again.",
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}
