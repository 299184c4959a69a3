//! Authentication primitives: login credentials, registration payloads,
//! passwords, and one-time codes.
//!
//! Every constructor here runs before any remote call, so a failure maps to
//! [`crate::domain::ErrorCode::Validation`] and never reaches the provider.

use std::fmt;

use zeroize::Zeroizing;

use crate::domain::identity::{
    Email, IdentityValidationError, ProfileDetails, Username, has_letter_and_digit,
};

/// Minimum password length accepted by registration and password updates.
pub const PASSWORD_MIN_LEN: usize = 6;

/// Number of digits in a one-time code.
pub const OTP_CODE_LEN: usize = 6;

/// Domain error returned when authentication payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthValidationError {
    /// Identifier was missing or blank once trimmed.
    EmptyIdentifier,
    /// Password was blank once trimmed.
    EmptyPassword,
    /// Password shorter than [`PASSWORD_MIN_LEN`].
    PasswordTooShort {
        /// Minimum accepted length.
        min: usize,
    },
    /// Password lacks a letter or a digit.
    PasswordMissingLetterOrDigit,
    /// Password and confirmation differ.
    PasswordMismatch,
    /// One-time code is not exactly [`OTP_CODE_LEN`] digits.
    MalformedOtpCode {
        /// Expected code length.
        len: usize,
    },
    /// Username or email shape was rejected.
    Identity(IdentityValidationError),
}

impl fmt::Display for AuthValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "User ID or email must not be empty."),
            Self::EmptyPassword => write!(f, "Password must not be empty."),
            Self::PasswordTooShort { min } => {
                write!(f, "Password should be at least {min} characters.")
            }
            Self::PasswordMissingLetterOrDigit => {
                write!(f, "Password must contain both letters and numbers.")
            }
            Self::PasswordMismatch => write!(f, "Passwords do not match."),
            Self::MalformedOtpCode { len } => {
                write!(f, "Verification code must be exactly {len} digits.")
            }
            Self::Identity(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthValidationError {}

impl From<IdentityValidationError> for AuthValidationError {
    fn from(value: IdentityValidationError) -> Self {
        Self::Identity(value)
    }
}

/// How a login identifier should be resolved to a provider email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    /// The identifier contains `@` and is used as-is.
    Email(Email),
    /// The identifier must be looked up in the profile store first.
    Username(String),
}

impl fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email(email) => write!(f, "{email}"),
            Self::Username(username) => f.write_str(username),
        }
    }
}

/// Validated login credentials used by the session controller.
///
/// ## Invariants
/// - The identifier is trimmed and non-empty.
/// - The password is non-empty once trimmed, but keeps caller-provided
///   whitespace to avoid surprising credential comparisons.
///
/// # Examples
/// ```
/// use lending::domain::{LoginCredentials, LoginIdentifier};
///
/// let creds = LoginCredentials::try_from_parts(" rahim42 ", "secret1").unwrap();
/// assert_eq!(creds.identifier(), &LoginIdentifier::Username("rahim42".to_owned()));
/// assert_eq!(creds.password(), "secret1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    identifier: LoginIdentifier,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw identifier/password inputs.
    ///
    /// Identifiers with an `@` must be well-formed emails; any other
    /// identifier is treated as a username to resolve.
    pub fn try_from_parts(identifier: &str, password: &str) -> Result<Self, AuthValidationError> {
        let normalized = identifier.trim();
        if normalized.is_empty() {
            return Err(AuthValidationError::EmptyIdentifier);
        }
        if password.trim().is_empty() {
            return Err(AuthValidationError::EmptyPassword);
        }

        let identifier = if normalized.contains('@') {
            LoginIdentifier::Email(Email::new(normalized)?)
        } else {
            LoginIdentifier::Username(normalized.to_owned())
        };

        Ok(Self {
            identifier,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Identifier to resolve.
    #[must_use]
    pub const fn identifier(&self) -> &LoginIdentifier {
        &self.identifier
    }

    /// Password string provided by the caller.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Password that satisfies the registration policy.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Validate length and letter+digit shape.
    pub fn new(raw: &str) -> Result<Self, AuthValidationError> {
        Self::check_length(raw)?;
        if !has_letter_and_digit(raw) {
            return Err(AuthValidationError::PasswordMissingLetterOrDigit);
        }
        Ok(Self(Zeroizing::new(raw.to_owned())))
    }

    /// Validate only the minimum length (password reset flow).
    pub fn with_min_length(raw: &str) -> Result<Self, AuthValidationError> {
        Self::check_length(raw)?;
        Ok(Self(Zeroizing::new(raw.to_owned())))
    }

    fn check_length(raw: &str) -> Result<(), AuthValidationError> {
        if raw.trim().is_empty() {
            return Err(AuthValidationError::EmptyPassword);
        }
        if raw.chars().count() < PASSWORD_MIN_LEN {
            return Err(AuthValidationError::PasswordTooShort {
                min: PASSWORD_MIN_LEN,
            });
        }
        Ok(())
    }

    /// Expose the secret for the provider call.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Raw registration form as submitted by the caller.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    /// Requested User ID.
    pub username: String,
    /// Address the OTP challenge was verified for.
    pub email: String,
    /// Optional; blank means not given.
    pub full_name: String,
    /// New password.
    pub password: String,
    /// Must equal `password`.
    pub confirm_password: String,
}

/// Validated registration payload.
///
/// OTP verification is checked separately by the session controller because
/// it depends on session-local challenge state.
#[derive(Debug, Clone)]
pub struct Registration {
    username: Username,
    email: Email,
    full_name: Option<String>,
    password: Password,
}

impl Registration {
    /// Validate a raw registration form.
    ///
    /// # Examples
    /// ```
    /// use lending::domain::{Registration, RegistrationForm};
    ///
    /// let form = RegistrationForm {
    ///     username: "rahim42".into(),
    ///     email: "rahim@example.com".into(),
    ///     full_name: "Rahim Ahmed".into(),
    ///     password: "secret1".into(),
    ///     confirm_password: "secret1".into(),
    /// };
    /// let registration = Registration::try_from_form(form).unwrap();
    /// assert_eq!(registration.username().as_ref(), "rahim42");
    /// ```
    pub fn try_from_form(form: RegistrationForm) -> Result<Self, AuthValidationError> {
        let username = Username::new(form.username)?;
        let email = Email::new(form.email)?;
        let password = Password::new(&form.password)?;
        if form.password != form.confirm_password {
            return Err(AuthValidationError::PasswordMismatch);
        }
        let full_name = ProfileDetails {
            full_name: Some(form.full_name),
            ..ProfileDetails::default()
        }
        .normalized()
        .full_name;

        Ok(Self {
            username,
            email,
            full_name,
            password,
        })
    }

    /// Requested username.
    #[must_use]
    pub const fn username(&self) -> &Username {
        &self.username
    }

    /// Credential email.
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// Optional full name captured at sign-up.
    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    /// Validated password.
    #[must_use]
    pub const fn password(&self) -> &Password {
        &self.password
    }
}

/// Six-digit one-time code.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Parse a code, rejecting anything but exactly six ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, AuthValidationError> {
        let trimmed = raw.trim();
        if trimmed.len() != OTP_CODE_LEN || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthValidationError::MalformedOtpCode { len: OTP_CODE_LEN });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Digits as sent to the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    fn form(username: &str, password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_owned(),
            email: "rahim@example.com".to_owned(),
            full_name: "Rahim Ahmed".to_owned(),
            password: password.to_owned(),
            confirm_password: confirm.to_owned(),
        }
    }

    #[rstest]
    #[case("", "pw", AuthValidationError::EmptyIdentifier)]
    #[case("   ", "pw", AuthValidationError::EmptyIdentifier)]
    #[case("user1", "", AuthValidationError::EmptyPassword)]
    #[case("user1", "   ", AuthValidationError::EmptyPassword)]
    fn invalid_credentials(
        #[case] identifier: &str,
        #[case] password: &str,
        #[case] expected: AuthValidationError,
    ) {
        let err = LoginCredentials::try_from_parts(identifier, password)
            .expect_err("invalid inputs must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn identifiers_with_at_sign_are_emails() {
        let creds = LoginCredentials::try_from_parts(" Rahim@Example.com ", "secret1")
            .expect("valid credentials");
        let expected = Email::new("rahim@example.com").expect("email");
        assert_eq!(creds.identifier(), &LoginIdentifier::Email(expected));
    }

    #[rstest]
    #[case("rahim42", "secret1", "secret1")]
    #[case("karim7", "abc123", "abc123")]
    fn accepts_valid_registration(
        #[case] username: &str,
        #[case] password: &str,
        #[case] confirm: &str,
    ) {
        let registration =
            Registration::try_from_form(form(username, password, confirm)).expect("valid form");
        assert_eq!(registration.username().as_ref(), username);
        assert_eq!(registration.full_name(), Some("Rahim Ahmed"));
    }

    #[rstest]
    #[case("rahim", "secret1", "secret1", AuthValidationError::Identity(IdentityValidationError::UsernameMissingLetterOrDigit))]
    #[case("rahim42", "abc12", "abc12", AuthValidationError::PasswordTooShort { min: PASSWORD_MIN_LEN })]
    #[case("rahim42", "secrets", "secrets", AuthValidationError::PasswordMissingLetterOrDigit)]
    #[case("rahim42", "secret1", "secret2", AuthValidationError::PasswordMismatch)]
    fn rejects_invalid_registration(
        #[case] username: &str,
        #[case] password: &str,
        #[case] confirm: &str,
        #[case] expected: AuthValidationError,
    ) {
        let err = Registration::try_from_form(form(username, password, confirm))
            .expect_err("invalid form");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("123456", true)]
    #[case(" 654321 ", true)]
    #[case("12345", false)]
    #[case("1234567", false)]
    #[case("12a456", false)]
    fn otp_codes_must_be_six_digits(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(OtpCode::parse(raw).is_ok(), ok);
    }

    #[rstest]
    fn reset_passwords_only_need_length() {
        assert!(Password::with_min_length("secrets").is_ok());
        assert_eq!(
            Password::with_min_length("short").expect_err("too short"),
            AuthValidationError::PasswordTooShort { min: PASSWORD_MIN_LEN }
        );
    }

    #[rstest]
    fn secrets_are_redacted_in_debug_output() {
        let password = Password::new("secret1").expect("password");
        assert_eq!(format!("{password:?}"), "Password(***)");
        let code = OtpCode::parse("123456").expect("code");
        assert_eq!(format!("{code:?}"), "OtpCode(******)");
    }
}
