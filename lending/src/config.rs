//! Client settings loaded via OrthoConfig.

use std::time::Duration;

use ortho_config::OrthoConfig;
use reqwest::Url;
use serde::Deserialize;

use crate::domain::DEFAULT_OTP_COOLDOWN;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings that cannot be turned into a working client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No backend URL was configured.
    #[error("LENDING_API_URL is not set")]
    MissingApiUrl,
    /// The backend URL did not parse.
    #[error("LENDING_API_URL is not a valid URL: {reason}")]
    InvalidApiUrl {
        /// Parser explanation.
        reason: String,
    },
    /// No API key was configured.
    #[error("LENDING_API_KEY is not set")]
    MissingApiKey,
}

/// Connection and flow settings for the lending client.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "LENDING")]
pub struct ClientSettings {
    /// Project URL of the hosted backend.
    pub api_url: Option<String>,
    /// Public API key sent with every request.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Resend cooldown for one-time codes, in seconds.
    pub otp_cooldown_secs: Option<u64>,
    /// Where password recovery links return the user.
    pub recovery_redirect: Option<String>,
}

impl ClientSettings {
    /// Parsed backend URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is missing or malformed.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;
        Url::parse(raw).map_err(|err| ConfigError::InvalidApiUrl {
            reason: err.to_string(),
        })
    }

    /// Configured API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when unset or blank.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Per-request timeout, falling back to 30 seconds.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// OTP resend cooldown, falling back to the domain default.
    #[must_use]
    pub fn otp_cooldown(&self) -> Duration {
        self.otp_cooldown_secs
            .map_or(DEFAULT_OTP_COOLDOWN, Duration::from_secs)
    }

    /// Redirect target for password recovery links, if configured.
    #[must_use]
    pub fn recovery_redirect(&self) -> Option<&str> {
        self.recovery_redirect.as_deref()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client configuration parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 5] = [
        "LENDING_API_URL",
        "LENDING_API_KEY",
        "LENDING_REQUEST_TIMEOUT_SECS",
        "LENDING_OTP_COOLDOWN_SECS",
        "LENDING_RECOVERY_REDIRECT",
    ];

    fn load_from_empty_args() -> ClientSettings {
        ClientSettings::load_from_iter([OsString::from("loan-admin")]).expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();
        assert_eq!(settings.api_url(), Err(ConfigError::MissingApiUrl));
        assert_eq!(settings.api_key(), Err(ConfigError::MissingApiKey));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.otp_cooldown(), DEFAULT_OTP_COOLDOWN);
        assert!(settings.recovery_redirect().is_none());
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("LENDING_API_URL", Some("https://project.supabase.co".to_owned())),
            ("LENDING_API_KEY", Some("anon-key".to_owned())),
            ("LENDING_REQUEST_TIMEOUT_SECS", Some("5".to_owned())),
            ("LENDING_OTP_COOLDOWN_SECS", Some("90".to_owned())),
            (
                "LENDING_RECOVERY_REDIRECT",
                Some("lending://reset-password".to_owned()),
            ),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.api_url().map(String::from).as_deref(),
            Ok("https://project.supabase.co/")
        );
        assert_eq!(settings.api_key(), Ok("anon-key"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.otp_cooldown(), Duration::from_secs(90));
        assert_eq!(settings.recovery_redirect(), Some("lending://reset-password"));
    }

    #[rstest]
    fn malformed_urls_are_reported() {
        let _guard = lock_env([
            ("LENDING_API_URL", Some("not a url".to_owned())),
            ("LENDING_API_KEY", None::<String>),
            ("LENDING_REQUEST_TIMEOUT_SECS", None::<String>),
            ("LENDING_OTP_COOLDOWN_SECS", None::<String>),
            ("LENDING_RECOVERY_REDIRECT", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(matches!(
            settings.api_url(),
            Err(ConfigError::InvalidApiUrl { .. })
        ));
    }
}
