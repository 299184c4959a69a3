//! Reqwest-backed identity provider for the hosted auth service.
//!
//! This adapter owns transport details only: endpoint paths, the access
//! token lifecycle, HTTP status mapping, and publishing session changes.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use super::client::{SupabaseClient, execute, is_transient, status_message};
use super::dto::{AuthErrorDto, AuthResponseDto, UserDto};
use crate::domain::ports::{IdentityProvider, IdentityProviderError};
use crate::domain::{Email, OtpCode, Password, ProviderEvent, ProviderSession};

const EVENT_CAPACITY: usize = 64;

/// Identity provider speaking the hosted auth REST API under `/auth/v1`.
pub struct SupabaseIdentityProvider {
    client: SupabaseClient,
    recovery_redirect: Option<String>,
    events: broadcast::Sender<ProviderEvent>,
}

impl SupabaseIdentityProvider {
    /// Provider with no recovery redirect and no held session.
    #[must_use]
    pub fn new(client: SupabaseClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            recovery_redirect: None,
            events,
        }
    }

    /// Address recovery links should send the user back to.
    #[must_use]
    pub fn with_recovery_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.recovery_redirect = Some(redirect.into());
        self
    }

    /// Adopt the access token carried by an opened recovery link.
    ///
    /// Publishes [`ProviderEvent::PasswordRecoveryRequested`] so the session
    /// controller can offer the password change.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityProviderError::InvalidCode`] when the token is not
    /// accepted, or a transport error when the service is unreachable.
    pub async fn accept_recovery_token(
        &self,
        access_token: &str,
    ) -> Result<ProviderSession, IdentityProviderError> {
        self.client.set_access_token(Some(access_token.to_owned()));
        let Some(session) = self.fetch_user().await? else {
            return Err(IdentityProviderError::invalid_code());
        };
        self.publish(ProviderEvent::PasswordRecoveryRequested(session.clone()));
        Ok(session)
    }

    async fn post_auth(
        &self,
        path: &str,
        body: serde_json::Value,
        on_reject: fn(String) -> IdentityProviderError,
    ) -> Result<Vec<u8>, IdentityProviderError> {
        self.send_auth(Method::POST, path, Some(body), on_reject).await
    }

    async fn send_auth(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        on_reject: fn(String) -> IdentityProviderError,
    ) -> Result<Vec<u8>, IdentityProviderError> {
        let url = self
            .client
            .endpoint(path)
            .map_err(|err| IdentityProviderError::transport(format!("invalid auth url: {err}")))?;
        let mut request = self.client.request(method, url);
        if let Some(payload) = body {
            request = request.json(&payload);
        }
        let (status, bytes) = execute(request).await.map_err(map_transport_error)?;
        if status.is_success() {
            Ok(bytes)
        } else {
            Err(map_status_error(status, &bytes, on_reject))
        }
    }

    /// Decode a session response, remembering its token and announcing it.
    fn adopt_session(&self, body: &[u8]) -> Result<ProviderSession, IdentityProviderError> {
        let (session, token) = decode_auth_response(body)?;
        if token.is_some() {
            self.client.set_access_token(token);
            self.publish(ProviderEvent::SignedIn(session.clone()));
        }
        Ok(session)
    }

    async fn fetch_user(&self) -> Result<Option<ProviderSession>, IdentityProviderError> {
        let url = self
            .client
            .endpoint("auth/v1/user")
            .map_err(|err| IdentityProviderError::transport(format!("invalid auth url: {err}")))?;
        let (status, bytes) = execute(self.client.request(Method::GET, url))
            .await
            .map_err(map_transport_error)?;
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!("stored access token no longer accepted");
            self.client.set_access_token(None);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(map_status_error(status, &bytes, IdentityProviderError::rejected));
        }
        let user: UserDto = serde_json::from_slice(&bytes).map_err(|err| {
            IdentityProviderError::transport(format!("invalid user payload: {err}"))
        })?;
        user.into_provider_session()
            .map(Some)
            .map_err(IdentityProviderError::transport)
    }

    async fn signed_in_as(&self, email: &Email) -> Result<bool, IdentityProviderError> {
        if !self.client.has_session() {
            return Ok(false);
        }
        let current = self.fetch_user().await?;
        let same_account = current
            .as_ref()
            .is_some_and(|session| session.email.as_ref() == Some(email));
        if !same_account {
            debug!("held session belongs to another account; signing up afresh");
        }
        Ok(same_account)
    }

    fn publish(&self, event: ProviderEvent) {
        if self.events.send(event).is_err() {
            debug!("no subscribers for provider event");
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<ProviderSession, IdentityProviderError> {
        let body = self
            .post_auth(
                "auth/v1/token?grant_type=password",
                json!({ "email": email.to_string(), "password": password }),
                |_| IdentityProviderError::invalid_credentials(),
            )
            .await?;
        self.adopt_session(&body)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &Password,
    ) -> Result<ProviderSession, IdentityProviderError> {
        // A verified one-time code already created and signed in the account;
        // only the password is missing. A session held for another email
        // must not receive this password.
        if self.signed_in_as(email).await? {
            let body = self
                .send_auth(
                    Method::PUT,
                    "auth/v1/user",
                    Some(json!({ "password": password.expose() })),
                    IdentityProviderError::rejected,
                )
                .await?;
            let user: UserDto = serde_json::from_slice(&body).map_err(|err| {
                IdentityProviderError::transport(format!("invalid user payload: {err}"))
            })?;
            return user
                .into_provider_session()
                .map_err(IdentityProviderError::transport);
        }

        let body = self
            .post_auth(
                "auth/v1/signup",
                json!({ "email": email.to_string(), "password": password.expose() }),
                IdentityProviderError::rejected,
            )
            .await?;
        self.adopt_session(&body)
    }

    async fn send_one_time_code(&self, email: &Email) -> Result<(), IdentityProviderError> {
        self.post_auth(
            "auth/v1/otp",
            json!({ "email": email.to_string(), "create_user": true }),
            IdentityProviderError::rejected,
        )
        .await
        .map(drop)
    }

    async fn verify_one_time_code(
        &self,
        email: &Email,
        code: &OtpCode,
    ) -> Result<ProviderSession, IdentityProviderError> {
        let body = self
            .post_auth(
                "auth/v1/verify",
                json!({ "type": "email", "email": email.to_string(), "token": code.as_str() }),
                |_| IdentityProviderError::invalid_code(),
            )
            .await?;
        self.adopt_session(&body)
    }

    async fn send_recovery_email(&self, email: &Email) -> Result<(), IdentityProviderError> {
        let path = match &self.recovery_redirect {
            Some(redirect) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(redirect.as_bytes()).collect();
                format!("auth/v1/recover?redirect_to={encoded}")
            }
            None => "auth/v1/recover".to_owned(),
        };
        self.post_auth(
            &path,
            json!({ "email": email.to_string() }),
            IdentityProviderError::rejected,
        )
        .await
        .map(drop)
    }

    async fn update_credential(&self, password: &Password) -> Result<(), IdentityProviderError> {
        if !self.client.has_session() {
            return Err(IdentityProviderError::not_authenticated());
        }
        self.send_auth(
            Method::PUT,
            "auth/v1/user",
            Some(json!({ "password": password.expose() })),
            IdentityProviderError::rejected,
        )
        .await?;
        self.publish(ProviderEvent::CredentialUpdated);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        if !self.client.has_session() {
            return Ok(());
        }
        let outcome = self
            .send_auth(
                Method::POST,
                "auth/v1/logout",
                None,
                IdentityProviderError::rejected,
            )
            .await;
        // The local token is dropped even when the server call fails.
        self.client.set_access_token(None);
        self.publish(ProviderEvent::SignedOut);
        outcome.map(drop)
    }

    async fn current_session(&self) -> Result<Option<ProviderSession>, IdentityProviderError> {
        if !self.client.has_session() {
            return Ok(None);
        }
        self.fetch_user().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

fn decode_auth_response(
    body: &[u8],
) -> Result<(ProviderSession, Option<String>), IdentityProviderError> {
    let dto: AuthResponseDto = serde_json::from_slice(body).map_err(|err| {
        IdentityProviderError::transport(format!("invalid auth payload: {err}"))
    })?;
    dto.into_parts().map_err(IdentityProviderError::transport)
}

fn map_transport_error(error: reqwest::Error) -> IdentityProviderError {
    IdentityProviderError::transport(error.to_string())
}

/// Map a failed auth response.
///
/// `on_reject` decides what a client-side refusal means for the calling
/// operation; it receives the server's explanation.
fn map_status_error(
    status: StatusCode,
    body: &[u8],
    on_reject: fn(String) -> IdentityProviderError,
) -> IdentityProviderError {
    if is_transient(status) {
        return IdentityProviderError::transport(status_message(status, body));
    }
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => {
            let parsed = AuthErrorDto::parse(body);
            if parsed.reports_existing_account() {
                return IdentityProviderError::already_registered();
            }
            let reason = parsed
                .into_message()
                .unwrap_or_else(|| status_message(status, body));
            on_reject(reason)
        }
        _ => IdentityProviderError::transport(status_message(status, body)),
    }
}
