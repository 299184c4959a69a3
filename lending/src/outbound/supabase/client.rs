//! Shared HTTP plumbing for the hosted backend.
//!
//! One [`SupabaseClient`] is cloned into every adapter so they share the
//! connection pool and the signed-in access token: row-level security on
//! the REST tables sees the same user the auth adapter signed in.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use zeroize::Zeroizing;

/// Base URL, API key and session token for the hosted backend.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base: Url,
    api_key: Arc<Zeroizing<String>>,
    access_token: Arc<Mutex<Option<Zeroizing<String>>>>,
}

impl SupabaseClient {
    /// Build a client for the project at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base: Url,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: with_trailing_slash(base),
            api_key: Arc::new(Zeroizing::new(api_key.into())),
            access_token: Arc::new(Mutex::new(None)),
        })
    }

    /// Whether an access token is currently held.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.lock_token().is_some()
    }

    pub(super) fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }

    /// Start a request carrying the API key and the best available bearer.
    pub(super) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| Zeroizing::new(self.api_key.as_str().to_owned()));
        self.http
            .request(method, url)
            .header("apikey", self.api_key.as_str())
            .bearer_auth(bearer.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    pub(super) fn access_token(&self) -> Option<Zeroizing<String>> {
        self.lock_token().clone()
    }

    pub(super) fn set_access_token(&self, token: Option<String>) {
        *self.lock_token() = token.map(Zeroizing::new);
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<Zeroizing<String>>> {
        self.access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Send a request and collect the status with the full body.
pub(super) async fn execute(
    request: RequestBuilder,
) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    Ok((status, body.to_vec()))
}

/// Statuses worth retrying later rather than reporting as a rejection.
pub(super) fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS | StatusCode::GATEWAY_TIMEOUT
    ) || status.is_server_error()
}

pub(super) fn status_message(status: StatusCode, body: &[u8]) -> String {
    let preview = body_preview(body);
    if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), preview)
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network client helpers.

    use rstest::rstest;

    use super::*;

    fn client(base: &str) -> SupabaseClient {
        SupabaseClient::new(
            Url::parse(base).expect("valid base url"),
            "anon-key",
            Duration::from_secs(5),
        )
        .expect("client should build")
    }

    #[rstest]
    #[case::bare_host("https://project.supabase.co")]
    #[case::trailing_slash("https://project.supabase.co/")]
    fn endpoints_resolve_under_the_project_root(#[case] base: &str) {
        let url = client(base)
            .endpoint("auth/v1/token?grant_type=password")
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn endpoints_keep_a_path_prefix() {
        let url = client("http://localhost:54321/gateway")
            .endpoint("rest/v1/loans")
            .expect("endpoint");
        assert_eq!(url.as_str(), "http://localhost:54321/gateway/rest/v1/loans");
    }

    #[test]
    fn access_token_is_shared_between_clones() {
        let first = client("https://project.supabase.co");
        let second = first.clone();
        first.set_access_token(Some("jwt".to_owned()));
        assert!(second.has_session());
        second.set_access_token(None);
        assert!(!first.has_session());
    }

    #[rstest]
    #[case(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(StatusCode::GATEWAY_TIMEOUT, true)]
    #[case(StatusCode::BAD_GATEWAY, true)]
    #[case(StatusCode::BAD_REQUEST, false)]
    #[case(StatusCode::UNPROCESSABLE_ENTITY, false)]
    fn classifies_transient_statuses(#[case] status: StatusCode, #[case] expected: bool) {
        assert_eq!(is_transient(status), expected);
    }

    #[test]
    fn status_messages_compact_long_bodies() {
        let body = format!("{{\"msg\":\"{}\"}}", "x ".repeat(200));
        let message = status_message(StatusCode::BAD_REQUEST, body.as_bytes());
        assert!(message.starts_with("status 400: {\"msg\":\"x x"));
        assert!(message.ends_with("..."));
    }
}
