//! Reqwest-backed profile and loan stores over the hosted REST tables.
//!
//! Rows live in the `profiles` and `loans` tables. Filters use the
//! `column=eq.value` query syntax; writes that need the stored row ask for it
//! with `Prefer: return=representation`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::client::{SupabaseClient, execute, is_transient, status_message};
use super::dto::{
    IdRowDto, LoanRowDto, LoanStatusPatchDto, NewLoanRowDto, ProfileDetailsDto, ProfileRowDto,
};
use crate::domain::ports::{LoanStore, LoanStoreError, ProfileStore, ProfileStoreError};
use crate::domain::{
    AdminLoanView, IdentityId, LoanApplication, LoanId, LoanStatus, NewLoanApplication, Profile,
    ProfileDetails, Username,
};

const PROFILES: &str = "rest/v1/profiles";
const LOANS: &str = "rest/v1/loans";
const RETURN_ROWS: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";

/// Build a table URL with `filters` appended as query pairs.
fn table_url(
    client: &SupabaseClient,
    table: &str,
    filters: &[(&str, String)],
) -> Result<Url, url::ParseError> {
    let mut url = client.endpoint(table)?;
    if !filters.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (column, value) in filters {
            pairs.append_pair(column, value);
        }
    }
    Ok(url)
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Failure of one REST round trip, before table-specific mapping.
enum RestFailure {
    Url(url::ParseError),
    Transport(reqwest::Error),
    Status(StatusCode, String),
    Decode(String),
}

async fn fetch_rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, RestFailure> {
    let body = send(request).await?;
    decode_rows(&body)
}

fn decode_rows<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, RestFailure> {
    serde_json::from_slice(body).map_err(|err| RestFailure::Decode(err.to_string()))
}

async fn send(request: RequestBuilder) -> Result<Vec<u8>, RestFailure> {
    let (status, body) = execute(request).await.map_err(RestFailure::Transport)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(RestFailure::Status(status, status_message(status, &body)))
    }
}

/// Profile store over the `profiles` table.
#[derive(Clone)]
pub struct SupabaseProfileStore {
    client: SupabaseClient,
}

impl SupabaseProfileStore {
    /// Store over the `profiles` table.
    #[must_use]
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, ProfileStoreError> {
        let url = table_url(&self.client, PROFILES, filters).map_err(map_profile_failure_url)?;
        fetch_rows(self.client.request(Method::GET, url))
            .await
            .map_err(map_profile_failure)
    }

    async fn select_one(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Option<Profile>, ProfileStoreError> {
        self.select::<ProfileRowDto>(filters)
            .await?
            .into_iter()
            .next()
            .map(|row| row.into_profile().map_err(ProfileStoreError::query))
            .transpose()
    }

    async fn write(&self, profile: &Profile, prefer: &str) -> Result<(), ProfileStoreError> {
        let url = table_url(&self.client, PROFILES, &[]).map_err(map_profile_failure_url)?;
        let request = self
            .client
            .request(Method::POST, url)
            .header("Prefer", prefer)
            .json(&ProfileRowDto::from_profile(profile));
        send(request).await.map(drop).map_err(map_profile_failure)
    }
}

fn map_profile_failure_url(err: url::ParseError) -> ProfileStoreError {
    map_profile_failure(RestFailure::Url(err))
}

fn map_profile_failure(failure: RestFailure) -> ProfileStoreError {
    match failure {
        RestFailure::Url(err) => ProfileStoreError::query(format!("invalid table url: {err}")),
        RestFailure::Transport(err) => ProfileStoreError::connection(err.to_string()),
        RestFailure::Status(StatusCode::CONFLICT, message) => {
            ProfileStoreError::duplicate(message)
        }
        RestFailure::Status(status, message) if is_transient(status) => {
            ProfileStoreError::connection(message)
        }
        RestFailure::Status(_, message) => ProfileStoreError::query(message),
        RestFailure::Decode(message) => {
            ProfileStoreError::query(format!("unreadable profile rows: {message}"))
        }
    }
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Profile>, ProfileStoreError> {
        self.select_one(&[("id", eq(id))]).await
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, ProfileStoreError> {
        self.select_one(&[("username", eq(username))]).await
    }

    async fn count_by_username(&self, username: &Username) -> Result<u64, ProfileStoreError> {
        let rows: Vec<IdRowDto> = self
            .select(&[("select", "id".to_owned()), ("username", eq(username))])
            .await?;
        u64::try_from(rows.len()).map_err(|_| ProfileStoreError::query("username count overflow"))
    }

    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        self.write(profile, "return=minimal").await
    }

    async fn upsert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        self.write(profile, MERGE_DUPLICATES).await
    }

    async fn update_details(
        &self,
        id: &IdentityId,
        details: &ProfileDetails,
    ) -> Result<Profile, ProfileStoreError> {
        let url = table_url(&self.client, PROFILES, &[("id", eq(id))])
            .map_err(map_profile_failure_url)?;
        let request = self
            .client
            .request(Method::PATCH, url)
            .header("Prefer", RETURN_ROWS)
            .json(&ProfileDetailsDto::from_details(details));
        let rows: Vec<ProfileRowDto> = fetch_rows(request).await.map_err(map_profile_failure)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ProfileStoreError::missing(id.to_string()))?
            .into_profile()
            .map_err(ProfileStoreError::query)
    }
}

/// Loan store over the `loans` table.
#[derive(Clone)]
pub struct SupabaseLoanStore {
    client: SupabaseClient,
}

impl SupabaseLoanStore {
    /// Store over the `loans` table.
    #[must_use]
    pub const fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn select(&self, filters: &[(&str, String)]) -> Result<Vec<LoanRowDto>, LoanStoreError> {
        let url = table_url(&self.client, LOANS, filters).map_err(map_loan_failure_url)?;
        fetch_rows(self.client.request(Method::GET, url))
            .await
            .map_err(map_loan_failure)
    }
}

fn map_loan_failure_url(err: url::ParseError) -> LoanStoreError {
    map_loan_failure(RestFailure::Url(err))
}

fn map_loan_failure(failure: RestFailure) -> LoanStoreError {
    match failure {
        RestFailure::Url(err) => LoanStoreError::query(format!("invalid table url: {err}")),
        RestFailure::Transport(err) => LoanStoreError::connection(err.to_string()),
        RestFailure::Status(status, message) if is_transient(status) => {
            LoanStoreError::connection(message)
        }
        RestFailure::Status(_, message) => LoanStoreError::query(message),
        RestFailure::Decode(message) => LoanStoreError::corrupt(message),
    }
}

#[async_trait]
impl LoanStore for SupabaseLoanStore {
    async fn insert(&self, row: &NewLoanApplication) -> Result<LoanApplication, LoanStoreError> {
        let url = table_url(&self.client, LOANS, &[]).map_err(map_loan_failure_url)?;
        let request = self
            .client
            .request(Method::POST, url)
            .header("Prefer", RETURN_ROWS)
            .json(&NewLoanRowDto::from_new(row));
        let rows: Vec<LoanRowDto> = fetch_rows(request).await.map_err(map_loan_failure)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| LoanStoreError::corrupt("insert returned no row"))?
            .into_application()
            .map_err(LoanStoreError::corrupt)
    }

    async fn find_by_owner(
        &self,
        owner: &IdentityId,
    ) -> Result<Vec<LoanApplication>, LoanStoreError> {
        self.select(&[("user_id", eq(owner))])
            .await?
            .into_iter()
            .map(|row| row.into_application().map_err(LoanStoreError::corrupt))
            .collect()
    }

    async fn list_with_owners(&self) -> Result<Vec<AdminLoanView>, LoanStoreError> {
        let rows = self
            .select(&[
                ("select", "*,profiles(username)".to_owned()),
                ("order", "created_at.desc".to_owned()),
            ])
            .await?;
        debug!(rows = rows.len(), "fetched review queue");
        rows.into_iter()
            .map(|row| row.into_admin_view().map_err(LoanStoreError::corrupt))
            .collect()
    }

    async fn update_status(&self, id: LoanId, status: LoanStatus) -> Result<(), LoanStoreError> {
        let url = table_url(&self.client, LOANS, &[("id", eq(id))])
            .map_err(map_loan_failure_url)?;
        let request = self
            .client
            .request(Method::PATCH, url)
            .header("Prefer", RETURN_ROWS)
            .json(&LoanStatusPatchDto {
                status: status.label(),
            });
        let rows: Vec<serde_json::Value> = fetch_rows(request).await.map_err(map_loan_failure)?;
        if rows.is_empty() {
            return Err(LoanStoreError::missing(id.get()));
        }
        Ok(())
    }
}
