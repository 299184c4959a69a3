//! Port for profile rows keyed by provider identity.

use async_trait::async_trait;

use crate::domain::identity::{IdentityId, Profile, ProfileDetails, Username};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by profile store adapters.
    pub enum ProfileStoreError {
        /// Store connection could not be established.
        Connection { message: String } => Transient, "profile store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => Transient, "profile store query failed: {message}",
        /// A row with the same id or username already exists.
        Duplicate { message: String } => Conflict, "profile already exists: {message}",
        /// No row for the given id.
        Missing { id: String } => NotFound, "profile {id} not found",
    }
}

/// Profile persistence capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up a profile row by identity id.
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Profile>, ProfileStoreError>;

    /// Exact username match; used to resolve login identifiers.
    async fn find_by_username(&self, username: &str)
    -> Result<Option<Profile>, ProfileStoreError>;

    /// Number of rows holding `username`.
    async fn count_by_username(&self, username: &Username) -> Result<u64, ProfileStoreError>;

    /// Insert a new row; fails with `Duplicate` when the id exists.
    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError>;

    /// Insert or replace the row with the same id.
    async fn upsert(&self, profile: &Profile) -> Result<(), ProfileStoreError>;

    /// Overwrite the optional attributes and return the updated row.
    async fn update_details(
        &self,
        id: &IdentityId,
        details: &ProfileDetails,
    ) -> Result<Profile, ProfileStoreError>;
}
