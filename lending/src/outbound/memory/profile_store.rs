//! In-process profile store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{ProfileStore, ProfileStoreError};
use crate::domain::{IdentityId, Profile, ProfileDetails, Username};

/// Profile rows keyed by provider identity.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    rows: Mutex<HashMap<IdentityId, Profile>>,
    offline: Mutex<bool>,
}

impl MemoryProfileStore {
    /// Empty, online store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap_or_else(PoisonError::into_inner) = offline;
    }

    /// Username stored for `id`, used by the loan store's owner join.
    #[must_use]
    pub fn username_of(&self, id: &IdentityId) -> Option<String> {
        self.lock_rows()
            .get(id)
            .map(|profile| profile.username.to_string())
    }

    fn lock_rows(&self) -> MutexGuard<'_, HashMap<IdentityId, Profile>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online_rows(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<IdentityId, Profile>>, ProfileStoreError> {
        if *self.offline.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(ProfileStoreError::connection("profile store is offline"));
        }
        Ok(self.lock_rows())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Profile>, ProfileStoreError> {
        Ok(self.online_rows()?.get(id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Profile>, ProfileStoreError> {
        Ok(self
            .online_rows()?
            .values()
            .find(|profile| profile.username.as_ref() == username)
            .cloned())
    }

    async fn count_by_username(&self, username: &Username) -> Result<u64, ProfileStoreError> {
        let count = self
            .online_rows()?
            .values()
            .filter(|profile| &profile.username == username)
            .count();
        u64::try_from(count).map_err(|_| ProfileStoreError::query("username count overflow"))
    }

    async fn insert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        let mut rows = self.online_rows()?;
        if rows.contains_key(&profile.id) {
            return Err(ProfileStoreError::duplicate(format!("id {}", profile.id)));
        }
        rows.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn upsert(&self, profile: &Profile) -> Result<(), ProfileStoreError> {
        self.online_rows()?
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_details(
        &self,
        id: &IdentityId,
        details: &ProfileDetails,
    ) -> Result<Profile, ProfileStoreError> {
        let mut rows = self.online_rows()?;
        let profile = rows
            .get_mut(id)
            .ok_or_else(|| ProfileStoreError::missing(id.to_string()))?;
        profile.details = details.clone();
        Ok(profile.clone())
    }
}
