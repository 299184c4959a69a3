//! In-process loan store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::MemoryProfileStore;
use crate::domain::ports::{LoanStore, LoanStoreError};
use crate::domain::{
    AdminLoanView, IdentityId, LoanApplication, LoanId, LoanStatus, NewLoanApplication,
};

#[derive(Debug, Default)]
struct LoanRows {
    rows: Vec<LoanApplication>,
    last_id: i64,
    timeout_after_commit: bool,
}

/// Loan applications kept in insertion order.
///
/// Joins owner usernames through an optional [`MemoryProfileStore`].
#[derive(Debug, Default)]
pub struct MemoryLoanStore {
    state: Mutex<LoanRows>,
    profiles: Option<Arc<MemoryProfileStore>>,
}

impl MemoryLoanStore {
    /// Empty store; owners resolve to nothing until [`Self::with_profiles`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve owner usernames from `profiles` in [`LoanStore::list_with_owners`].
    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<MemoryProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Make the next insert commit the row and then report a timeout, as a
    /// dropped response would.
    pub fn time_out_next_insert(&self) {
        self.lock_state().timeout_after_commit = true;
    }

    /// Number of stored applications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().rows.len()
    }

    /// True before the first insert.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_state(&self) -> MutexGuard<'_, LoanRows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    async fn insert(&self, row: &NewLoanApplication) -> Result<LoanApplication, LoanStoreError> {
        let mut state = self.lock_state();
        state.last_id += 1;
        let application = LoanApplication::from_new(LoanId::new(state.last_id), row.clone());
        state.rows.push(application.clone());
        if std::mem::take(&mut state.timeout_after_commit) {
            return Err(LoanStoreError::connection("request timed out"));
        }
        Ok(application)
    }

    async fn find_by_owner(
        &self,
        owner: &IdentityId,
    ) -> Result<Vec<LoanApplication>, LoanStoreError> {
        Ok(self
            .lock_state()
            .rows
            .iter()
            .filter(|application| &application.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn list_with_owners(&self) -> Result<Vec<AdminLoanView>, LoanStoreError> {
        let rows = self.lock_state().rows.clone();
        Ok(rows
            .into_iter()
            .map(|application| {
                let owner = self
                    .profiles
                    .as_ref()
                    .and_then(|profiles| profiles.username_of(&application.owner_id));
                AdminLoanView::new(application, owner)
            })
            .collect())
    }

    async fn update_status(&self, id: LoanId, status: LoanStatus) -> Result<(), LoanStoreError> {
        let mut state = self.lock_state();
        let application = state
            .rows
            .iter_mut()
            .find(|application| application.id == id)
            .ok_or_else(|| LoanStoreError::missing(id.get()))?;
        application.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::{
        Email, LoanCategory, LoanPeriod, Profile, ProfileDetails, UNKNOWN_OWNER, Username,
    };
    use crate::domain::ports::ProfileStore;

    fn new_row(owner: &IdentityId) -> NewLoanApplication {
        NewLoanApplication {
            owner_id: owner.clone(),
            category: LoanCategory::EducationExcellence,
            amount: 30_000,
            period: LoanPeriod::Months18,
            status: LoanStatus::PendingReview,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn ids_increase_monotonically() {
        let store = MemoryLoanStore::new();
        let owner = IdentityId::random();
        let first = store.insert(&new_row(&owner)).await.expect("insert");
        let second = store.insert(&new_row(&owner)).await.expect("insert");
        assert!(second.id > first.id);
    }

    #[rstest]
    #[tokio::test]
    async fn timed_out_insert_still_commits_the_row() {
        let store = MemoryLoanStore::new();
        store.time_out_next_insert();
        let err = store
            .insert(&new_row(&IdentityId::random()))
            .await
            .expect_err("timeout");
        assert!(matches!(err, LoanStoreError::Connection { .. }));
        assert_eq!(store.len(), 1);

        store
            .insert(&new_row(&IdentityId::random()))
            .await
            .expect("fault is one-shot");
    }

    #[rstest]
    #[tokio::test]
    async fn owner_join_falls_back_to_placeholder() {
        let profiles = Arc::new(MemoryProfileStore::new());
        let known = IdentityId::random();
        profiles
            .upsert(&Profile {
                id: known.clone(),
                username: Username::new("sultana9").expect("valid username"),
                email: Email::new("sultana@example.com").expect("valid email"),
                details: ProfileDetails::default(),
            })
            .await
            .expect("upsert");
        let store = MemoryLoanStore::new().with_profiles(profiles);
        store.insert(&new_row(&known)).await.expect("insert");
        store
            .insert(&new_row(&IdentityId::random()))
            .await
            .expect("insert");

        let owners: Vec<String> = store
            .list_with_owners()
            .await
            .expect("list")
            .into_iter()
            .map(|view| view.owner_username)
            .collect();
        assert_eq!(owners, vec!["sultana9".to_owned(), UNKNOWN_OWNER.to_owned()]);
    }

    #[rstest]
    #[tokio::test]
    async fn status_updates_overwrite_without_checks() {
        let store = MemoryLoanStore::new();
        let owner = IdentityId::random();
        let application = store.insert(&new_row(&owner)).await.expect("insert");

        store
            .update_status(application.id, LoanStatus::Rejected)
            .await
            .expect("reject");
        store
            .update_status(application.id, LoanStatus::Approved)
            .await
            .expect("re-approve");

        let rows = store.find_by_owner(&owner).await.expect("list");
        assert_eq!(rows.first().map(|row| row.status), Some(LoanStatus::Approved));

        let err = store
            .update_status(LoanId::new(99), LoanStatus::Approved)
            .await
            .expect_err("missing");
        assert_eq!(err, LoanStoreError::missing(99_i64));
    }
}
