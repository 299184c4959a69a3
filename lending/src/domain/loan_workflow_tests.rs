//! Tests for the loan workflow.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rstest::rstest;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::loans::{LoanCategory, LoanPeriod, LoanStats, UNKNOWN_OWNER};
use crate::domain::ports::{LoanStoreError, MockLoanStore};
use crate::test_support::MutableClock;

fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_704_067_200, 0).expect("timestamp")
}

fn application(id: i64, owner: &IdentityId, offset_secs: i64, status: LoanStatus) -> LoanApplication {
    LoanApplication {
        id: LoanId::new(id),
        owner_id: owner.clone(),
        category: LoanCategory::MicroEnterprise,
        amount: 15_000,
        period: LoanPeriod::Months12,
        status,
        created_at: base_time() + TimeDelta::seconds(offset_secs),
    }
}

fn draft(amount: u64) -> LoanDraft {
    LoanDraft {
        category: LoanCategory::MicroEnterprise,
        amount,
        period: LoanPeriod::Months12,
    }
}

fn workflow(store: MockLoanStore) -> LoanWorkflow<MockLoanStore> {
    LoanWorkflow::new(Arc::new(store), Arc::new(MutableClock::new(base_time())))
}

#[tokio::test]
async fn submit_always_starts_pending_review_and_stamps_the_clock() {
    let owner = IdentityId::random();
    let expected_owner = owner.clone();
    let mut store = MockLoanStore::new();
    store
        .expect_insert()
        .withf(move |row| {
            row.owner_id == expected_owner
                && row.status == LoanStatus::PendingReview
                && row.created_at == base_time()
        })
        .times(1)
        .return_once(|row| Ok(LoanApplication::from_new(LoanId::new(7), row.clone())));

    let application = workflow(store)
        .submit(&owner, draft(15_000))
        .await
        .expect("submit succeeds");

    assert_eq!(application.id, LoanId::new(7));
    assert_eq!(application.status, LoanStatus::PendingReview);
    assert_eq!(application.period.months(), 12);
}

#[tokio::test]
async fn submit_accepts_amounts_outside_the_advertised_range() {
    let mut store = MockLoanStore::new();
    store
        .expect_insert()
        .times(1)
        .return_once(|row| Ok(LoanApplication::from_new(LoanId::new(1), row.clone())));

    let small = draft(1);
    assert!(!small.within_advertised_range());
    let application = workflow(store)
        .submit(&IdentityId::random(), small)
        .await
        .expect("range is not enforced");
    assert_eq!(application.amount, 1);
}

#[tokio::test]
async fn submit_rejects_zero_amount_locally() {
    let mut store = MockLoanStore::new();
    store.expect_insert().times(0);

    let err = workflow(store)
        .submit(&IdentityId::random(), draft(0))
        .await
        .expect_err("zero amount");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn store_timeouts_surface_as_transient() {
    let mut store = MockLoanStore::new();
    store
        .expect_insert()
        .return_once(|_| Err(LoanStoreError::connection("request timed out")));

    let err = workflow(store)
        .submit(&IdentityId::random(), draft(20_000))
        .await
        .expect_err("timeout");
    assert_eq!(err.code(), ErrorCode::Transient);
}

#[tokio::test]
async fn list_for_owner_sorts_newest_first_regardless_of_store_order() {
    let owner = IdentityId::random();
    let rows = vec![
        application(1, &owner, 0, LoanStatus::Approved),
        application(3, &owner, 120, LoanStatus::PendingReview),
        application(2, &owner, 60, LoanStatus::Rejected),
        application(4, &owner, 120, LoanStatus::PendingReview),
    ];
    let mut store = MockLoanStore::new();
    store
        .expect_find_by_owner()
        .times(1)
        .return_once(move |_| Ok(rows));

    let listed = workflow(store)
        .list_for_owner(&owner)
        .await
        .expect("list succeeds");
    let ids: Vec<i64> = listed.iter().map(|row| row.id.get()).collect();
    assert_eq!(ids, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn list_all_orders_views_and_keeps_unknown_owner_placeholder() {
    let owner = IdentityId::random();
    let views = vec![
        AdminLoanView::new(application(1, &owner, 0, LoanStatus::PendingReview), None),
        AdminLoanView::new(
            application(2, &owner, 30, LoanStatus::PendingReview),
            Some("rahim42".to_owned()),
        ),
    ];
    let mut store = MockLoanStore::new();
    store
        .expect_list_with_owners()
        .return_once(move || Ok(views));

    let listed = workflow(store).list_all().await.expect("list succeeds");
    let owners: Vec<&str> = listed.iter().map(|view| view.owner_username.as_str()).collect();
    assert_eq!(owners, vec!["rahim42", UNKNOWN_OWNER]);
}

#[rstest]
#[case(LoanStatus::Approved)]
#[case(LoanStatus::Rejected)]
#[tokio::test]
async fn reviewers_can_record_decisions(#[case] status: LoanStatus) {
    let mut store = MockLoanStore::new();
    store
        .expect_update_status()
        .withf(move |id, next| *id == LoanId::new(9) && *next == status)
        .times(1)
        .return_once(|_, _| Ok(()));

    workflow(store)
        .set_status(LoanId::new(9), status)
        .await
        .expect("decision recorded");
}

#[rstest]
#[case(LoanStatus::PendingReview)]
#[case(LoanStatus::Active)]
#[tokio::test]
async fn non_decision_statuses_are_rejected(#[case] status: LoanStatus) {
    let mut store = MockLoanStore::new();
    store.expect_update_status().times(0);

    let err = workflow(store)
        .set_status(LoanId::new(9), status)
        .await
        .expect_err("not a decision");
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let mut store = MockLoanStore::new();
    store
        .expect_update_status()
        .return_once(|id, _| Err(LoanStoreError::missing(id.get())));

    let err = workflow(store)
        .set_status(LoanId::new(404), LoanStatus::Approved)
        .await
        .expect_err("missing");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "loan application 404 not found");
}

#[rstest]
fn stats_follow_the_legacy_compatibility_rule() {
    let owner = IdentityId::random();
    let rows = [
        application(1, &owner, 0, LoanStatus::normalize("Pending").expect("legacy")),
        application(2, &owner, 0, LoanStatus::PendingReview),
        application(3, &owner, 0, LoanStatus::Active),
        application(4, &owner, 0, LoanStatus::Rejected),
    ];
    let stats = workflow(MockLoanStore::new()).compute_stats(&rows);
    assert_eq!(
        stats,
        LoanStats {
            total: 4,
            pending_count: 2,
            approved_count: 1,
        }
    );
}

#[rstest]
fn catalogue_exposes_four_products() {
    let products = workflow(MockLoanStore::new()).catalogue();
    assert_eq!(products.len(), 4);
    assert!(products.iter().all(|product| product.min_amount < product.max_amount));
}
