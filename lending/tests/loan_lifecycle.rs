//! Loan submission and review over the in-memory stores.

use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use ::lending::domain::ports::LoanStore;
use ::lending::domain::{
    Email, ErrorCode, IdentityId, LoanApplication, LoanCategory, LoanDraft, LoanId, LoanPeriod,
    LoanStatus, LoanWorkflow, NewLoanApplication, RegistrationForm, SessionController,
    compute_stats,
};
use ::lending::outbound::memory::{MemoryIdentityProvider, MemoryLoanStore, MemoryProfileStore};
use ::lending::test_support::MutableClock;
use mockable::Clock;
use rstest::{fixture, rstest};

fn micro_draft() -> LoanDraft {
    LoanDraft {
        category: LoanCategory::MicroEnterprise,
        amount: 15_000,
        period: LoanPeriod::Months12,
    }
}

struct Lending {
    clock: Arc<MutableClock>,
    loans: Arc<MemoryLoanStore>,
    workflow: LoanWorkflow<MemoryLoanStore>,
}

#[fixture]
fn lending() -> Lending {
    let clock = Arc::new(MutableClock::fixed());
    let loans = Arc::new(MemoryLoanStore::new());
    let workflow = LoanWorkflow::new(loans.clone(), clock.clone());
    Lending {
        clock,
        loans,
        workflow,
    }
}

#[rstest]
#[tokio::test]
async fn resubmitting_after_a_timeout_duplicates_the_application(lending: Lending) {
    let owner = IdentityId::random();
    lending.loans.time_out_next_insert();

    let err = lending
        .workflow
        .submit(&owner, micro_draft())
        .await
        .expect_err("response lost");
    assert_eq!(err.code(), ErrorCode::Transient);

    lending
        .workflow
        .submit(&owner, micro_draft())
        .await
        .expect("retry succeeds");

    let mine = lending
        .workflow
        .list_for_owner(&owner)
        .await
        .expect("list");
    assert_eq!(mine.len(), 2, "no idempotency key guards resubmission");
}

#[rstest]
fn stats_fold_legacy_and_active_statuses() {
    let labels = ["Pending", "Pending Review", "Active", "Rejected"];
    let applications: Vec<_> = labels
        .into_iter()
        .zip(1_i64..)
        .map(|(label, id)| LoanApplication {
            id: LoanId::new(id),
            owner_id: IdentityId::random(),
            category: LoanCategory::AgriculturalGrowth,
            amount: 40_000,
            period: LoanPeriod::Months6,
            status: LoanStatus::normalize(label).expect("known label"),
            created_at: Utc::now(),
        })
        .collect();

    let stats = compute_stats(&applications);

    assert_eq!(
        (stats.total, stats.pending_count, stats.approved_count),
        (4, 2, 1)
    );
}

#[rstest]
#[tokio::test]
async fn owner_listing_is_newest_first_whatever_the_store_order(lending: Lending) {
    let owner = IdentityId::random();
    let base = Utc
        .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .expect("valid time");
    for offset_hours in [2, 0, 5, 1] {
        lending
            .loans
            .insert(&NewLoanApplication {
                owner_id: owner.clone(),
                category: LoanCategory::EducationExcellence,
                amount: 20_000,
                period: LoanPeriod::Months18,
                status: LoanStatus::PendingReview,
                created_at: base + TimeDelta::hours(offset_hours),
            })
            .await
            .expect("insert");
    }

    let listed = lending
        .workflow
        .list_for_owner(&owner)
        .await
        .expect("list");

    let hours: Vec<i64> = listed
        .iter()
        .map(|application| (application.created_at - base).num_hours())
        .collect();
    assert_eq!(hours, vec![5, 2, 1, 0]);
}

#[rstest]
#[tokio::test]
async fn submissions_are_stamped_with_the_clock(lending: Lending) {
    lending.clock.advance_seconds(3_600);
    let submitted = lending
        .workflow
        .submit(&IdentityId::random(), micro_draft())
        .await
        .expect("submitted");
    assert_eq!(submitted.created_at, lending.clock.utc());
    assert_eq!(submitted.status, LoanStatus::PendingReview);
}

#[tokio::test]
async fn registered_applicant_sees_an_approved_loan() {
    let clock = Arc::new(MutableClock::fixed());
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let provider = Arc::new(MemoryIdentityProvider::new(shared_clock.clone()));
    let profiles = Arc::new(MemoryProfileStore::new());
    let loans = Arc::new(MemoryLoanStore::new().with_profiles(profiles.clone()));
    let sessions = SessionController::new(provider.clone(), profiles, shared_clock.clone());
    let workflow = LoanWorkflow::new(loans, shared_clock);

    let email = "sultana@example.com";
    sessions.send_otp(email).await.expect("code sent");
    let code = provider
        .issued_code(&Email::new(email).expect("valid email"))
        .expect("code in inbox");
    sessions.verify_otp(email, &code).await.expect("verified");
    let identity = sessions
        .register(RegistrationForm {
            username: "sultana9".to_owned(),
            email: email.to_owned(),
            full_name: "Sultana Begum".to_owned(),
            password: "secret1".to_owned(),
            confirm_password: "secret1".to_owned(),
        })
        .await
        .expect("registered");

    let submitted = workflow
        .submit(identity.id(), micro_draft())
        .await
        .expect("submitted");
    workflow
        .set_status(submitted.id, LoanStatus::Approved)
        .await
        .expect("approved");

    let mine = workflow.list_for_owner(identity.id()).await.expect("list");
    let [approved] = mine.as_slice() else {
        panic!("expected exactly one application, got {}", mine.len());
    };
    assert_eq!(approved.status, LoanStatus::Approved);
    assert_eq!(approved.category.product().annual_rate_bps, 950);
    assert!(workflow.compute_stats(&mine).approved_count >= 1);

    let queue = workflow.list_all().await.expect("review queue");
    assert_eq!(
        queue.first().map(|view| view.owner_username.as_str()),
        Some("sultana9")
    );
}

#[rstest]
#[tokio::test]
async fn reviewers_cannot_reset_to_pending(lending: Lending) {
    let submitted = lending
        .workflow
        .submit(&IdentityId::random(), micro_draft())
        .await
        .expect("submitted");

    let err = lending
        .workflow
        .set_status(submitted.id, LoanStatus::PendingReview)
        .await
        .expect_err("not a decision");
    assert_eq!(err.code(), ErrorCode::Validation);

    let missing = lending
        .workflow
        .set_status(LoanId::new(404), LoanStatus::Rejected)
        .await
        .expect_err("unknown id");
    assert_eq!(missing.code(), ErrorCode::NotFound);
}
