//! In-memory adapters for every driven port.
//!
//! Deterministic and process-local. Used by the behaviour suites and for
//! exercising the services without a hosted backend.

mod identity_provider;
mod loan_store;
mod profile_store;

pub use identity_provider::{CODE_TTL_SECS, MemoryIdentityProvider};
pub use loan_store::MemoryLoanStore;
pub use profile_store::MemoryProfileStore;
