//! Driven ports for the identity provider and data stores.

mod macros;
pub(crate) use macros::define_port_error;

mod identity_provider;
mod loan_store;
mod profile_store;

#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{IdentityProvider, IdentityProviderError};
#[cfg(test)]
pub use loan_store::MockLoanStore;
pub use loan_store::{LoanStore, LoanStoreError};
#[cfg(test)]
pub use profile_store::MockProfileStore;
pub use profile_store::{ProfileStore, ProfileStoreError};
