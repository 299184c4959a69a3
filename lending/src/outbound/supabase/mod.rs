//! HTTP adapters for the hosted backend-as-a-service.
//!
//! The auth adapter speaks the `/auth/v1` endpoints and the stores speak the
//! `/rest/v1` tables. Every adapter is built from one shared
//! [`SupabaseClient`].

mod client;
mod dto;
mod identity;
mod rest;

pub use client::SupabaseClient;
pub use identity::SupabaseIdentityProvider;
pub use rest::{SupabaseLoanStore, SupabaseProfileStore};
