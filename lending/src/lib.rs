//! Session lifecycle and loan workflow core for the micro-lending client.
//!
//! The [`domain`] module holds the services and their ports; [`outbound`]
//! provides in-memory and HTTP adapters; [`config`] loads client settings.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
