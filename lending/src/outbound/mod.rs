//! Outbound adapters implementing the domain ports.
//!
//! - **memory**: process-local provider and stores for tests and demos
//! - **supabase**: reqwest adapters for the hosted auth service and REST tables
//!
//! Adapters are thin translators between domain types and wire
//! representations. They contain no business logic.

pub mod memory;
pub mod supabase;
