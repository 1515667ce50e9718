//! # examdist-database
//!
//! The allocation store boundary and its implementations: an in-memory
//! store for single-process use and tests, seed data loading, and a
//! PostgreSQL store behind the `postgres` feature.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod seed;
pub mod store;

pub use memory::MemoryAllocationStore;
pub use seed::SeedData;
pub use store::AllocationStore;
