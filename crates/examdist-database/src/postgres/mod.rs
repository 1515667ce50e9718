//! PostgreSQL-backed allocation store.

pub mod connection;
pub mod store;

pub use connection::DatabasePool;
pub use store::PgAllocationStore;
