//! Allocation orchestration: idempotency, gate, snapshot, persist, notify.

pub mod service;

pub use service::{AllocationOutcome, AllocationService};
