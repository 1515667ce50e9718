//! # examdist-service
//!
//! Service layer for ExamDist. Orchestrates the allocation store, the
//! allocation engine and gate, access checks, and owner notifications.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod access;
pub mod allocation;
pub mod notification;
pub mod report;

pub use access::{AccessGuard, AssignRequest};
pub use allocation::{AllocationOutcome, AllocationService};
pub use notification::{AllocatedMessage, AllocationNotifier, BroadcastNotifier};
pub use report::{AssignmentReport, AssignmentRow};
