//! Allocation record entities.

pub mod record;

pub use record::AllocationRecord;
