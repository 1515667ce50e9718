//! # examdist-allocation
//!
//! The allocation core: decides which document of each question a
//! requester receives.
//!
//! ## Modules
//!
//! - `snapshot`: immutable point-in-time view of class size, candidate
//!   documents, and existing allocation records
//! - `engine`: pure, fairness- and address-aware weighted draw
//! - `gate`: serializes the snapshot / decide / persist sequence

pub mod engine;
pub mod gate;
pub mod snapshot;

pub use engine::{AllocationEngine, CapacityPlan};
pub use gate::AllocationGate;
pub use snapshot::{AllocationSnapshot, QuestionCandidates};
