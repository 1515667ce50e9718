//! Request credential and enrollment checks.

pub mod guard;

pub use guard::{AccessGuard, AssignRequest};
