//! Exam domain entities.

pub mod model;

pub use model::Exam;
