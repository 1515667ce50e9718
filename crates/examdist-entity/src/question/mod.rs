//! Exam question entities.

pub mod model;

pub use model::Question;
