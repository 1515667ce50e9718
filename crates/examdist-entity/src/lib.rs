//! # examdist-entity
//!
//! Domain entity models for ExamDist. Every struct in this crate
//! represents a store row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`; with the
//! `postgres` feature they additionally derive `sqlx::FromRow`.

pub mod allocation;
pub mod course;
pub mod document;
pub mod exam;
pub mod question;
pub mod student;

pub use allocation::AllocationRecord;
pub use course::Course;
pub use document::Document;
pub use exam::Exam;
pub use question::Question;
pub use student::Student;
